//! Filename rules for uploaded images.
//!
//! The browser page applies the same rules before uploading, these are used
//! server side when a name has to be derived without user input (shares).

/// The extension given to files which have none.
pub const DEFAULT_EXTENSION: &str = ".jpg";

/// The base name used when nothing usable is left after sanitizing.
pub const DEFAULT_BASE: &str = "image";

#[inline]
fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

/// Returns true if the base name is non-empty and only contains `[a-zA-Z0-9_-]`.
pub fn is_valid_base(base: &str) -> bool {
    !base.is_empty() && base.chars().all(is_allowed)
}

/// Removes every character outside of `[a-zA-Z0-9_-]`.
pub fn sanitize_base(base: &str) -> String {
    base.chars().filter(|c| is_allowed(*c)).collect()
}

/// The lower-cased extension of the original filename including the dot.
///
/// Names without an extension, or ending in a bare dot, get [`DEFAULT_EXTENSION`].
pub fn extension_of(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => format!(".{}", ext.to_lowercase()),
        _ => DEFAULT_EXTENSION.to_string(),
    }
}

/// The editable base name offered for a newly selected file.
pub fn seed_base(original: &str) -> String {
    let stem = original
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(original);

    let base = sanitize_base(stem);
    if base.is_empty() {
        DEFAULT_BASE.to_string()
    } else {
        base
    }
}

/// Builds the stored filename from the user's base name and the original
/// file's extension.
///
/// Returns `None` if no valid characters remain in the base.
pub fn final_filename(original: &str, edited_base: &str) -> Option<String> {
    let base = sanitize_base(edited_base);
    if base.is_empty() {
        return None;
    }

    Some(format!("{}{}", base.to_lowercase(), extension_of(original)))
}

/// Derives a stored filename purely from the original filename.
pub fn suggest_filename(original: &str) -> String {
    final_filename(original, &seed_base(original))
        .unwrap_or_else(|| format!("{}{}", DEFAULT_BASE, extension_of(original)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_bases() {
        for base in ["a", "Z", "holiday_2023", "my-photo", "___", "ABCxyz019"] {
            assert!(is_valid_base(base), "{:?} should be valid", base);
        }
    }

    #[test]
    fn test_invalid_bases() {
        for base in ["", " ", "my photo", "photo.png", "../etc", "caf\u{e9}", "a/b", "x!"] {
            assert!(!is_valid_base(base), "{:?} should be invalid", base);
        }
    }

    #[test]
    fn test_extension_extraction() {
        assert_eq!(extension_of("photo.PNG"), ".png");
        assert_eq!(extension_of("archive.tar.GZ"), ".gz");
        assert_eq!(extension_of("no_extension"), ".jpg");
        assert_eq!(extension_of("photo."), ".jpg");
    }

    #[test]
    fn test_seed_base() {
        assert_eq!(seed_base("My Holiday (1).jpeg"), "MyHoliday1");
        assert_eq!(seed_base("a.b.c.png"), "abc");
        assert_eq!(seed_base("!!!.png"), "image");
        assert_eq!(seed_base("plain"), "plain");
    }

    #[test]
    fn test_final_filename_strips_and_lowercases() {
        assert_eq!(
            final_filename("photo.PNG", "My Photo!").as_deref(),
            Some("myphoto.png"),
        );
        assert_eq!(final_filename("scan", "Scan_01").as_deref(), Some("scan_01.jpg"));
        assert_eq!(final_filename("photo.png", "?!"), None);
    }

    #[test]
    fn test_final_filename_is_always_valid() {
        for (original, base) in [("a.JPG", "Hello World"), ("b", "x/../y"), ("c.gif", "-_-")] {
            let name = final_filename(original, base).expect("base has valid characters");
            let (stem, _) = name.rsplit_once('.').expect("has extension");
            assert!(is_valid_base(stem));
        }
    }

    #[test]
    fn test_suggest_filename() {
        assert_eq!(suggest_filename("Holiday Pic.JPEG"), "holidaypic.jpeg");
        assert_eq!(suggest_filename("???"), "image.jpg");
        assert_eq!(suggest_filename("photo."), "photo.jpg");
    }
}

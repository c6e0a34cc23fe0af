use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::config::ImageKind;
use crate::storage::{StorageBackend, StorageError, StoredFile};

pub struct FileSystemBackend {
    /// The canonical storage root.
    directory: PathBuf,
}

impl FileSystemBackend {
    /// Opens the storage root, creating it if it does not exist yet.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let dir = dir.as_ref();
        tokio::fs::create_dir_all(dir).await?;
        let directory = tokio::fs::canonicalize(dir).await?;
        Ok(Self { directory })
    }

    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Resolves a filename to a path directly inside the storage root.
    ///
    /// The filename must be exactly one normal path component. The parent of
    /// the candidate must canonicalize to the root itself, and if the file
    /// already exists its own canonical path must stay within the root so
    /// symlinks cannot point elsewhere.
    async fn resolve(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let invalid = || StorageError::InvalidPath(filename.to_string());

        // `components()` drops `.` segments, so the single component must
        // also equal the raw filename.
        let mut components = Path::new(filename).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) if name == filename => {},
            _ => return Err(invalid()),
        }

        let candidate = self.directory.join(filename);
        let name = candidate.file_name().ok_or_else(invalid)?;
        let parent = candidate.parent().ok_or_else(invalid)?;

        let parent = match tokio::fs::canonicalize(parent).await {
            Ok(parent) => parent,
            Err(ref e) if e.kind() == ErrorKind::NotFound => return Err(invalid()),
            Err(other) => return Err(other.into()),
        };

        if parent != self.directory {
            return Err(invalid());
        }

        let path = parent.join(name);
        match tokio::fs::canonicalize(&path).await {
            Ok(real) if !real.starts_with(&self.directory) => Err(invalid()),
            Ok(_) => Ok(path),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(path),
            Err(other) => Err(other.into()),
        }
    }
}

#[async_trait]
impl StorageBackend for FileSystemBackend {
    async fn store(&self, filename: &str, data: Bytes) -> Result<(), StorageError> {
        let path = self.resolve(filename).await?;

        debug!("Storing image @ {:?}", &path);
        match tokio::fs::write(&path, &data).await {
            Ok(()) => Ok(()),
            Err(ref e) if e.kind() == ErrorKind::NotFound => {
                tokio::fs::create_dir_all(&self.directory).await?;
                tokio::fs::write(&path, data).await?;
                Ok(())
            },
            Err(other) => Err(other.into())
        }
    }

    async fn fetch(&self, filename: &str) -> Result<Option<Bytes>, StorageError> {
        let path = self.resolve(filename).await?;

        debug!("Retrieving image @ {:?}", &path);
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(other) => Err(other.into()),
        }
    }

    async fn list(&self) -> Result<Vec<StoredFile>, StorageError> {
        let mut entries = tokio::fs::read_dir(&self.directory).await?;
        let mut files = vec![];

        while let Some(entry) = entries.next_entry().await? {
            let filename = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };

            if ImageKind::from_filename(&filename).is_none() {
                continue;
            }

            // Files can disappear between the directory read and the stat.
            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(ref e) if e.kind() == ErrorKind::NotFound => continue,
                Err(other) => return Err(other.into()),
            };

            if !metadata.is_file() {
                continue;
            }

            files.push(StoredFile {
                filename,
                modified: DateTime::<Utc>::from(metadata.modified()?),
                size: metadata.len(),
            });
        }

        debug!("Listed {} images @ {:?}", files.len(), &self.directory);
        Ok(files)
    }

    async fn delete(&self, filename: &str) -> Result<bool, StorageError> {
        let path = self.resolve(filename).await?;

        debug!("Purging image @ {:?}", &path);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(ref e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(other) => Err(other.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn backend() -> anyhow::Result<(tempfile::TempDir, FileSystemBackend)> {
        let dir = tempfile::tempdir()?;
        let backend = FileSystemBackend::open(dir.path().join("album")).await?;
        Ok((dir, backend))
    }

    #[tokio::test]
    async fn test_open_creates_missing_root() -> anyhow::Result<()> {
        let (dir, backend) = backend().await?;

        assert!(dir.path().join("album").is_dir());
        assert!(backend.directory().is_absolute());
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_rejects_escaping_names() -> anyhow::Result<()> {
        let (_dir, backend) = backend().await?;

        backend.store("a.jpg", Bytes::from_static(b"a")).await?;

        let names = [
            "",
            ".",
            "..",
            "../outside.jpg",
            "../../etc/passwd",
            "/etc/passwd",
            "nested/a.jpg",
            "a.jpg/.",
            "./a.jpg",
        ];
        for name in names {
            let res = backend.resolve(name).await;
            assert!(
                matches!(res, Err(StorageError::InvalidPath(_))),
                "{:?} should have been rejected",
                name,
            );
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_dotted_alias_does_not_delete_real_file() -> anyhow::Result<()> {
        let (_dir, backend) = backend().await?;
        backend.store("a.jpg", Bytes::from_static(b"a")).await?;

        assert!(matches!(backend.delete("a.jpg/.").await, Err(StorageError::InvalidPath(_))));
        assert!(matches!(
            backend.store("a.jpg/.", Bytes::from_static(b"b")).await,
            Err(StorageError::InvalidPath(_)),
        ));
        assert_eq!(backend.fetch("a.jpg").await?, Some(Bytes::from_static(b"a")));
        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_accepts_plain_names() -> anyhow::Result<()> {
        let (_dir, backend) = backend().await?;

        let path = backend.resolve("holiday_01.png").await?;
        assert_eq!(path, backend.directory().join("holiday_01.png"));
        Ok(())
    }

    #[tokio::test]
    async fn test_traversal_delete_leaves_outside_untouched() -> anyhow::Result<()> {
        let (dir, backend) = backend().await?;
        let outside = dir.path().join("secret.jpg");
        tokio::fs::write(&outside, b"secret").await?;

        let res = backend.delete("../secret.jpg").await;
        assert!(matches!(res, Err(StorageError::InvalidPath(_))));
        assert!(outside.exists());
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_out_of_root_is_rejected() -> anyhow::Result<()> {
        let (dir, backend) = backend().await?;
        let outside = dir.path().join("secret.jpg");
        tokio::fs::write(&outside, b"secret").await?;
        tokio::fs::symlink(&outside, backend.directory().join("link.jpg")).await?;

        let res = backend.fetch("link.jpg").await;
        assert!(matches!(res, Err(StorageError::InvalidPath(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters_unrecognised_files() -> anyhow::Result<()> {
        let (_dir, backend) = backend().await?;
        backend.store("a.jpg", Bytes::from_static(b"a")).await?;
        backend.store("b.WEBP", Bytes::from_static(b"bb")).await?;
        backend.store("notes.txt", Bytes::from_static(b"c")).await?;
        tokio::fs::create_dir(backend.directory().join("folder.png")).await?;

        let mut names: Vec<_> = backend
            .list()
            .await?
            .into_iter()
            .map(|file| (file.filename, file.size))
            .collect();
        names.sort();

        assert_eq!(names, vec![("a.jpg".to_string(), 1), ("b.WEBP".to_string(), 2)]);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_missing_reports_false() -> anyhow::Result<()> {
        let (_dir, backend) = backend().await?;

        assert!(!backend.delete("missing.jpg").await?);
        backend.store("present.jpg", Bytes::from_static(b"x")).await?;
        assert!(backend.delete("present.jpg").await?);
        assert!(backend.fetch("present.jpg").await?.is_none());
        Ok(())
    }
}

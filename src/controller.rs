use std::sync::Arc;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use poem_openapi::Object;
use rand::seq::SliceRandom;

use crate::config::ImageKind;
use crate::naming;
use crate::storage::{StorageBackend, StorageError, StoredFile};

/// Everything except the RFC 3986 unreserved characters is escaped in a
/// filename path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Object, Debug)]
pub struct UploadInfo {
    /// Always `true` for a stored upload.
    pub success: bool,

    /// The name the image was stored under.
    pub filename: String,
}

#[derive(Object, Debug, Clone)]
pub struct ImageEntry {
    /// The stored filename.
    pub filename: String,

    /// The URL the raw image can be fetched from.
    pub url: String,

    #[oai(rename = "uploadedAt")]
    /// The last modification time of the stored file.
    pub uploaded_at: DateTime<Utc>,

    /// The file size in bytes.
    pub size: u64,
}

#[derive(Object, Debug)]
pub struct DeleteResult {
    pub filename: String,

    pub deleted: bool,

    #[oai(skip_serializing_if_is_none)]
    /// Why the file could not be deleted.
    pub error: Option<String>,
}

impl DeleteResult {
    fn deleted(filename: String) -> Self {
        Self { filename, deleted: true, error: None }
    }

    fn failed(filename: String, error: impl Into<String>) -> Self {
        Self { filename, deleted: false, error: Some(error.into()) }
    }
}

/// Raw image data along with the content type it should be served as.
pub struct ImageData {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

pub struct AlbumController {
    storage: Arc<dyn StorageBackend>,
    public_url: Option<String>,
}

impl AlbumController {
    pub fn new(storage: Arc<dyn StorageBackend>, public_url: Option<String>) -> Self {
        Self {
            storage,
            public_url: public_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// The base used for absolute image URLs.
    ///
    /// The configured public URL wins, then the request's host, otherwise
    /// URLs are left relative to the site root.
    pub fn base_url(&self, host: Option<&str>) -> String {
        match (&self.public_url, host) {
            (Some(url), _) => url.clone(),
            (None, Some(host)) => format!("http://{}", host),
            (None, None) => String::new(),
        }
    }

    pub async fn upload(&self, filename: &str, data: Bytes) -> Result<UploadInfo, StorageError> {
        let stem = filename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(filename);
        if !naming::is_valid_base(stem) {
            debug!("Storing {:?} which does not follow the album naming rules", filename);
        }

        let size = data.len();
        self.storage.store(filename, data).await?;

        info!("Stored image {:?} ({} bytes)", filename, size);
        Ok(UploadInfo {
            success: true,
            filename: filename.to_string(),
        })
    }

    /// Stores a file shared from another app, deriving the name from the
    /// shared file's own name.
    pub async fn share(&self, original: &str, data: Bytes) -> Result<UploadInfo, StorageError> {
        let filename = naming::suggest_filename(original);
        debug!("Shared file {:?} will be stored as {:?}", original, &filename);
        self.upload(&filename, data).await
    }

    /// Lists every stored image, most recently modified first.
    pub async fn list(&self, base_url: &str) -> Result<Vec<ImageEntry>, StorageError> {
        let mut files = self.storage.list().await?;
        files.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| a.filename.cmp(&b.filename))
        });

        let entries = files
            .into_iter()
            .map(|file| ImageEntry {
                url: format!(
                    "{}/image/{}",
                    base_url,
                    utf8_percent_encode(&file.filename, PATH_SEGMENT),
                ),
                filename: file.filename,
                uploaded_at: file.modified,
                size: file.size,
            })
            .collect();

        Ok(entries)
    }

    pub async fn fetch(&self, filename: &str) -> Result<Option<ImageData>, StorageError> {
        let data = match self.storage.fetch(filename).await {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(None),
            Err(StorageError::InvalidPath(name)) => {
                warn!("Rejected fetch for invalid filename {:?}", name);
                return Ok(None);
            },
            Err(other) => return Err(other),
        };

        Ok(Some(ImageData {
            content_type: ImageKind::content_type_for(filename),
            filename: filename.to_string(),
            data,
        }))
    }

    pub async fn fetch_random(&self) -> Result<Option<ImageData>, StorageError> {
        let files = self.storage.list().await?;
        let picked: Option<StoredFile> = files.choose(&mut rand::thread_rng()).cloned();

        match picked {
            None => Ok(None),
            Some(file) => self.fetch(&file.filename).await,
        }
    }

    /// Deletes each file independently, a failure for one name never stops
    /// the others from being processed.
    pub async fn delete(&self, filenames: Vec<String>) -> Vec<DeleteResult> {
        let mut results = Vec::with_capacity(filenames.len());

        for filename in filenames {
            let outcome = self.storage.delete(&filename).await;
            let result = match outcome {
                Ok(true) => DeleteResult::deleted(filename),
                Ok(false) => DeleteResult::failed(filename, "not found"),
                Err(StorageError::InvalidPath(_)) => {
                    warn!("Rejected delete for invalid filename {:?}", &filename);
                    DeleteResult::failed(filename, "invalid filename")
                },
                Err(other) => {
                    error!("Failed to delete {:?}: {}", &filename, &other);
                    let message = other.to_string();
                    DeleteResult::failed(filename, message)
                },
            };

            results.push(result);
        }

        let deleted = results.iter().filter(|r| r.deleted).count();
        info!("Deleted {} of {} requested images", deleted, results.len());

        results
    }
}

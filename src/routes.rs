use std::sync::Arc;
use bytes::Bytes;
use poem_openapi::payload::{Binary, Html, Json, PlainText};
use poem_openapi::param::{Header, Path};
use poem_openapi::types::multipart::Upload;
use poem_openapi::{ApiResponse, Multipart, Object, OpenApi};

use crate::controller::{AlbumController, DeleteResult, ImageData, ImageEntry, UploadInfo};
use crate::storage::StorageError;

const INDEX_PAGE: &str = include_str!("../static/index.html");
const MANIFEST: &str = include_str!("../static/manifest.webmanifest");

#[derive(Multipart)]
pub struct ImagePayload {
    /// The image file, the stored name is taken from the part's filename.
    image: Option<Upload>,
}

impl ImagePayload {
    /// Reads the uploaded file, returning its filename and data.
    async fn read(self) -> Result<Option<(String, Bytes)>, std::io::Error> {
        let upload = match self.image {
            Some(upload) => upload,
            None => return Ok(None),
        };

        let filename = match upload.file_name() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Ok(None),
        };

        let data = upload.into_vec().await?;
        Ok(Some((filename, Bytes::from(data))))
    }
}

#[derive(Object, Debug)]
pub struct ImageList {
    images: Vec<ImageEntry>,
}

#[derive(Object, Debug)]
pub struct DeleteRequest {
    /// The names of the images to remove.
    filenames: Vec<String>,
}

#[derive(Object, Debug)]
pub struct DeleteResults {
    results: Vec<DeleteResult>,
}

#[derive(ApiResponse)]
pub enum UploadResponse {
    /// The image was stored.
    #[oai(status = 200)]
    Ok(Json<UploadInfo>),

    /// No image was provided or its filename is not usable.
    #[oai(status = 400)]
    BadRequest(PlainText<String>),

    /// The image could not be written to storage.
    #[oai(status = 500)]
    StorageFailure(PlainText<String>),
}

#[derive(ApiResponse)]
pub enum ShareResponse {
    /// The image was stored, the client is sent back to the album page.
    #[oai(status = 303)]
    Shared(PlainText<String>, #[oai(header = "location")] String),

    #[oai(status = 400)]
    BadRequest(PlainText<String>),

    #[oai(status = 500)]
    StorageFailure(PlainText<String>),
}

#[derive(ApiResponse)]
pub enum ListResponse {
    /// All images, most recently uploaded first.
    #[oai(status = 200)]
    Ok(Json<ImageList>),

    #[oai(status = 500)]
    StorageFailure(PlainText<String>),
}

#[derive(ApiResponse)]
pub enum FetchResponse {
    /// The raw image data.
    #[oai(status = 200)]
    Ok(Binary<Vec<u8>>, #[oai(header = "content-type")] String),

    #[oai(status = 404)]
    NotFound(PlainText<String>),

    #[oai(status = 500)]
    StorageFailure(PlainText<String>),
}

impl From<ImageData> for FetchResponse {
    fn from(image: ImageData) -> Self {
        Self::Ok(Binary(image.data.to_vec()), image.content_type)
    }
}

#[derive(ApiResponse)]
pub enum StaticResponse {
    #[oai(status = 200)]
    Ok(Binary<Vec<u8>>, #[oai(header = "content-type")] String),
}

pub struct AlbumApi {
    controller: Arc<AlbumController>,
}

impl AlbumApi {
    pub fn new(controller: Arc<AlbumController>) -> Self {
        Self { controller }
    }

    async fn store_upload(&self, payload: ImagePayload, shared: bool) -> Result<UploadInfo, UploadError> {
        let (filename, data) = match payload.read().await {
            Ok(Some(upload)) => upload,
            Ok(None) => return Err(UploadError::BadRequest("No image provided".to_string())),
            Err(e) => {
                warn!("Failed to read upload body: {}", e);
                return Err(UploadError::BadRequest("Failed to read image".to_string()));
            },
        };

        let result = if shared {
            self.controller.share(&filename, data).await
        } else {
            self.controller.upload(&filename, data).await
        };

        result.map_err(|e| match e {
            StorageError::InvalidPath(name) => {
                warn!("Rejected upload with invalid filename {:?}", name);
                UploadError::BadRequest("Invalid filename".to_string())
            },
            StorageError::Io(e) => {
                error!("Failed to store upload {:?}: {}", &filename, e);
                UploadError::StorageFailure("Upload failed".to_string())
            },
        })
    }
}

enum UploadError {
    BadRequest(String),
    StorageFailure(String),
}

#[OpenApi]
impl AlbumApi {
    /// The album page.
    #[oai(path = "/", method = "get")]
    async fn index(&self) -> Html<String> {
        Html(INDEX_PAGE.to_string())
    }

    /// The web app manifest, registering the album as a share target.
    #[oai(path = "/manifest.webmanifest", method = "get")]
    async fn manifest(&self) -> StaticResponse {
        StaticResponse::Ok(
            Binary(MANIFEST.as_bytes().to_vec()),
            "application/manifest+json".to_string(),
        )
    }

    /// Upload an image
    ///
    /// Stores the `image` part under its given filename, replacing any
    /// existing image with the same name.
    #[oai(path = "/upload", method = "post")]
    async fn upload(&self, payload: ImagePayload) -> UploadResponse {
        match self.store_upload(payload, false).await {
            Ok(info) => UploadResponse::Ok(Json(info)),
            Err(UploadError::BadRequest(msg)) => UploadResponse::BadRequest(PlainText(msg)),
            Err(UploadError::StorageFailure(msg)) => UploadResponse::StorageFailure(PlainText(msg)),
        }
    }

    /// Share an image
    ///
    /// The share target endpoint, the stored filename is derived from the
    /// shared file's name.
    #[oai(path = "/share", method = "post")]
    async fn share(&self, payload: ImagePayload) -> ShareResponse {
        match self.store_upload(payload, true).await {
            Ok(info) => ShareResponse::Shared(
                PlainText(info.filename),
                "/?shared=success".to_string(),
            ),
            Err(UploadError::BadRequest(msg)) => ShareResponse::BadRequest(PlainText(msg)),
            Err(UploadError::StorageFailure(msg)) => ShareResponse::StorageFailure(PlainText(msg)),
        }
    }

    /// List images
    #[oai(path = "/images", method = "get")]
    async fn list(&self, host: Header<Option<String>>) -> ListResponse {
        let base_url = self.controller.base_url(host.0.as_deref());

        match self.controller.list(&base_url).await {
            Ok(images) => ListResponse::Ok(Json(ImageList { images })),
            Err(e) => {
                error!("Failed to list images: {}", e);
                ListResponse::StorageFailure(PlainText("Failed to list images".to_string()))
            },
        }
    }

    /// Fetch an image
    #[oai(path = "/image/:filename", method = "get")]
    async fn fetch(&self, filename: Path<String>) -> FetchResponse {
        match self.controller.fetch(&filename.0).await {
            Ok(Some(image)) => image.into(),
            Ok(None) => FetchResponse::NotFound(PlainText("Image not found".to_string())),
            Err(e) => {
                error!("Failed to fetch image {:?}: {}", &filename.0, e);
                FetchResponse::StorageFailure(PlainText("Failed to get image".to_string()))
            },
        }
    }

    /// Fetch a random image
    #[oai(path = "/random", method = "get")]
    async fn random(&self) -> FetchResponse {
        match self.controller.fetch_random().await {
            Ok(Some(image)) => {
                debug!("Serving random image {:?}", &image.filename);
                image.into()
            },
            Ok(None) => FetchResponse::NotFound(PlainText("No images available".to_string())),
            Err(e) => {
                error!("Failed to get random image: {}", e);
                FetchResponse::StorageFailure(PlainText("Failed to get random image".to_string()))
            },
        }
    }

    /// Delete images
    ///
    /// Each filename is handled on its own, the response reports the outcome
    /// for every requested name in order.
    #[oai(path = "/delete", method = "post")]
    async fn delete(&self, payload: Json<DeleteRequest>) -> Json<DeleteResults> {
        let results = self.controller.delete(payload.0.filenames).await;
        Json(DeleteResults { results })
    }
}

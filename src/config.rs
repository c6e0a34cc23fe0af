use std::path::{Path, PathBuf};
use serde::Deserialize;
use strum::{EnumIter, IntoEnumIterator};

use crate::storage::backends::BackendConfigs;

#[derive(Debug, clap::Parser)]
#[clap(author, version, about)]
pub struct ServerConfig {
    #[clap(long, default_value = "127.0.0.1", env = "HOST")]
    /// The host to bind the server to.
    pub host: String,

    #[clap(short, long, default_value = "3000", env = "PORT")]
    /// The port to bind the server to.
    pub port: u16,

    #[clap(long, env = "PUBLIC_URL")]
    /// The external base URL used when building image links, e.g. `https://photos.example.com`.
    ///
    /// If omitted, links are built from the request's `Host` header.
    pub public_url: Option<String>,

    #[clap(short, long, env = "CONFIG_FILE")]
    /// An optional YAML file containing the runtime configuration.
    ///
    /// Without one the images are kept in `./album`.
    pub config: Option<PathBuf>,

    #[clap(long, default_value = "info", env = "LOG_LEVEL")]
    /// The log level filter, one of: trace, debug, info, warn, error.
    pub log_level: tracing::Level,
}

#[derive(Debug, Default, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    /// The storage backend configuration.
    ///
    /// Defaults to the filesystem backend in `./album`.
    pub backend: BackendConfigs,
}

impl RuntimeConfig {
    pub fn from_yaml(data: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(data)?)
    }

    pub async fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(path) => {
                let data = tokio::fs::read_to_string(path).await?;
                Self::from_yaml(&data)
            },
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, EnumIter)]
pub enum ImageKind {
    /// The JPEG encoding format, stored as either `.jpg` or `.jpeg`.
    Jpeg,

    /// The PNG encoding format.
    Png,

    /// The GIF encoding format.
    Gif,

    /// The WebP encoding format.
    Webp,
}

impl ImageKind {
    /// The lower-cased file extensions stored files of this kind may use.
    pub fn file_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Png => &["png"],
            Self::Gif => &["gif"],
            Self::Webp => &["webp"],
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_ascii_lowercase();
        Self::iter().find(|kind| kind.file_extensions().contains(&ext.as_str()))
    }

    /// Infers the kind from the text after the last `.` in the filename.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    pub fn as_content_type(&self) -> String {
        match self {
            Self::Jpeg => mime::IMAGE_JPEG.to_string(),
            Self::Png => mime::IMAGE_PNG.to_string(),
            Self::Gif => mime::IMAGE_GIF.to_string(),
            Self::Webp => "image/webp".to_string(),
        }
    }

    /// The content type for a stored file, falling back to a generic octet
    /// stream for anything unrecognised.
    pub fn content_type_for(filename: &str) -> String {
        Self::from_filename(filename)
            .map(|kind| kind.as_content_type())
            .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string())
    }
}

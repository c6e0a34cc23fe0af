use std::path::PathBuf;
use std::sync::Arc;
use serde::Deserialize;

use crate::StorageBackend;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendConfigs {
    FileSystem {
        directory: PathBuf,
    }
}

impl Default for BackendConfigs {
    fn default() -> Self {
        Self::FileSystem {
            directory: PathBuf::from("./album"),
        }
    }
}

impl BackendConfigs {
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn StorageBackend>> {
        match self {
            Self::FileSystem { directory } => {
                let backend = super::filesystem::FileSystemBackend::open(directory).await?;
                info!("Using filesystem storage @ {:?}", backend.directory());
                Ok(Arc::new(backend))
            }
        }
    }
}

//! Object storage collaborator for uploaded images and documents.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("URL {0} does not belong to this storage")]
    ForeignUrl(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` and return the public URL of the object.
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String, StorageError>;

    /// Delete the object behind `url`. A missing object is not an error.
    async fn delete(&self, url: &str) -> Result<(), StorageError>;
}

/// Objects stored as files under a local directory, served by the HTTP
/// server under `public_base_url`.
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative object path, refusing anything escaping the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        if path.trim().is_empty()
            || !relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)))
        {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn url_for(&self, path: &str) -> String {
        let encoded: Vec<String> = path
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }

    fn path_for_url(&self, url: &str) -> Result<String, StorageError> {
        let relative = url
            .strip_prefix(&self.public_base_url)
            .and_then(|rest| rest.strip_prefix('/'))
            .ok_or_else(|| StorageError::ForeignUrl(url.to_string()))?;
        let decoded = urlencoding::decode(relative)
            .map_err(|_| StorageError::InvalidPath(relative.to_string()))?;
        Ok(decoded.into_owned())
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, bytes: Vec<u8>, path: &str) -> Result<String, StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, &bytes).await?;
        debug!("Stored {} bytes at {:?}", bytes.len(), target);
        Ok(self.url_for(path))
    }

    async fn delete(&self, url: &str) -> Result<(), StorageError> {
        let path = self.path_for_url(url)?;
        let target = self.resolve(&path)?;
        match tokio::fs::remove_file(&target).await {
            Ok(()) => {
                debug!("Deleted {:?}", target);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Object {} already missing, nothing to delete", url);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

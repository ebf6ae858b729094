use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use url::Url;

use super::{ObjectStorage, Result, StorageError};
use crate::types::{FileInput, ObjectKey};

/// Local filesystem storage backend - stores objects under `{root}/{bucket}/{key}`.
/// Useful for development and testing; the service serves the directory at `/objects`.
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: PathBuf, public_base_url: Url) -> Self {
        Self {
            root,
            public_base_url: public_base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    fn object_path(&self, bucket: &str, key: &ObjectKey) -> Result<PathBuf> {
        let relative = Path::new(bucket).join(key.as_str());
        if !relative.components().all(|c| matches!(c, Component::Normal(_))) {
            return Err(StorageError::Rejected {
                status: 400,
                message: format!("Invalid object key: {key}"),
            });
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, bucket: &str, key: &ObjectKey, file: &FileInput) -> Result<()> {
        let full_path = self.object_path(bucket, key)?;

        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // create_new gives the same no-overwrite semantics as the hosted API
        let mut handle = match fs::OpenOptions::new().write(true).create_new(true).open(&full_path).await {
            Ok(handle) => handle,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(StorageError::Rejected {
                    status: 409,
                    message: "The resource already exists".to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        handle.write_all(&file.bytes).await?;
        handle.sync_all().await?;

        tracing::debug!(path = ?full_path, size = file.size(), "Object written to local storage");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &ObjectKey) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, key)
    }

    async fn remove(&self, bucket: &str, keys: &[ObjectKey]) -> Result<()> {
        for key in keys {
            let full_path = self.object_path(bucket, key)?;
            match fs::remove_file(&full_path).await {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }
}

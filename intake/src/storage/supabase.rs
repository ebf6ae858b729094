use async_trait::async_trait;
use reqwest::Method;
use serde_json::json;

use super::{ObjectStorage, Result, StorageError};
use crate::backend::{BackendClient, remote_error};
use crate::types::{FileInput, ObjectKey};

/// Cache lifetime the hosted storage attaches to uploaded objects
const CACHE_CONTROL: &str = "max-age=3600";

/// Object storage backed by the hosted storage REST API (`/storage/v1`)
pub struct SupabaseStorage {
    client: BackendClient,
}

impl SupabaseStorage {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    #[tracing::instrument(skip_all, fields(bucket = %bucket, key = %key, size = file.size()))]
    async fn upload(&self, bucket: &str, key: &ObjectKey, file: &FileInput) -> Result<()> {
        let content_type = if file.content_type.is_empty() {
            "application/octet-stream"
        } else {
            file.content_type.as_str()
        };

        let response = self
            .client
            .request(Method::POST, &format!("/storage/v1/object/{bucket}/{key}"))
            .header("content-type", content_type)
            .header("cache-control", CACHE_CONTROL)
            .header("x-upsert", "false")
            .body(file.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            let error = remote_error(response).await;
            tracing::warn!(status = error.status, message = %error.message, "Storage rejected upload");
            return Err(StorageError::Rejected {
                status: error.status,
                message: error.message,
            });
        }

        tracing::debug!("Object uploaded");
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &ObjectKey) -> String {
        self.client.url(&format!("/storage/v1/object/public/{bucket}/{key}"))
    }

    #[tracing::instrument(skip_all, fields(bucket = %bucket, count = keys.len()))]
    async fn remove(&self, bucket: &str, keys: &[ObjectKey]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .request(Method::DELETE, &format!("/storage/v1/object/{bucket}"))
            .json(&json!({ "prefixes": keys }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error = remote_error(response).await;
            return Err(StorageError::Rejected {
                status: error.status,
                message: error.message,
            });
        }

        Ok(())
    }
}

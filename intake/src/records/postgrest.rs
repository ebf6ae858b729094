use async_trait::async_trait;
use reqwest::Method;

use super::{RecordError, RecordWriter, Result};
use crate::backend::{BackendClient, remote_error};

/// Record writer backed by the hosted table REST API (`/rest/v1`)
pub struct PostgrestWriter {
    client: BackendClient,
}

impl PostgrestWriter {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl RecordWriter for PostgrestWriter {
    #[tracing::instrument(skip_all, fields(table = %table, rows = rows.len()))]
    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> Result<()> {
        let response = self
            .client
            .request(Method::POST, &format!("/rest/v1/{table}"))
            .header("prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;

        if !response.status().is_success() {
            let error = remote_error(response).await;
            tracing::warn!(
                status = error.status,
                code = ?error.code,
                message = %error.message,
                "Table rejected insert"
            );
            return Err(RecordError::Rejected {
                status: error.status,
                code: error.code,
                message: error.message,
            });
        }

        Ok(())
    }
}

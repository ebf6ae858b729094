//! Shared client for the hosted backend (object storage + table REST API).
//!
//! A single [`BackendClient`] is built from configuration at startup and cloned into both
//! [`crate::storage::SupabaseStorage`] and [`crate::records::PostgrestWriter`], so they share one
//! connection pool and one set of credentials.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use url::Url;

use crate::config::BackendConfig;
use crate::records::{JsonlRecordWriter, PostgrestWriter, RecordWriter};
use crate::storage::{LocalObjectStorage, ObjectStorage, SupabaseStorage};

/// The two collaborators every flow talks to
#[derive(Clone)]
pub struct Backends {
    pub storage: Arc<dyn ObjectStorage>,
    pub records: Arc<dyn RecordWriter>,
}

/// Create the storage and table backends selected by configuration
pub async fn connect(config: &BackendConfig) -> anyhow::Result<Backends> {
    match config {
        BackendConfig::Supabase { .. } => {
            let client = BackendClient::from_config(config)?;
            tracing::info!("Using hosted backend at {}", client.base_url());
            Ok(Backends {
                storage: Arc::new(SupabaseStorage::new(client.clone())),
                records: Arc::new(PostgrestWriter::new(client)),
            })
        }
        BackendConfig::Local { path, public_base_url } => {
            let objects = path.join("objects");
            let tables = path.join("tables");
            tracing::info!("Using local backend (objects: {:?}, tables: {:?})", objects, tables);
            for dir in [&objects, &tables] {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| anyhow::anyhow!("Failed to create local backend directory {:?}: {}", dir, e))?;
            }
            Ok(Backends {
                storage: Arc::new(LocalObjectStorage::new(objects, public_base_url.clone())),
                records: Arc::new(JsonlRecordWriter::new(tables)),
            })
        }
    }
}

#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BackendClient {
    pub fn new(base_url: &Url, api_key: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    pub fn from_config(config: &BackendConfig) -> anyhow::Result<Self> {
        match config {
            BackendConfig::Supabase { url, api_key, timeout } => Self::new(url, api_key.clone(), *timeout),
            BackendConfig::Local { .. } => anyhow::bail!("The local backend has no hosted client"),
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Start an authenticated request against `path` (which must start with `/`)
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }
}

/// Error body returned by the storage and table APIs.
///
/// Storage answers `{"statusCode": "409", "error": "Duplicate", "message": "..."}`, the table
/// API answers `{"code": "23505", "details": ..., "hint": ..., "message": "..."}`.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    error: Option<String>,
    code: Option<serde_json::Value>,
}

/// Details extracted from a non-success response
#[derive(Debug)]
pub(crate) struct RemoteError {
    pub status: u16,
    pub code: Option<String>,
    pub message: String,
}

/// Consume a non-success response and pull out the most useful message it carries
pub(crate) async fn remote_error(response: Response) -> RemoteError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let body: ErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let message = body
        .message
        .filter(|m| !m.is_empty())
        .or(body.error)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown error").to_string());

    let code = body.code.map(|c| match c {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    });

    RemoteError {
        status: status.as_u16(),
        code,
        message,
    }
}

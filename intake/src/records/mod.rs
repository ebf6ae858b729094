//! Record writers - insert metadata rows into the backend's tables.
//!
//! - [`PostgrestWriter`]: the hosted table REST API
//! - [`JsonlRecordWriter`]: one JSON-lines file per table, for development
//!
//! Inserts are always fresh inserts; there is no update or upsert path, and no transaction
//! spans an insert and the uploads that preceded it.

mod jsonl;
mod postgrest;

pub use jsonl::JsonlRecordWriter;
pub use postgrest::PostgrestWriter;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RecordError {
    /// The table API answered with an error
    #[error("{message}")]
    Rejected {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RecordError>;

#[async_trait]
pub trait RecordWriter: Send + Sync {
    /// Insert `rows` into `table`
    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> Result<()>;
}

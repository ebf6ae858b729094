//! Object storage backends.
//!
//! Uploaded files live in named buckets. Both backends implement [`ObjectStorage`]:
//!
//! - [`SupabaseStorage`]: the hosted storage REST API
//! - [`LocalObjectStorage`]: a directory on disk, for development
//!
//! Public URLs are derived from the bucket and key alone, so [`ObjectStorage::public_url`] never
//! touches the network.

mod local;
mod supabase;

pub use local::LocalObjectStorage;
pub use supabase::SupabaseStorage;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{FileInput, ObjectKey};

#[derive(Error, Debug)]
pub enum StorageError {
    /// The storage service answered with an error
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// The request never got a response
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Trait for object storage backends
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Upload a file under `key`. Never overwrites an existing object.
    async fn upload(&self, bucket: &str, key: &ObjectKey, file: &FileInput) -> Result<()>;

    /// Public, unauthenticated URL of the object stored under `key`
    fn public_url(&self, bucket: &str, key: &ObjectKey) -> String;

    /// Delete objects. Keys that do not exist are ignored.
    async fn remove(&self, bucket: &str, keys: &[ObjectKey]) -> Result<()>;
}

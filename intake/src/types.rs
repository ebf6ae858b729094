//! Common type definitions shared by the intake flows and the storage backends.
//!
//! - [`FileInput`]: a file selected on a form, as declared by the submitting client
//! - [`ObjectKey`]: the key of a stored object inside a bucket
//! - [`StoredObject`]: an uploaded object together with its public URL

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A file selected on a form.
///
/// `content_type` is whatever the client declared for the part, which may be empty. Nothing in
/// the crate sniffs the bytes to confirm it.
#[derive(Clone)]
pub struct FileInput {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl FileInput {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Size in bytes
    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

// Skip the payload: files can be tens of megabytes.
impl fmt::Debug for FileInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInput")
            .field("name", &self.name)
            .field("content_type", &self.content_type)
            .field("size", &self.size())
            .finish()
    }
}

/// Key of an object inside a bucket, e.g. `profiles/1721900000000_photo.png`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String, example = "profiles/1721900000000_photo.png")]
pub struct ObjectKey(String);

impl ObjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An uploaded object and the public URL a record uses to reference it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StoredObject {
    pub key: ObjectKey,
    pub url: String,
}

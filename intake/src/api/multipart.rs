use std::collections::HashMap;

use axum::extract::Multipart;

use crate::errors::{Error, Result};
use crate::types::FileInput;

/// Fields of a `multipart/form-data` submission, split into text values and files.
///
/// A file part that carries neither a file name nor any bytes is what a browser sends for a file
/// input with nothing chosen, and is treated as absent. Repeated fields keep the last value.
#[derive(Debug, Default)]
pub struct FormParts {
    texts: HashMap<String, String>,
    files: HashMap<String, FileInput>,
}

impl FormParts {
    pub async fn read(multipart: &mut Multipart) -> Result<Self> {
        let mut parts = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to parse multipart data: {}", e),
        })? {
            let Some(name) = field.name().filter(|n| !n.is_empty()).map(str::to_string) else {
                continue;
            };

            match field.file_name().map(str::to_string) {
                Some(file_name) => {
                    let content_type = field.content_type().unwrap_or_default().to_string();
                    let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
                        message: format!("Failed to read file field '{}': {}", name, e),
                    })?;

                    if file_name.is_empty() && bytes.is_empty() {
                        tracing::trace!(field = %name, "Skipping empty file field");
                        continue;
                    }

                    tracing::debug!(field = %name, file_name = %file_name, size = bytes.len(), "Received file");
                    parts.files.insert(name, FileInput::new(file_name, content_type, bytes));
                }
                None => {
                    let value = field.text().await.map_err(|e| Error::BadRequest {
                        message: format!("Failed to read field '{}': {}", name, e),
                    })?;
                    parts.texts.insert(name, value);
                }
            }
        }

        Ok(parts)
    }

    /// Take a text field; missing fields read as empty
    pub fn text(&mut self, name: &str) -> String {
        self.texts.remove(name).unwrap_or_default()
    }

    pub fn file(&mut self, name: &str) -> Option<FileInput> {
        self.files.remove(name)
    }
}

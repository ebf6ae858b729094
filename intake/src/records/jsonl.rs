use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::{RecordError, RecordWriter, Result};

/// Appends rows to `{root}/{table}.jsonl`, one JSON document per line
pub struct JsonlRecordWriter {
    root: PathBuf,
}

impl JsonlRecordWriter {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

#[async_trait]
impl RecordWriter for JsonlRecordWriter {
    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> Result<()> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(RecordError::Rejected {
                status: 400,
                code: None,
                message: format!("Invalid table name: {table}"),
            });
        }

        // Serialize everything first so a bad row never leaves a partial write behind
        let mut buffer = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buffer, row)?;
            buffer.push(b'\n');
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(format!("{table}.jsonl")))
            .await?;
        file.write_all(&buffer).await?;
        file.sync_all().await?;

        Ok(())
    }
}

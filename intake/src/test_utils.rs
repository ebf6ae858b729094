//! Test utilities: recording backends, a recording presenter and form builders (available with
//! the `test-utils` feature).

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::flows::doctors::DoctorForm;
use crate::flows::entertainment::EntertainmentForm;
use crate::flows::presenter::{FormView, Presenter, SubmissionState};
use crate::records::{RecordError, RecordWriter};
use crate::storage::{ObjectStorage, StorageError};
use crate::types::{FileInput, ObjectKey};

/// Minimal PNG signature followed by zero padding up to `size` bytes
pub fn png(name: &str, size: usize) -> FileInput {
    const SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    let mut bytes = vec![0u8; size];
    let prefix = size.min(SIGNATURE.len());
    bytes[..prefix].copy_from_slice(&SIGNATURE[..prefix]);
    FileInput::new(name, "image/png", bytes)
}

pub fn file(name: &str, content_type: &str, size: usize) -> FileInput {
    FileInput::new(name, content_type, vec![0u8; size])
}

pub fn doctor_form() -> DoctorForm {
    DoctorForm {
        name: "Dr. Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone: "555-0100".to_string(),
        category: "Cardiology".to_string(),
        profile_picture: Some(png("photo.png", 1024)),
    }
}

pub fn entertainment_form() -> EntertainmentForm {
    EntertainmentForm {
        title: "Night Drive".to_string(),
        kind: "Movie".to_string(),
        description: "A short film".to_string(),
        cover_img: Some(png("cover.png", 2048)),
        media_file: Some(file("movie.mp4", "video/mp4", 4096)),
    }
}

/// reqwest is built without a bundled crypto provider
pub fn install_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

/// In-memory storage that records every call. Uploads can be made to fail, or to wait for a
/// gate, by call number.
#[derive(Default)]
pub struct RecordingStorage {
    fail_upload: Option<(usize, String)>,
    gate: Option<(usize, Arc<Notify>)>,
    fail_remove: bool,
    upload_calls: Mutex<usize>,
    uploaded: Mutex<Vec<(String, String)>>,
    removed: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingStorage {
    /// Fail the `call`-th upload (1-based) with `message`
    pub fn failing_upload(call: usize, message: &str) -> Self {
        Self {
            fail_upload: Some((call, message.to_string())),
            ..Default::default()
        }
    }

    /// Hold the `call`-th upload (1-based) until `gate` is notified
    pub fn with_gated_upload(mut self, call: usize, gate: Arc<Notify>) -> Self {
        self.gate = Some((call, gate));
        self
    }

    pub fn with_failing_remove(mut self) -> Self {
        self.fail_remove = true;
        self
    }

    /// Successful uploads as `(bucket, key)`
    pub fn uploaded(&self) -> Vec<(String, String)> {
        self.uploaded.lock().unwrap().clone()
    }

    /// Remove calls as `(bucket, keys)`, including failed ones
    pub fn removed(&self) -> Vec<(String, Vec<String>)> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStorage for RecordingStorage {
    async fn upload(&self, bucket: &str, key: &ObjectKey, _file: &FileInput) -> crate::storage::Result<()> {
        let call = {
            let mut calls = self.upload_calls.lock().unwrap();
            *calls += 1;
            *calls
        };

        if let Some((gated_call, gate)) = &self.gate
            && *gated_call == call
        {
            gate.notified().await;
        }

        if let Some((failing_call, message)) = &self.fail_upload
            && *failing_call == call
        {
            return Err(StorageError::Rejected {
                status: 400,
                message: message.clone(),
            });
        }

        self.uploaded.lock().unwrap().push((bucket.to_string(), key.to_string()));
        Ok(())
    }

    fn public_url(&self, bucket: &str, key: &ObjectKey) -> String {
        format!("https://storage.test/public/{bucket}/{key}")
    }

    async fn remove(&self, bucket: &str, keys: &[ObjectKey]) -> crate::storage::Result<()> {
        self.removed
            .lock()
            .unwrap()
            .push((bucket.to_string(), keys.iter().map(ToString::to_string).collect()));

        if self.fail_remove {
            return Err(StorageError::Rejected {
                status: 500,
                message: "remove failed".to_string(),
            });
        }
        Ok(())
    }
}

/// Record writer that keeps inserted rows in memory, or rejects every insert
#[derive(Default)]
pub struct RecordingWriter {
    failure: Option<String>,
    inserts: Mutex<Vec<(String, Vec<serde_json::Value>)>>,
}

impl RecordingWriter {
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Default::default()
        }
    }

    /// Successful inserts as `(table, rows)`
    pub fn inserts(&self) -> Vec<(String, Vec<serde_json::Value>)> {
        self.inserts.lock().unwrap().clone()
    }
}

#[async_trait]
impl RecordWriter for RecordingWriter {
    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> crate::records::Result<()> {
        if let Some(message) = &self.failure {
            return Err(RecordError::Rejected {
                status: 400,
                code: None,
                message: message.clone(),
            });
        }
        self.inserts.lock().unwrap().push((table.to_string(), rows.to_vec()));
        Ok(())
    }
}

/// Presenter that applies calls to a [`FormView`] and keeps their history
#[derive(Default)]
pub struct RecordingPresenter {
    view: Mutex<FormView>,
    states: Mutex<Vec<SubmissionState>>,
    progress: Mutex<Vec<u8>>,
    hide_after: Mutex<Option<Duration>>,
}

impl RecordingPresenter {
    pub fn view(&self) -> FormView {
        self.view.lock().unwrap().clone()
    }

    /// Every state entered, in order
    pub fn states(&self) -> Vec<SubmissionState> {
        self.states.lock().unwrap().clone()
    }

    /// Every progress value shown, in order
    pub fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }

    pub fn hide_after(&self) -> Option<Duration> {
        *self.hide_after.lock().unwrap()
    }

    fn record(&self) {
        let view = self.view.lock().unwrap().clone();
        let mut states = self.states.lock().unwrap();
        if states.last() != Some(&view.state) {
            states.push(view.state);
        }
        if let Some(progress) = view.progress {
            let mut shown = self.progress.lock().unwrap();
            if shown.last() != Some(&progress) {
                shown.push(progress);
            }
        }
    }
}

impl Presenter for RecordingPresenter {
    fn begin(&self) -> bool {
        let started = self.view.lock().unwrap().begin();
        if started {
            self.record();
        }
        started
    }

    fn select_file(&self, field: &str, file: &FileInput) {
        self.view.lock().unwrap().select_file(field, file);
    }

    fn transition(&self, state: SubmissionState) {
        self.view.lock().unwrap().transition(state);
        self.record();
    }

    fn set_progress(&self, percent: u8) {
        self.view.lock().unwrap().set_progress(percent);
        self.record();
    }

    fn succeed(&self, message: &str, hide_after: Duration) {
        self.view.lock().unwrap().succeed(message);
        *self.hide_after.lock().unwrap() = Some(hide_after);
        self.record();
    }

    fn fail(&self, message: &str) {
        self.view.lock().unwrap().fail(message);
        self.record();
    }

    fn release(&self) {
        self.view.lock().unwrap().release();
    }
}

#[cfg(test)]
pub use server::*;

#[cfg(test)]
mod server {
    use std::sync::Arc;

    use axum_test::TestServer;

    use super::{RecordingStorage, RecordingWriter};
    use crate::backend::Backends;
    use crate::config::Config;

    pub fn create_test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..Default::default()
        }
    }

    /// Application over recording backends. The backends are returned for inspection.
    pub fn create_test_app(config: Config) -> (TestServer, Arc<RecordingStorage>, Arc<RecordingWriter>) {
        create_test_app_with(config, RecordingStorage::default(), RecordingWriter::default())
    }

    pub fn create_test_app_with(
        config: Config,
        storage: RecordingStorage,
        writer: RecordingWriter,
    ) -> (TestServer, Arc<RecordingStorage>, Arc<RecordingWriter>) {
        let storage = Arc::new(storage);
        let writer = Arc::new(writer);
        let backends = Backends {
            storage: storage.clone(),
            records: writer.clone(),
        };

        let app = crate::Application::with_backends(config, backends).expect("Failed to create application");
        (app.into_test_server(), storage, writer)
    }
}

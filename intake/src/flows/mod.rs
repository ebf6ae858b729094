//! The intake pipeline shared by every form.
//!
//! A submission runs strictly in order: validate, upload each file, insert one record. If a later
//! step fails, the objects uploaded so far are removed again so no record ever points at a
//! missing object, and no object outlives a failed submission.
//!
//! Each form describes itself with a static [`FlowDefinition`] (which file slots it has, which
//! rules apply, which messages it shows) and implements [`IntakeForm`] to turn the stored objects
//! into its record. [`Intake`] drives the rest.

pub mod doctors;
pub mod entertainment;
pub mod keys;
pub mod presenter;
pub mod validation;

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use crate::backend::Backends;
use crate::errors::Error;
use crate::records::RecordWriter;
use crate::storage::ObjectStorage;
use crate::types::{FileInput, ObjectKey, StoredObject};
use presenter::{PROGRESS_VALIDATED, Presenter, SubmissionState, upload_checkpoint};

/// Where a flow's files and record go. Built from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowTarget {
    pub bucket: String,
    pub table: String,
    /// How long the progress indicator stays visible after a successful submission
    pub hide_progress_after: Duration,
}

/// Per-file validation rule
#[derive(Debug, Clone, Copy)]
pub struct FileRule {
    /// Inclusive size ceiling in bytes
    pub max_bytes: u64,
    /// Whether the declared content type must start with `image/`
    pub require_image: bool,
    pub too_large: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct FileSlot {
    /// Multipart field name
    pub field: &'static str,
    /// Key prefix inside the bucket
    pub folder: &'static str,
    /// Name used in upload failure messages
    pub label: &'static str,
    pub rule: FileRule,
}

#[derive(Debug)]
pub struct FlowDefinition {
    pub name: &'static str,
    /// File slots, in upload order
    pub slots: &'static [FileSlot],
    pub missing_files: &'static str,
    pub success_message: &'static str,
}

impl FlowDefinition {
    /// Combined size ceiling of every file slot
    pub fn max_file_bytes(&self) -> u64 {
        self.slots.iter().map(|slot| slot.rule.max_bytes).sum()
    }
}

/// A submitted form that the pipeline can store
pub trait IntakeForm: Send {
    type Record: Serialize + Send;

    const FLOW: &'static FlowDefinition;

    /// Selected files, one entry per slot of [`Self::FLOW`], in slot order
    fn files(&self) -> Vec<Option<&FileInput>>;

    /// Build the record from the uploaded objects (one per slot, in slot order)
    fn into_record(self, objects: &[StoredObject]) -> Result<Self::Record, Error>;
}

/// Outcome of a successful submission
#[derive(Debug)]
pub struct Submitted<R> {
    pub message: &'static str,
    pub record: R,
    pub objects: Vec<StoredObject>,
}

#[derive(Clone)]
pub struct Intake {
    storage: Arc<dyn ObjectStorage>,
    records: Arc<dyn RecordWriter>,
}

impl Intake {
    pub fn new(backends: Backends) -> Self {
        Self {
            storage: backends.storage,
            records: backends.records,
        }
    }

    pub async fn submit<F: IntakeForm>(
        &self,
        form: F,
        target: &FlowTarget,
        presenter: &dyn Presenter,
    ) -> Result<Submitted<F::Record>, Error> {
        self.submit_at(form, target, presenter, Utc::now()).await
    }

    /// Run [`Intake::submit`] on its own task and wait for it. Dropping the returned future (a
    /// client disconnecting, say) does not cancel the submission: it still ends in success or
    /// in compensation.
    pub async fn submit_detached<F, P>(
        &self,
        form: F,
        target: FlowTarget,
        presenter: P,
    ) -> Result<Submitted<F::Record>, Error>
    where
        F: IntakeForm + 'static,
        F::Record: 'static,
        P: Presenter + 'static,
    {
        let intake = self.clone();
        let task = tokio::spawn(async move { intake.submit(form, &target, &presenter).await }.in_current_span());

        task.await.map_err(|e| Error::Internal {
            operation: format!("run {} submission: {e}", F::FLOW.name),
        })?
    }

    /// Run one submission. `submitted_at` prefixes every object key of the submission.
    #[tracing::instrument(skip_all, fields(flow = F::FLOW.name, bucket = %target.bucket, table = %target.table))]
    pub async fn submit_at<F: IntakeForm>(
        &self,
        form: F,
        target: &FlowTarget,
        presenter: &dyn Presenter,
        submitted_at: DateTime<Utc>,
    ) -> Result<Submitted<F::Record>, Error> {
        let flow = F::FLOW;

        if !presenter.begin() {
            return Err(Error::Conflict {
                message: "A submission is already in progress for this form".to_string(),
            });
        }
        let _release = scopeguard::guard((), |_| presenter.release());

        for (slot, file) in flow.slots.iter().zip(form.files()) {
            if let Some(file) = file {
                presenter.select_file(slot.field, file);
            }
        }

        let result = self.run(form, target, presenter, submitted_at).await;

        match &result {
            Ok(submitted) => {
                tracing::info!(objects = submitted.objects.len(), "Submission stored");
                presenter.succeed(flow.success_message, target.hide_progress_after);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Submission failed");
                presenter.fail(&e.user_message());
            }
        }

        let outcome = match &result {
            Ok(_) => "success",
            Err(Error::Validation { .. }) => "invalid",
            Err(Error::Upload { .. }) => "upload_failed",
            Err(Error::Insert { .. }) => "insert_failed",
            Err(_) => "error",
        };
        metrics::counter!("intake_submissions_total", "flow" => flow.name, "outcome" => outcome).increment(1);

        result
    }

    async fn run<F: IntakeForm>(
        &self,
        form: F,
        target: &FlowTarget,
        presenter: &dyn Presenter,
        submitted_at: DateTime<Utc>,
    ) -> Result<Submitted<F::Record>, Error> {
        let flow = F::FLOW;
        let files = form.files();

        validation::validate(flow, &files)?;
        presenter.set_progress(PROGRESS_VALIDATED);

        let timestamp = submitted_at.timestamp_millis();
        let total = flow.slots.len();
        let mut uploaded: Vec<ObjectKey> = Vec::with_capacity(total);

        for (index, (slot, file)) in flow.slots.iter().zip(files).enumerate() {
            let file = file.ok_or_else(|| Error::Internal {
                operation: format!("read {} after validation", slot.field),
            })?;

            presenter.transition(SubmissionState::Uploading { index: index + 1, total });
            presenter.set_progress(upload_checkpoint(index));

            let key = keys::object_key(slot.folder, timestamp, &file.name);
            if let Err(source) = self.storage.upload(&target.bucket, &key, file).await {
                if !uploaded.is_empty() {
                    presenter.transition(SubmissionState::CompensatingPartial);
                    self.compensate(&target.bucket, &uploaded).await;
                }
                return Err(Error::Upload { label: slot.label, source });
            }
            tracing::debug!(key = %key, "Uploaded {}", slot.field);
            uploaded.push(key);
        }
        presenter.set_progress(upload_checkpoint(total));

        let objects: Vec<StoredObject> = uploaded
            .iter()
            .map(|key| StoredObject {
                key: key.clone(),
                url: self.storage.public_url(&target.bucket, key),
            })
            .collect();

        presenter.transition(SubmissionState::Inserting);
        let record = match self.insert(form, &target.table, &objects).await {
            Ok(record) => record,
            Err(e) => {
                presenter.transition(SubmissionState::CompensatingFull);
                self.compensate(&target.bucket, &uploaded).await;
                return Err(e);
            }
        };

        Ok(Submitted {
            message: flow.success_message,
            record,
            objects,
        })
    }

    async fn insert<F: IntakeForm>(&self, form: F, table: &str, objects: &[StoredObject]) -> Result<F::Record, Error> {
        let record = form.into_record(objects)?;
        let row = serde_json::to_value(&record).map_err(|e| Error::Other(e.into()))?;
        self.records
            .insert(table, std::slice::from_ref(&row))
            .await
            .map_err(|source| Error::Insert { source })?;
        Ok(record)
    }

    /// Remove objects uploaded by a submission that did not complete. Failures are logged only:
    /// the caller reports the error that triggered compensation.
    #[tracing::instrument(skip(self), fields(count = keys.len()))]
    pub async fn compensate(&self, bucket: &str, keys: &[ObjectKey]) {
        match self.storage.remove(bucket, keys).await {
            Ok(()) => tracing::info!("Removed {} uploaded object(s) after failed submission", keys.len()),
            Err(e) => tracing::warn!(error = %e, keys = ?keys, "Failed to remove uploaded objects, they are now orphaned"),
        }
    }
}

//! Form instances and the presenter state each one exposes.
//!
//! Every browser form is identified by a form-instance id (the `x-form-instance` header). The
//! id maps to a [`FormSession`] holding that form's [`FormView`], which the intake pipeline
//! drives through the [`Presenter`] trait and clients read back with
//! `GET /api/v1/forms/{instance}`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use moka::future::Cache;
use uuid::Uuid;

use crate::config::FormsConfig;
use crate::errors::Error;
use crate::flows::presenter::{FormView, Presenter, SubmissionState};
use crate::types::FileInput;

const MAX_INSTANCE_ID_LEN: usize = 128;

/// One form instance. Clones share the same view.
#[derive(Debug, Clone)]
pub struct FormSession {
    id: String,
    view: Arc<Mutex<FormView>>,
    /// Bumped on every started submission, so a delayed hide from an earlier one can tell it is
    /// stale
    generation: Arc<AtomicU64>,
}

impl FormSession {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            view: Arc::new(Mutex::new(FormView::default())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Snapshot of the current view
    pub fn view(&self) -> FormView {
        self.with_view(|view| view.clone())
    }

    fn with_view<R>(&self, f: impl FnOnce(&mut FormView) -> R) -> R {
        // Every update leaves the view consistent, so a poisoned lock is still usable
        let mut view = self.view.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut view)
    }

    fn schedule_hide(&self, after: Duration) {
        let generation = self.generation.load(Ordering::SeqCst);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.with_view(FormView::hide_progress);
            return;
        };

        let session = self.clone();
        handle.spawn(async move {
            tokio::time::sleep(after).await;
            if session.generation.load(Ordering::SeqCst) == generation {
                session.with_view(FormView::hide_progress);
                tracing::trace!(instance = %session.id, "Progress hidden");
            }
        });
    }
}

impl Presenter for FormSession {
    fn begin(&self) -> bool {
        let started = self.with_view(FormView::begin);
        if started {
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        started
    }

    fn select_file(&self, field: &str, file: &FileInput) {
        self.with_view(|view| view.select_file(field, file));
    }

    fn transition(&self, state: SubmissionState) {
        self.with_view(|view| view.transition(state));
    }

    fn set_progress(&self, percent: u8) {
        self.with_view(|view| view.set_progress(percent));
    }

    fn succeed(&self, message: &str, hide_after: Duration) {
        self.with_view(|view| view.succeed(message));
        self.schedule_hide(hide_after);
    }

    fn fail(&self, message: &str) {
        self.with_view(|view| view.fail(message));
    }

    fn release(&self) {
        self.with_view(FormView::release);
    }
}

/// All live form instances, forgotten after an idle period
#[derive(Clone)]
pub struct FormSessions {
    cache: Cache<String, FormSession>,
}

impl FormSessions {
    pub fn new(config: &FormsConfig) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(config.max_sessions)
                .time_to_idle(config.session_idle_timeout)
                .build(),
        }
    }

    /// Get the session for `instance`, creating it if needed. Without an id a fresh instance is
    /// created.
    pub async fn open(&self, instance: Option<&str>) -> Result<FormSession, Error> {
        let id = match instance {
            Some(id) => {
                validate_instance_id(id)?;
                id.to_string()
            }
            None => Uuid::new_v4().to_string(),
        };

        Ok(self.cache.get_with(id.clone(), async move { FormSession::new(id) }).await)
    }

    pub async fn get(&self, instance: &str) -> Option<FormSession> {
        self.cache.get(instance).await
    }
}

fn validate_instance_id(id: &str) -> Result<(), Error> {
    let valid = !id.is_empty()
        && id.len() <= MAX_INSTANCE_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(())
    } else {
        Err(Error::BadRequest {
            message: format!(
                "Invalid form instance id: expected 1-{MAX_INSTANCE_ID_LEN} characters of letters, digits, '-' or '_'"
            ),
        })
    }
}

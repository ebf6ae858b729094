//! Submission state machine and the view a form instance renders from it.
//!
//! A submission moves through [`SubmissionState`]:
//!
//! ```text
//! Idle -> Validating -> Uploading(1..N) -> Inserting -> Success -> (delayed) Idle
//!             |               |                |
//!             v               v                v
//!           Idle    CompensatingPartial   CompensatingFull
//!                      (or Idle)               |
//!                             \-> Idle <-------/
//! ```
//!
//! [`FormView`] carries everything a form renders: the current state, whether submit is enabled,
//! the progress indicator, at most one notice and the file-selection captions.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::errors::GENERIC_FAILURE;
use crate::types::FileInput;

/// Progress shown once validation has passed
pub const PROGRESS_VALIDATED: u8 = 10;
pub const UPLOAD_CHECKPOINTS: [u8; 3] = [30, 60, 80];
pub const PROGRESS_COMPLETE: u8 = 100;

/// Checkpoint shown before upload `index` (0-based), or after the last upload when `index` equals
/// the number of files
pub fn upload_checkpoint(index: usize) -> u8 {
    UPLOAD_CHECKPOINTS[index.min(UPLOAD_CHECKPOINTS.len() - 1)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    /// Uploading file `index` of `total` (1-based)
    Uploading { index: usize, total: usize },
    /// Removing the objects uploaded before a later upload failed
    CompensatingPartial,
    Inserting,
    /// Removing every uploaded object after the insert failed
    CompensatingFull,
    Success,
}

impl SubmissionState {
    pub fn can_transition_to(&self, next: &SubmissionState) -> bool {
        use SubmissionState::*;

        match (self, next) {
            (Idle | Success, Validating) => true,
            (Validating, Idle) => true,
            (Validating, Uploading { index: 1, total }) => *total >= 1,
            (Uploading { index, total }, Uploading { index: next_index, total: next_total }) => {
                next_total == total && *next_index == index + 1 && next_index <= next_total
            }
            (Uploading { .. }, CompensatingPartial | Idle) => true,
            (Uploading { index, total }, Inserting) => index == total,
            (CompensatingPartial, Idle) => true,
            (Inserting, CompensatingFull | Success) => true,
            (CompensatingFull, Idle) => true,
            (Success, Idle) => true,
            _ => false,
        }
    }

    /// Whether a submission is currently running
    pub fn in_flight(&self) -> bool {
        !matches!(self, SubmissionState::Idle | SubmissionState::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

/// Everything a single form instance renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FormView {
    pub state: SubmissionState,
    pub submit_enabled: bool,
    /// Progress percentage, `None` while the indicator is hidden
    pub progress: Option<u8>,
    pub notice: Option<Notice>,
    /// "Selected: {name} ({size})" per file field
    pub captions: BTreeMap<String, String>,
}

impl Default for FormView {
    fn default() -> Self {
        Self {
            state: SubmissionState::Idle,
            submit_enabled: true,
            progress: None,
            notice: None,
            captions: BTreeMap::new(),
        }
    }
}

impl FormView {
    /// Start a submission. Returns `false` (and changes nothing) if one is already running.
    pub fn begin(&mut self) -> bool {
        if self.state.in_flight() || !self.submit_enabled {
            return false;
        }
        self.submit_enabled = false;
        self.notice = None;
        self.progress = Some(0);
        self.transition(SubmissionState::Validating);
        true
    }

    pub fn transition(&mut self, next: SubmissionState) {
        if !self.state.can_transition_to(&next) {
            tracing::warn!(from = ?self.state, to = ?next, "Unexpected submission state transition");
        }
        self.state = next;
    }

    pub fn set_progress(&mut self, percent: u8) {
        self.progress = Some(percent.min(PROGRESS_COMPLETE));
    }

    /// Finish successfully: show the notice and reset the form. Progress stays visible until
    /// [`FormView::hide_progress`].
    pub fn succeed(&mut self, message: impl Into<String>) {
        self.transition(SubmissionState::Success);
        self.progress = Some(PROGRESS_COMPLETE);
        self.notice = Some(Notice {
            kind: NoticeKind::Success,
            message: message.into(),
        });
        self.captions.clear();
    }

    /// Finish with an error: back to idle, progress hidden, submit enabled
    pub fn fail(&mut self, message: impl Into<String>) {
        self.transition(SubmissionState::Idle);
        self.progress = None;
        self.notice = Some(Notice {
            kind: NoticeKind::Error,
            message: message.into(),
        });
        self.submit_enabled = true;
    }

    /// Re-enable submit. A submission still in flight here ended without an outcome, so it is
    /// reported as failed.
    pub fn release(&mut self) {
        if self.state.in_flight() {
            tracing::warn!(state = ?self.state, "Submission ended without an outcome");
            self.state = SubmissionState::Idle;
            self.progress = None;
            self.notice = Some(Notice {
                kind: NoticeKind::Error,
                message: GENERIC_FAILURE.to_string(),
            });
        }
        self.submit_enabled = true;
    }

    /// Hide the progress indicator left over from a successful submission
    pub fn hide_progress(&mut self) {
        if self.state == SubmissionState::Success {
            self.transition(SubmissionState::Idle);
            self.progress = None;
        }
    }

    pub fn select_file(&mut self, field: &str, file: &FileInput) {
        self.captions.insert(field.to_string(), caption(file));
    }
}

/// Format a byte count the way the form captions show it: `0 Bytes`, `512 Bytes`, `1.5 KB`,
/// `2 MB`. Values are rounded to at most two decimals.
pub fn format_file_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    while exponent < UNITS.len() - 1 && bytes >= 1024u64.pow(exponent as u32 + 1) {
        exponent += 1;
    }
    let value = bytes as f64 / 1024u64.pow(exponent as u32) as f64;
    let rounded = (value * 100.0).round() / 100.0;

    format!("{} {}", rounded, UNITS[exponent])
}

pub fn caption(file: &FileInput) -> String {
    format!("Selected: {} ({})", file.name, format_file_size(file.size()))
}

/// Receives the progress of one submission.
///
/// Implementations must tolerate any call order; the pipeline always calls [`Presenter::release`]
/// last, from a drop guard.
pub trait Presenter: Send + Sync {
    /// Start a submission. `false` means one is already in flight and nothing should run.
    fn begin(&self) -> bool;
    fn select_file(&self, field: &str, file: &FileInput);
    fn transition(&self, state: SubmissionState);
    fn set_progress(&self, percent: u8);
    fn succeed(&self, message: &str, hide_after: Duration);
    fn fail(&self, message: &str);
    /// Re-enable submit, failing any submission that is still in flight
    fn release(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::png;
    use SubmissionState::*;

    #[test]
    fn test_happy_path_transitions_are_legal() {
        let path = [
            Idle,
            Validating,
            Uploading { index: 1, total: 2 },
            Uploading { index: 2, total: 2 },
            Inserting,
            Success,
            Idle,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(&pair[1]), "{:?} -> {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failure_transitions_are_legal() {
        assert!(Validating.can_transition_to(&Idle));
        assert!(Uploading { index: 2, total: 2 }.can_transition_to(&CompensatingPartial));
        assert!(CompensatingPartial.can_transition_to(&Idle));
        assert!(Uploading { index: 1, total: 1 }.can_transition_to(&Idle));
        assert!(Inserting.can_transition_to(&CompensatingFull));
        assert!(CompensatingFull.can_transition_to(&Idle));
        assert!(Success.can_transition_to(&Validating));
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!Idle.can_transition_to(&Inserting));
        assert!(!Idle.can_transition_to(&Success));
        assert!(!Validating.can_transition_to(&Inserting));
        assert!(!Validating.can_transition_to(&Uploading { index: 2, total: 2 }));
        assert!(!Uploading { index: 1, total: 2 }.can_transition_to(&Inserting));
        assert!(!Uploading { index: 1, total: 2 }.can_transition_to(&Uploading { index: 3, total: 2 }));
        assert!(!Uploading { index: 2, total: 2 }.can_transition_to(&Uploading { index: 3, total: 2 }));
        assert!(!Inserting.can_transition_to(&Idle));
        assert!(!CompensatingFull.can_transition_to(&Success));
    }

    #[test]
    fn test_begin_rejects_second_submission() {
        let mut view = FormView::default();
        assert!(view.begin());
        assert_eq!(view.state, Validating);
        assert!(!view.submit_enabled);
        assert_eq!(view.progress, Some(0));

        let before = view.clone();
        assert!(!view.begin());
        assert_eq!(view, before);
    }

    #[test]
    fn test_begin_clears_previous_notice() {
        let mut view = FormView::default();
        view.begin();
        view.fail("Database insert failed: boom");
        assert!(view.notice.is_some());

        assert!(view.begin());
        assert_eq!(view.notice, None);
    }

    #[test]
    fn test_fail_hides_progress_and_enables_submit() {
        let mut view = FormView::default();
        view.begin();
        view.set_progress(PROGRESS_VALIDATED);
        view.fail("Please select a profile picture.");

        assert_eq!(view.state, Idle);
        assert_eq!(view.progress, None);
        assert!(view.submit_enabled);
        assert_eq!(
            view.notice,
            Some(Notice {
                kind: NoticeKind::Error,
                message: "Please select a profile picture.".to_string()
            })
        );
    }

    #[test]
    fn test_succeed_resets_form_and_keeps_progress_until_hidden() {
        let mut view = FormView::default();
        view.select_file("profile_picture", &png("photo.png", 2048));
        view.begin();
        view.transition(Uploading { index: 1, total: 1 });
        view.transition(Inserting);
        view.succeed("Doctor details added successfully!");
        view.release();

        assert_eq!(view.state, Success);
        assert_eq!(view.progress, Some(PROGRESS_COMPLETE));
        assert!(view.captions.is_empty());
        assert!(view.submit_enabled);
        assert_eq!(view.notice.as_ref().map(|n| n.kind), Some(NoticeKind::Success));

        view.hide_progress();
        assert_eq!(view.state, Idle);
        assert_eq!(view.progress, None);
        // The notice outlives the progress indicator
        assert!(view.notice.is_some());
    }

    #[test]
    fn test_release_fails_unfinished_submission() {
        let mut view = FormView::default();
        view.begin();
        view.transition(Uploading { index: 1, total: 2 });
        view.transition(Uploading { index: 2, total: 2 });
        view.set_progress(60);
        view.release();

        assert_eq!(view.state, Idle);
        assert_eq!(view.progress, None);
        assert!(view.submit_enabled);
        assert_eq!(
            view.notice,
            Some(Notice {
                kind: NoticeKind::Error,
                message: GENERIC_FAILURE.to_string()
            })
        );
        assert!(view.begin());
    }

    #[test]
    fn test_hide_progress_ignores_running_submission() {
        let mut view = FormView::default();
        view.begin();
        view.set_progress(30);
        view.hide_progress();
        assert_eq!(view.state, Validating);
        assert_eq!(view.progress, Some(30));
    }

    #[test]
    fn test_view_serializes_state_tag() {
        let mut view = FormView::default();
        view.begin();
        view.transition(Uploading { index: 1, total: 2 });

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], serde_json::json!({ "state": "uploading", "index": 1, "total": 2 }));
        assert_eq!(json["submit_enabled"], false);
    }

    #[test]
    fn test_upload_checkpoints() {
        assert_eq!(upload_checkpoint(0), 30);
        assert_eq!(upload_checkpoint(1), 60);
        assert_eq!(upload_checkpoint(2), 80);
        assert_eq!(upload_checkpoint(7), 80);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(1), "1 Bytes");
        assert_eq!(format_file_size(1023), "1023 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(1234567), "1.18 MB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024), "5 GB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 * 1024), "3072 GB");
    }

    #[test]
    fn test_caption() {
        assert_eq!(caption(&png("photo.png", 1536)), "Selected: photo.png (1.5 KB)");
    }
}

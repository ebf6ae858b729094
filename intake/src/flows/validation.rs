//! Client-side file checks, run before anything touches the network.
//!
//! Rules are evaluated in a fixed order and the first failure wins:
//! 1. every slot has a file
//! 2. slots that require an image declare an `image/*` type
//! 3. every file is at or under its slot's ceiling
//!
//! The type check trusts the declared MIME type; no bytes are inspected.

use thiserror::Error;

use super::{FileRule, FlowDefinition};
use crate::types::FileInput;

pub const NOT_AN_IMAGE: &str = "Only image files are allowed (PNG or JPG).";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    pub message: &'static str,
}

impl ValidationError {
    fn new(message: &'static str) -> Self {
        Self { message }
    }
}

/// Check `files` (one entry per slot of `flow`, in slot order) against the flow's rules
pub fn validate(flow: &FlowDefinition, files: &[Option<&FileInput>]) -> Result<(), ValidationError> {
    let slot_file = |index: usize| files.get(index).copied().flatten();

    if (0..flow.slots.len()).any(|i| slot_file(i).is_none()) {
        return Err(ValidationError::new(flow.missing_files));
    }

    for (index, slot) in flow.slots.iter().enumerate() {
        if let Some(file) = slot_file(index)
            && slot.rule.require_image
            && !is_image(file)
        {
            return Err(ValidationError::new(NOT_AN_IMAGE));
        }
    }

    for (index, slot) in flow.slots.iter().enumerate() {
        if let Some(file) = slot_file(index)
            && exceeds(&slot.rule, file)
        {
            return Err(ValidationError::new(slot.rule.too_large));
        }
    }

    Ok(())
}

fn is_image(file: &FileInput) -> bool {
    file.content_type.starts_with("image/")
}

fn exceeds(rule: &FileRule, file: &FileInput) -> bool {
    file.size() > rule.max_bytes
}

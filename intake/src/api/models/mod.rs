//! API request/response models.

pub mod submissions;

//! HTTP request handlers.
//!
//! - [`doctors`]: doctor profile submissions
//! - [`entertainments`]: entertainment media submissions
//! - [`forms`]: form instance state

pub mod doctors;
pub mod entertainments;
pub mod forms;

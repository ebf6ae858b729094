//! HTTP surface for the intake forms.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response data structures
//! - **[`multipart`]**: Reading `multipart/form-data` submissions into form fields and files
//!
//! # API Structure
//!
//! - `POST /api/v1/doctors`: doctor profile intake
//! - `POST /api/v1/entertainments`: entertainment media intake
//! - `GET /api/v1/forms/{instance}`: presenter state of a form instance
//!
//! A form instance is named by the `x-form-instance` request header. Requests without one get a
//! fresh instance, returned as `form_instance` in the response.

pub mod handlers;
pub mod models;
pub mod multipart;

use axum::http::HeaderMap;

use crate::errors::{Error, Result};

pub const FORM_INSTANCE_HEADER: &str = "x-form-instance";

/// Form instance id sent by the client, if any
pub fn form_instance(headers: &HeaderMap) -> Result<Option<&str>> {
    headers
        .get(FORM_INSTANCE_HEADER)
        .map(|value| {
            value.to_str().map_err(|_| Error::BadRequest {
                message: format!("{FORM_INSTANCE_HEADER} header must be visible ASCII"),
            })
        })
        .transpose()
}

use crate::flows::validation::ValidationError;
use crate::records::RecordError;
use crate::storage::StorageError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

/// Shown for anything the submitter cannot act on
pub const GENERIC_FAILURE: &str = "Something went wrong while submitting the form. Please try again.";

#[derive(ThisError, Debug)]
pub enum Error {
    /// A form rule rejected the selected files
    #[error("{message}")]
    Validation { message: String },

    /// Malformed request data
    #[error("{message}")]
    BadRequest { message: String },

    /// Object storage rejected an upload, or could not be reached
    #[error("{label} upload failed: {source}")]
    Upload {
        label: &'static str,
        #[source]
        source: StorageError,
    },

    /// The table API rejected the insert, or could not be reached
    #[error("Database insert failed: {source}")]
    Insert {
        #[source]
        source: RecordError,
    },

    /// A submission is already running for the same form
    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// Requested resource not found
    #[error("{resource} with ID {id} not found")]
    NotFound { resource: String, id: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::Upload { .. } | Error::Insert { .. } => StatusCode::BAD_GATEWAY,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the message shown on the form, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::Validation { message } | Error::BadRequest { message } | Error::Conflict { message } => message.clone(),
            Error::Upload { label, source } => format!("{label} upload failed: {source}"),
            Error::Insert { source } => format!("Database insert failed: {source}"),
            Error::NotFound { resource, id } => format!("{resource} with ID {id} not found"),
            Error::Internal { .. } | Error::Other(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        Error::Validation {
            message: e.message.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Upload { source, .. } => {
                tracing::warn!(error = ?source, "Storage error: {}", self);
            }
            Error::Insert { source } => {
                tracing::warn!(error = ?source, "Record insert error: {}", self);
            }
            Error::Conflict { .. } => {
                tracing::warn!("Conflict error: {}", self);
            }
            Error::Validation { .. } | Error::BadRequest { .. } | Error::NotFound { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        (self.status_code(), self.user_message()).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;

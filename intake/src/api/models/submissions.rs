use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::flows::Submitted;
use crate::types::StoredObject;

/// Multipart body of `POST /api/v1/doctors` (documentation only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct DoctorSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub category: String,
    /// PNG or JPG, at most 5 MiB
    #[schema(value_type = String, format = Binary)]
    pub profile_picture: Vec<u8>,
}

/// Multipart body of `POST /api/v1/entertainments` (documentation only)
#[derive(Debug, Deserialize, ToSchema)]
pub struct EntertainmentSubmission {
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    /// At most 5 MiB
    #[schema(value_type = String, format = Binary)]
    pub cover_img: Vec<u8>,
    /// At most 20 MiB
    #[schema(value_type = String, format = Binary)]
    pub media_file: Vec<u8>,
}

/// Result of a stored submission
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubmissionResponse<R> {
    /// Success message to show on the form
    pub message: String,
    /// Form instance the submission ran on
    pub form_instance: String,
    /// The inserted row
    pub record: R,
    /// Uploaded objects, in upload order
    pub objects: Vec<StoredObject>,
}

impl<R> SubmissionResponse<R> {
    pub fn new(form_instance: impl Into<String>, submitted: Submitted<R>) -> Self {
        Self {
            message: submitted.message.to_string(),
            form_instance: form_instance.into(),
            record: submitted.record,
            objects: submitted.objects,
        }
    }
}

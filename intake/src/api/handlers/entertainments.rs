use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
};

use crate::AppState;
use crate::api::form_instance;
use crate::api::models::submissions::{EntertainmentSubmission, SubmissionResponse};
use crate::api::multipart::FormParts;
use crate::errors::Result;
use crate::flows::entertainment::{EntertainmentForm, EntertainmentRecord};

#[utoipa::path(
    post,
    path = "/api/v1/entertainments",
    tag = "entertainments",
    summary = "Submit entertainment media",
    description = "Validate the cover image and media file, upload both to the entertainment media bucket and insert a row into the entertainments table.

The cover must be at most 5 MiB and the media file at most 20 MiB. Files are uploaded one after the other; if the media upload or the insert fails, everything uploaded for the submission is removed again.",
    params(
        ("x-form-instance" = Option<String>, Header, description = "Form instance to report progress on. A new one is created when omitted.")
    ),
    request_body(content = EntertainmentSubmission, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Entertainment stored", body = SubmissionResponse<EntertainmentRecord>),
        (status = 400, description = "Validation failed or malformed form data", body = String),
        (status = 409, description = "A submission is already running on this form instance", body = String),
        (status = 502, description = "Storage or table API rejected the submission", body = String),
        (status = 500, description = "Internal server error", body = String)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_entertainment(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionResponse<EntertainmentRecord>>)> {
    let session = state.forms.open(form_instance(&headers)?).await?;
    let mut parts = FormParts::read(&mut multipart).await?;

    let form = EntertainmentForm {
        title: parts.text("title"),
        kind: parts.text("type"),
        description: parts.text("description"),
        cover_img: parts.file("cover_img"),
        media_file: parts.file("media_file"),
    };

    let submitted = state
        .intake
        .submit_detached(form, state.config.flows.entertainment.target(), session.clone())
        .await?;

    Ok((StatusCode::CREATED, Json(SubmissionResponse::new(session.id(), submitted))))
}

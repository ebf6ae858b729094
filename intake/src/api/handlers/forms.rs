use axum::{
    Json,
    extract::{Path, State},
};

use crate::AppState;
use crate::errors::{Error, Result};
use crate::flows::presenter::FormView;

#[utoipa::path(
    get,
    path = "/api/v1/forms/{instance}",
    tag = "forms",
    summary = "Get form state",
    description = "Current presenter state of a form instance: submission state, whether submit is enabled, progress, the notice to show and the file captions.",
    params(
        ("instance" = String, Path, description = "Form instance id"),
    ),
    responses(
        (status = 200, description = "Form state", body = FormView),
        (status = 404, description = "Unknown or expired form instance", body = String),
    )
)]
#[tracing::instrument(skip(state))]
pub async fn get_form(State(state): State<AppState>, Path(instance): Path<String>) -> Result<Json<FormView>> {
    let session = state.forms.get(&instance).await.ok_or_else(|| Error::NotFound {
        resource: "Form instance".to_string(),
        id: instance.clone(),
    })?;

    Ok(Json(session.view()))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};

    use crate::Application;
    use crate::backend::Backends;
    use crate::flows::presenter::{FormView, Presenter, SubmissionState};
    use crate::test_utils::{RecordingStorage, RecordingWriter, create_test_app, create_test_config};

    #[tokio::test]
    async fn test_get_unknown_form() {
        let (server, _, _) = create_test_app(create_test_config());

        let response = server.get("/api/v1/forms/nobody").await;
        response.assert_status_not_found();
        response.assert_text("Form instance with ID nobody not found");
    }

    #[tokio::test]
    async fn test_submission_on_busy_form_is_rejected() {
        let storage = Arc::new(RecordingStorage::default());
        let backends = Backends {
            storage: storage.clone(),
            records: Arc::new(RecordingWriter::default()),
        };
        let app = Application::with_backends(create_test_config(), backends).unwrap();

        // Hold a submission open on the instance
        let session = app.state().forms.open(Some("busy-form")).await.unwrap();
        assert!(session.begin());

        let server = app.into_test_server();
        let picture = Part::bytes(vec![0u8; 16]).file_name("photo.png").mime_type("image/png");
        let response = server
            .post("/api/v1/doctors")
            .add_header("x-form-instance", "busy-form")
            .multipart(MultipartForm::new().add_part("profile_picture", picture))
            .await;

        response.assert_status(StatusCode::CONFLICT);
        assert!(storage.uploaded().is_empty());

        let view: FormView = server.get("/api/v1/forms/busy-form").await.json();
        assert_eq!(view.state, SubmissionState::Validating);
        assert!(!view.submit_enabled);
    }
}

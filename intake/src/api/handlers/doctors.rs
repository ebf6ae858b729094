use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
};

use crate::AppState;
use crate::api::form_instance;
use crate::api::models::submissions::{DoctorSubmission, SubmissionResponse};
use crate::api::multipart::FormParts;
use crate::errors::Result;
use crate::flows::doctors::{DoctorForm, DoctorRecord};

#[utoipa::path(
    post,
    path = "/api/v1/doctors",
    tag = "doctors",
    summary = "Submit doctor profile",
    description = "Validate the profile picture, upload it to the doctor profiles bucket and insert a row into the doctors table.

The picture must declare an `image/*` type and be at most 5 MiB. If the insert fails, the uploaded picture is removed again.",
    params(
        ("x-form-instance" = Option<String>, Header, description = "Form instance to report progress on. A new one is created when omitted.")
    ),
    request_body(content = DoctorSubmission, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Doctor stored", body = SubmissionResponse<DoctorRecord>),
        (status = 400, description = "Validation failed or malformed form data", body = String),
        (status = 409, description = "A submission is already running on this form instance", body = String),
        (status = 502, description = "Storage or table API rejected the submission", body = String),
        (status = 500, description = "Internal server error", body = String)
    )
)]
#[tracing::instrument(skip_all)]
pub async fn create_doctor(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<SubmissionResponse<DoctorRecord>>)> {
    let session = state.forms.open(form_instance(&headers)?).await?;
    let mut parts = FormParts::read(&mut multipart).await?;

    let form = DoctorForm {
        name: parts.text("name"),
        email: parts.text("email"),
        phone: parts.text("phone"),
        category: parts.text("category"),
        profile_picture: parts.file("profile_picture"),
    };

    let submitted = state
        .intake
        .submit_detached(form, state.config.flows.doctors.target(), session.clone())
        .await?;

    Ok((StatusCode::CREATED, Json(SubmissionResponse::new(session.id(), submitted))))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::Value;

    use crate::flows::presenter::{FormView, NoticeKind, SubmissionState};
    use crate::test_utils::{RecordingStorage, RecordingWriter, create_test_app, create_test_app_with, create_test_config};

    fn doctor_multipart(picture: Option<Part>) -> MultipartForm {
        let form = MultipartForm::new()
            .add_text("name", "Dr. Grace Hopper")
            .add_text("email", "grace@example.com")
            .add_text("phone", "555-0199")
            .add_text("category", "Neurology");
        match picture {
            Some(part) => form.add_part("profile_picture", part),
            None => form,
        }
    }

    fn picture(name: &str, size: usize) -> Part {
        Part::bytes(vec![0u8; size]).file_name(name).mime_type("image/png")
    }

    #[test_log::test(tokio::test)]
    async fn test_create_doctor() {
        let (server, storage, writer) = create_test_app(create_test_config());

        let response = server
            .post("/api/v1/doctors")
            .add_header("x-form-instance", "doctor-form")
            .multipart(doctor_multipart(Some(picture("My Photo.png", 2 * 1024 * 1024))))
            .await;

        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        assert_eq!(body["message"], "Doctor details added successfully!");
        assert_eq!(body["form_instance"], "doctor-form");
        assert_eq!(body["record"]["name"], "Dr. Grace Hopper");
        assert_eq!(body["record"]["profilepicture"], body["objects"][0]["url"]);

        let key = body["objects"][0]["key"].as_str().unwrap();
        assert!(key.starts_with("profiles/"), "{key}");
        assert!(key.ends_with("_My_Photo.png"), "{key}");

        assert_eq!(storage.uploaded(), vec![("doctor_profiles".to_string(), key.to_string())]);
        let inserts = writer.inserts();
        assert_eq!(inserts.len(), 1);
        assert_eq!(inserts[0].0, "doctors");

        let view: FormView = server.get("/api/v1/forms/doctor-form").await.json();
        assert_eq!(view.state, SubmissionState::Success);
        assert_eq!(view.notice.map(|n| n.kind), Some(NoticeKind::Success));
        assert!(view.submit_enabled);
    }

    #[tokio::test]
    async fn test_create_doctor_without_picture() {
        let (server, storage, writer) = create_test_app(create_test_config());

        // What a browser sends when no file was chosen
        let empty = Part::bytes(Vec::<u8>::new()).file_name("").mime_type("application/octet-stream");
        let response = server
            .post("/api/v1/doctors")
            .add_header("x-form-instance", "doctor-form")
            .multipart(doctor_multipart(Some(empty)))
            .await;

        response.assert_status_bad_request();
        response.assert_text("Please select a profile picture.");
        assert!(storage.uploaded().is_empty());
        assert!(writer.inserts().is_empty());

        let view: FormView = server.get("/api/v1/forms/doctor-form").await.json();
        assert_eq!(view.state, SubmissionState::Idle);
        assert_eq!(view.progress, None);
        assert_eq!(view.notice.unwrap().message, "Please select a profile picture.");
    }

    #[tokio::test]
    async fn test_create_doctor_rejects_non_image() {
        let (server, storage, _) = create_test_app(create_test_config());

        let pdf = Part::bytes(vec![0u8; 64]).file_name("cv.pdf").mime_type("application/pdf");
        let response = server.post("/api/v1/doctors").multipart(doctor_multipart(Some(pdf))).await;

        response.assert_status_bad_request();
        response.assert_text("Only image files are allowed (PNG or JPG).");
        assert!(storage.uploaded().is_empty());
    }

    #[tokio::test]
    async fn test_create_doctor_rejects_oversized_picture() {
        let (server, _, _) = create_test_app(create_test_config());

        let response = server
            .post("/api/v1/doctors")
            .multipart(doctor_multipart(Some(picture("big.png", 5 * 1024 * 1024 + 1))))
            .await;

        response.assert_status_bad_request();
        response.assert_text("Profile picture must be less than 5MB.");
    }

    #[tokio::test]
    async fn test_create_doctor_insert_failure_removes_picture() {
        let (server, storage, _) = create_test_app_with(
            create_test_config(),
            RecordingStorage::default(),
            RecordingWriter::failing("new row violates row-level security policy for table \"doctors\""),
        );

        let response = server
            .post("/api/v1/doctors")
            .multipart(doctor_multipart(Some(picture("photo.png", 128))))
            .await;

        response.assert_status(StatusCode::BAD_GATEWAY);
        response.assert_text("Database insert failed: new row violates row-level security policy for table \"doctors\"");

        let uploaded: Vec<String> = storage.uploaded().into_iter().map(|(_, key)| key).collect();
        assert_eq!(storage.removed(), vec![("doctor_profiles".to_string(), uploaded)]);
    }

    #[tokio::test]
    async fn test_create_doctor_rejects_bad_instance_id() {
        let (server, storage, _) = create_test_app(create_test_config());

        let response = server
            .post("/api/v1/doctors")
            .add_header("x-form-instance", "not a valid id")
            .multipart(doctor_multipart(Some(picture("photo.png", 128))))
            .await;

        response.assert_status_bad_request();
        assert!(storage.uploaded().is_empty());
    }

    #[tokio::test]
    async fn test_create_doctor_uses_configured_target() {
        let mut config = create_test_config();
        config.flows.doctors.bucket = "staging_profiles".to_string();
        config.flows.doctors.table = "doctors_staging".to_string();
        let (server, storage, writer) = create_test_app(config);

        server
            .post("/api/v1/doctors")
            .multipart(doctor_multipart(Some(picture("photo.png", 128))))
            .await
            .assert_status(StatusCode::CREATED);

        assert_eq!(storage.uploaded()[0].0, "staging_profiles");
        assert_eq!(writer.inserts()[0].0, "doctors_staging");
    }
}

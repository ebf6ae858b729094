//! OpenAPI documentation for the intake API, served at `/api-docs/openapi.json` with a Scalar UI
//! at `/docs`.

use utoipa::OpenApi;

use crate::api;
use crate::flows::{doctors, entertainment, presenter};
use crate::types;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Intake API",
        description = "Form intake: validate selected files, store them in object storage and record their metadata."
    ),
    paths(
        api::handlers::doctors::create_doctor,
        api::handlers::entertainments::create_entertainment,
        api::handlers::forms::get_form,
    ),
    components(
        schemas(
            api::models::submissions::DoctorSubmission,
            api::models::submissions::EntertainmentSubmission,
            doctors::DoctorRecord,
            entertainment::EntertainmentRecord,
            types::ObjectKey,
            types::StoredObject,
            presenter::FormView,
            presenter::SubmissionState,
            presenter::Notice,
            presenter::NoticeKind,
        )
    ),
    tags(
        (name = "doctors", description = "Doctor profile intake"),
        (name = "entertainments", description = "Entertainment media intake"),
        (name = "forms", description = "Form instance state"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_intake_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        assert!(paths.contains(&"/api/v1/doctors"));
        assert!(paths.contains(&"/api/v1/entertainments"));
        assert!(paths.contains(&"/api/v1/forms/{instance}"));
    }
}

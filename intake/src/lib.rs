//! # intake: form submissions into object storage and a hosted table
//!
//! `intake` serves two browser forms. Each submission validates the selected files, uploads them
//! to an object-storage bucket under sanitized, timestamp-prefixed keys, and inserts one metadata
//! row that references the uploaded objects by public URL:
//!
//! - **Doctor profile intake**: `name`, `email`, `phone`, `category` and a `profile_picture`,
//!   stored in bucket `doctor_profiles` and table `doctors`
//! - **Entertainment media intake**: `title`, `type`, `description`, a `cover_img` and a
//!   `media_file`, stored in bucket `entertainment_media` and table `entertainments`
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum). A submission flows
//! through:
//!
//! 1. [`api::multipart`]: reads the form fields and selected files
//! 2. [`flows::validation`]: presence, declared image type and size ceilings
//! 3. [`storage::ObjectStorage`]: one upload per file, strictly in order
//! 4. [`records::RecordWriter`]: one insert with the objects' public URLs
//!
//! When a later step fails, the objects uploaded so far are removed again
//! ([`flows::Intake::compensate`]). Each form instance's progress, notice and submit state is kept
//! in [`forms::FormSessions`] and can be read back over HTTP.
//!
//! Storage and tables live in the hosted backend (storage REST API and PostgREST). For
//! development, a local backend keeps objects in a directory and rows in JSON-lines files.
//!
//! ## Configuration
//!
//! See [`config`] for the YAML file layout and environment overrides. The hosted backend is
//! usually selected with `SUPABASE_URL` and `SUPABASE_KEY`.

pub mod api;
pub mod backend;
pub mod config;
pub mod errors;
pub mod flows;
pub mod forms;
mod openapi;
pub mod records;
pub mod storage;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::Config;

use crate::backend::Backends;
use crate::config::{BackendConfig, CorsOrigin};
use crate::flows::Intake;
use crate::forms::FormSessions;
use crate::openapi::ApiDoc;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::{
    Json, Router,
    routing::{get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    services::ServeDir,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

/// Shared state handed to every handler.
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config.clone())
///     .intake(Intake::new(backends))
///     .forms(FormSessions::new(&config.forms))
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub intake: Intake,
    pub forms: FormSessions,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors = &config.cors;

    let allow_origin = if cors.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                // Browsers send the bare origin, without path or trailing slash
                origins.push(url.origin().ascii_serialization().parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut layer = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(api::FORM_INSTANCE_HEADER)])
        .allow_credentials(cors.allow_credentials);

    if let Some(max_age) = cors.max_age {
        layer = layer.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(layer)
}

/// Build the application router.
///
/// - Intake API under `/api/v1`
/// - OpenAPI spec at `/api-docs/openapi.json`, Scalar UI at `/docs`
/// - Stored objects at `/objects` (local backend only)
/// - Prometheus metrics at `/internal/metrics` (if enabled)
/// - CORS and tracing middleware
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let body_limit = usize::try_from(state.config.limits.max_body_size)?;

    let api_routes = Router::new()
        .route("/doctors", post(api::handlers::doctors::create_doctor))
        .route("/entertainments", post(api::handlers::entertainments::create_entertainment))
        .route("/forms/{instance}", get(api::handlers::forms::get_form))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state.clone());

    let mut router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    if let BackendConfig::Local { path, .. } = &state.config.backend {
        router = router.nest_service("/objects", ServeDir::new(path.join("objects")));
    }

    let mut router = router.layer(create_cors_layer(&state.config)?);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();
        router = router
            .route("/internal/metrics", get(|| async move { metric_handle.render() }))
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The intake service.
///
/// 1. **Create**: [`Application::new`] connects the configured backend and builds the router
/// 2. **Serve**: [`Application::serve`] binds the configured address and handles requests until
///    the shutdown future resolves
pub struct Application {
    router: Router,
    app_state: AppState,
}

impl Application {
    /// Create the application with the backend selected by `config.backend`
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting intake with configuration: {:#?}", config);
        let backends = backend::connect(&config.backend).await?;
        Self::with_backends(config, backends)
    }

    /// Create the application over already constructed backends
    pub fn with_backends(config: Config, backends: Backends) -> anyhow::Result<Self> {
        let app_state = AppState::builder()
            .forms(FormSessions::new(&config.forms))
            .intake(Intake::new(backends))
            .config(config)
            .build();

        let router = build_router(&app_state)?;

        Ok(Self { router, app_state })
    }

    pub fn state(&self) -> &AppState {
        &self.app_state
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router.into_make_service()).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.app_state.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "Intake listening on http://{}, available at http://localhost:{}",
            bind_addr, self.app_state.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}

//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `INTAKE_CONFIG`
//! environment variable.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `INTAKE_` override YAML values
//! 3. **SUPABASE_URL / SUPABASE_KEY** - Special case: switch the backend to the hosted service
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `INTAKE_FLOWS__DOCTORS__BUCKET=staging_profiles` sets the `flows.doctors.bucket` field.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use intake::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Override server port
//! INTAKE_PORT=8080
//!
//! # Point at the hosted backend (preferred method)
//! SUPABASE_URL="https://project.supabase.co"
//! SUPABASE_KEY="<anon key>"
//!
//! # Override nested values
//! INTAKE_FLOWS__ENTERTAINMENT__TABLE=entertainments_v2
//! INTAKE_ENABLE_METRICS=true
//! ```

use std::{path::PathBuf, time::Duration};

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::Error;
use crate::flows::FlowTarget;
use crate::flows::doctors::DOCTOR_FLOW;
use crate::flows::entertainment::ENTERTAINMENT_FLOW;

/// Room for text fields, part headers and boundaries on top of the files themselves
const MULTIPART_OVERHEAD_BYTES: u64 = 1024 * 1024;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "INTAKE_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Where uploaded files and metadata rows go
    pub backend: BackendConfig,
    /// Set from `SUPABASE_URL`; replaces `backend` with the hosted backend
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<Url>,
    /// Set from `SUPABASE_KEY`; the API key used with `supabase_url`
    #[serde(skip_serializing, default)]
    pub supabase_key: Option<String>,
    /// Per-flow bucket, table and presentation settings
    pub flows: FlowsConfig,
    /// Request size limits
    pub limits: LimitsConfig,
    /// Form instance (presenter) session settings
    pub forms: FormsConfig,
    /// CORS settings for browser clients
    pub cors: CorsConfig,
    /// Enable Prometheus metrics endpoint at `/internal/metrics`
    pub enable_metrics: bool,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Backend configuration.
///
/// Either the hosted backend (object storage + table REST API behind one URL and key), or a local
/// directory for development.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Hosted storage and table APIs
    Supabase {
        /// Project URL, e.g. `https://project.supabase.co`
        url: Url,
        /// API key sent as both `apikey` and bearer token
        #[serde(skip_serializing)]
        api_key: String,
        /// Timeout for each backend request
        #[serde(with = "humantime_serde", default = "default_backend_timeout")]
        timeout: Duration,
    },
    /// Objects under `{path}/objects`, rows under `{path}/tables`
    Local {
        path: PathBuf,
        /// Base URL objects are published under (the service serves them at `/objects`)
        public_base_url: Url,
    },
}

fn default_backend_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Local {
            path: PathBuf::from(".intake_data"),
            public_base_url: Url::parse("http://localhost:3001/objects").expect("static URL is valid"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowsConfig {
    pub doctors: DoctorsFlowConfig,
    pub entertainment: EntertainmentFlowConfig,
}

/// Doctor profile intake
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DoctorsFlowConfig {
    pub bucket: String,
    pub table: String,
    /// How long the progress indicator stays visible after a successful submission
    #[serde(with = "humantime_serde")]
    pub hide_progress_after: Duration,
}

impl Default for DoctorsFlowConfig {
    fn default() -> Self {
        Self {
            bucket: "doctor_profiles".to_string(),
            table: "doctors".to_string(),
            hide_progress_after: Duration::from_millis(1500),
        }
    }
}

impl DoctorsFlowConfig {
    pub fn target(&self) -> FlowTarget {
        FlowTarget {
            bucket: self.bucket.clone(),
            table: self.table.clone(),
            hide_progress_after: self.hide_progress_after,
        }
    }
}

/// Entertainment media intake
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntertainmentFlowConfig {
    pub bucket: String,
    pub table: String,
    /// How long the progress indicator stays visible after a successful submission
    #[serde(with = "humantime_serde")]
    pub hide_progress_after: Duration,
}

impl Default for EntertainmentFlowConfig {
    fn default() -> Self {
        Self {
            bucket: "entertainment_media".to_string(),
            table: "entertainments".to_string(),
            hide_progress_after: Duration::from_secs(2),
        }
    }
}

impl EntertainmentFlowConfig {
    pub fn target(&self) -> FlowTarget {
        FlowTarget {
            bucket: self.bucket.clone(),
            table: self.table.clone(),
            hide_progress_after: self.hide_progress_after,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Maximum accepted request body in bytes. Must exceed the largest per-file ceiling so
    /// oversized files reach validation and get a readable message.
    pub max_body_size: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_size: 64 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct FormsConfig {
    /// Forget a form instance after it has been idle this long
    #[serde(with = "humantime_serde")]
    pub session_idle_timeout: Duration,
    /// Upper bound on tracked form instances
    pub max_sessions: u64,
}

impl Default for FormsConfig {
    fn default() -> Self {
        Self {
            session_idle_timeout: Duration::from_secs(30 * 60),
            max_sessions: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![CorsOrigin::Wildcard],
            allow_credentials: false,
            max_age: Some(3600),
        }
    }
}

/// CORS origin specification.
///
/// Can be either a wildcard (`*`) to allow all origins, or a specific URL.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard", serialize_with = "serialize_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://forms.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn serialize_wildcard<S>(serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str("*")
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
            backend: BackendConfig::default(),
            supabase_url: None,
            supabase_key: None,
            flows: FlowsConfig::default(),
            limits: LimitsConfig::default(),
            forms: FormsConfig::default(),
            cors: CorsConfig::default(),
            enable_metrics: false,
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let mut config: Self = Self::figment(args).extract()?;
        config.apply_supabase_overrides();
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Fold `SUPABASE_URL` / `SUPABASE_KEY` into `backend`, keeping any configured timeout
    fn apply_supabase_overrides(&mut self) {
        if let Some(url) = self.supabase_url.take() {
            let (api_key, timeout) = match &self.backend {
                BackendConfig::Supabase { api_key, timeout, .. } => (api_key.clone(), *timeout),
                BackendConfig::Local { .. } => (String::new(), default_backend_timeout()),
            };
            self.backend = BackendConfig::Supabase { url, api_key, timeout };
        }

        if let Some(key) = self.supabase_key.take() {
            match &mut self.backend {
                BackendConfig::Supabase { api_key, .. } => *api_key = key,
                BackendConfig::Local { .. } => {
                    tracing::warn!("SUPABASE_KEY is set but the local backend is configured; ignoring it");
                }
            }
        }
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        match &self.backend {
            BackendConfig::Supabase { api_key, timeout, .. } => {
                if api_key.trim().is_empty() {
                    return Err(Error::Internal {
                        operation: "Config validation: the supabase backend needs an api_key. \
                         Set SUPABASE_KEY or backend.api_key in the config file."
                            .to_string(),
                    });
                }
                if timeout.is_zero() {
                    return Err(Error::Internal {
                        operation: "Config validation: backend.timeout must be greater than zero".to_string(),
                    });
                }
            }
            BackendConfig::Local { path, .. } => {
                if path.as_os_str().is_empty() {
                    return Err(Error::Internal {
                        operation: "Config validation: backend.path cannot be empty".to_string(),
                    });
                }
            }
        }

        let targets = [("doctors", self.flows.doctors.target()), ("entertainment", self.flows.entertainment.target())];
        for (flow, target) in targets {
            if target.bucket.trim().is_empty() || target.table.trim().is_empty() {
                return Err(Error::Internal {
                    operation: format!("Config validation: flows.{flow} needs both a bucket and a table"),
                });
            }
        }

        let required_body_size = [&DOCTOR_FLOW, &ENTERTAINMENT_FLOW]
            .iter()
            .map(|flow| flow.max_file_bytes())
            .max()
            .unwrap_or_default()
            + MULTIPART_OVERHEAD_BYTES;
        if self.limits.max_body_size < required_body_size {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: limits.max_body_size ({}) must be at least {} to fit the largest valid submission",
                    self.limits.max_body_size, required_body_size
                ),
            });
        }

        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            .merge(Env::prefixed("INTAKE_").ignore(&["config"]).split("__"))
            // Hosted backend credentials under their conventional names
            .merge(Env::raw().only(&["SUPABASE_URL", "SUPABASE_KEY"]))
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

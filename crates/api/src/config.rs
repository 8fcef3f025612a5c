use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use microsim_core::job::TaxBenefitModel;
use uuid::Uuid;

/// A malformed configuration value.
#[derive(Debug, thiserror::Error, PartialEq)]
#[error("{var} has invalid value '{value}': {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

impl ConfigError {
    fn new(var: &'static str, value: &str, reason: impl ToString) -> Self {
        Self {
            var,
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<HeaderValue>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long to wait for background tasks on shutdown (default: `10`).
    pub shutdown_timeout_secs: u64,
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub compute_url: String,
    pub compute_app: String,
    pub compute_timeout_secs: u64,
    /// Shared secret compute callbacks must present in `x-callback-token`.
    pub callback_token: Option<String>,
    pub sequencer_sweep_secs: u64,
    /// Current model version per country model.
    pub model_versions: HashMap<TaxBenefitModel, Uuid>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                  |
    /// |-------------------------|--------------------------|
    /// | `HOST`                  | `0.0.0.0`                |
    /// | `PORT`                  | `8000`                   |
    /// | `CORS_ORIGINS`          | `http://localhost:3000`  |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `10`                     |
    /// | `DATABASE_URL`          | unset (in-memory store)  |
    /// | `COMPUTE_URL`           | `http://localhost:8001`  |
    /// | `COMPUTE_APP`           | `policyengine`           |
    /// | `COMPUTE_TIMEOUT_SECS`  | `10`                     |
    /// | `CALLBACK_TOKEN`        | unset                    |
    /// | `SEQUENCER_SWEEP_SECS`  | `5`                      |
    /// | `MODEL_VERSIONS`        | unset                    |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let cors_origins = var("CORS_ORIGINS", "http://localhost:3000")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|o| HeaderValue::from_str(o).map_err(|e| ConfigError::new("CORS_ORIGINS", o, e)))
            .collect::<Result<Vec<_>, _>>()?;

        let model_versions = match optional("MODEL_VERSIONS") {
            Some(raw) => parse_model_versions(&raw)?,
            None => HashMap::new(),
        };

        Ok(Self {
            host: var("HOST", "0.0.0.0"),
            port: parse("PORT", &var("PORT", "8000"))?,
            cors_origins,
            request_timeout_secs: parse("REQUEST_TIMEOUT_SECS", &var("REQUEST_TIMEOUT_SECS", "30"))?,
            shutdown_timeout_secs: parse(
                "SHUTDOWN_TIMEOUT_SECS",
                &var("SHUTDOWN_TIMEOUT_SECS", "10"),
            )?,
            database_url: optional("DATABASE_URL"),
            compute_url: var("COMPUTE_URL", "http://localhost:8001"),
            compute_app: var("COMPUTE_APP", "policyengine"),
            compute_timeout_secs: parse("COMPUTE_TIMEOUT_SECS", &var("COMPUTE_TIMEOUT_SECS", "10"))?,
            callback_token: optional("CALLBACK_TOKEN"),
            sequencer_sweep_secs: parse("SEQUENCER_SWEEP_SECS", &var("SEQUENCER_SWEEP_SECS", "5"))?,
            model_versions,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn compute_timeout(&self) -> Duration {
        Duration::from_secs(self.compute_timeout_secs)
    }

    pub fn sequencer_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sequencer_sweep_secs.max(1))
    }
}

fn parse<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::new(var, value, e))
}

/// Parse `policyengine_uk=<uuid>,policyengine_us=<uuid>`.
fn parse_model_versions(raw: &str) -> Result<HashMap<TaxBenefitModel, Uuid>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (model, version) = entry
                .split_once('=')
                .ok_or_else(|| ConfigError::new("MODEL_VERSIONS", entry, "expected model=uuid"))?;
            let model: TaxBenefitModel = parse("MODEL_VERSIONS", model)?;
            let version: Uuid = parse("MODEL_VERSIONS", version)?;
            Ok((model, version))
        })
        .collect()
}

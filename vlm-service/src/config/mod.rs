use secrecy::SecretString;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Model served when `VLM_MODEL_ID` is not set.
pub const DEFAULT_MODEL_ID: &str = "HayatoHongo/lfm2-vl-ja-finetuned-enmt1ep-jamt10eponall-vqa";

/// Default base URL of the OpenAI-compatible inference server.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000/v1";

/// Upload limit for `/vqa` request bodies (20MB).
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct VlmConfig {
    pub common: core_config::Config,
    pub model: ModelConfig,
    pub backend: BackendConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    /// Identifier of the pretrained model the backend must be serving.
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub kind: BackendKind,
    /// Base URL including the API version prefix, e.g. `http://host:8000/v1`.
    pub base_url: String,
    pub api_key: Option<SecretString>,
    /// `None` leaves generation calls unbounded.
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub max_upload_bytes: usize,
    /// `None` admits every generation request immediately.
    pub max_concurrent_generations: Option<usize>,
    /// Empty disables the CORS layer.
    pub cors_allowed_origins: Vec<String>,
}

/// Which model backend serves generation calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// OpenAI-compatible chat completions server (llama.cpp, vLLM, ...).
    OpenAi,
    /// Deterministic in-process backend for tests and local development.
    Mock,
}

impl FromStr for BackendKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "openai" | "openai-compatible" => Ok(BackendKind::OpenAi),
            "mock" => Ok(BackendKind::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown VLM_BACKEND '{}', expected 'openai' or 'mock'",
                other
            ))),
        }
    }
}

impl VlmConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        Self::from_lookup(common, core_config::is_production(), |key| {
            env::var(key).ok()
        })
    }

    /// Build the service configuration from an arbitrary variable source.
    pub fn from_lookup<F>(
        common: core_config::Config,
        is_prod: bool,
        lookup: F,
    ) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: Option<&str>| get_var(&lookup, key, default, is_prod);
        let get_opt = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let request_timeout = get_opt("VLM_BACKEND_TIMEOUT_SECS")
            .map(|v| parse_number::<u64>("VLM_BACKEND_TIMEOUT_SECS", &v))
            .transpose()?
            .map(Duration::from_secs);

        let max_concurrent_generations = get_opt("VLM_MAX_CONCURRENT_GENERATIONS")
            .map(|v| parse_number::<usize>("VLM_MAX_CONCURRENT_GENERATIONS", &v))
            .transpose()?
            .filter(|n| *n > 0);

        let cors_allowed_origins = get_opt("VLM_CORS_ALLOWED_ORIGINS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(VlmConfig {
            common,
            model: ModelConfig {
                id: get("VLM_MODEL_ID", Some(DEFAULT_MODEL_ID))?,
            },
            backend: BackendConfig {
                kind: get("VLM_BACKEND", Some("openai"))?.parse()?,
                base_url: get("VLM_BACKEND_URL", Some(DEFAULT_BACKEND_URL))?
                    .trim_end_matches('/')
                    .to_string(),
                api_key: get_opt("VLM_BACKEND_API_KEY").map(SecretString::new),
                request_timeout,
            },
            server: ServerConfig {
                max_upload_bytes: parse_number(
                    "VLM_MAX_UPLOAD_BYTES",
                    &get(
                        "VLM_MAX_UPLOAD_BYTES",
                        Some(&DEFAULT_MAX_UPLOAD_BYTES.to_string()),
                    )?,
                )?,
                max_concurrent_generations,
                cors_allowed_origins,
            },
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, AppError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e| {
        AppError::ConfigError(anyhow::anyhow!("{} has invalid value '{}': {}", key, value, e))
    })
}

/// Read `key`, falling back to `default`.
///
/// In production a missing variable with no default is an error, and falling
/// back to a default is logged.
fn get_var<F>(lookup: &F, key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match (lookup(key), default) {
        (Some(val), _) => Ok(val),
        (None, Some(def)) => {
            if is_prod {
                tracing::warn!("{} not set, using default '{}'", key, def);
            }
            Ok(def.to_string())
        }
        (None, None) if is_prod => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required in production but not set",
            key
        ))),
        (None, None) => Err(AppError::ConfigError(anyhow::anyhow!(
            "{} is required but not set",
            key
        ))),
    }
}

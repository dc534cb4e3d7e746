use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Default upload ceiling: 10 MiB.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Default model identifier used for completions.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash-exp";
/// Default Gemini REST base URL.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:5173,http://localhost:3000";
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 500;
const DEFAULT_MEMORY_BUDGET_BYTES: usize = 256 * 1024 * 1024;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the StuTutor API.
#[derive(Debug, Clone)]
pub struct Config {
    /// Secret used to authenticate against the Gemini API.
    pub gemini_api_key: String,
    /// Model identifier passed to `generateContent`.
    pub gemini_model: String,
    /// Base URL of the Gemini REST API.
    pub gemini_base_url: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Origins allowed to call the API from a browser.
    pub allowed_origins: Vec<String>,
    /// Free-form deployment tag (`development`, `production`, ...).
    pub environment: String,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: usize,
    /// Per-call timeout applied to the upstream model.
    pub completion_timeout: Duration,
    /// Extra attempts made for transient upstream failures.
    pub completion_max_retries: u32,
    /// Delay between upstream attempts.
    pub completion_retry_backoff: Duration,
    /// Number of documents allowed in flight at the same time.
    pub max_concurrent_documents: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Blank values are treated as absent so that `FOO=` in a `.env` file falls back to the
    /// default instead of failing to parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let gemini_api_key = get("GEMINI_API_KEY")
            .ok_or_else(|| ConfigError::MissingVariable("GEMINI_API_KEY".to_string()))?;
        let max_upload_bytes: usize =
            parse_or(get("MAX_UPLOAD_BYTES"), "MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;
        if max_upload_bytes == 0 {
            return Err(ConfigError::InvalidValue("MAX_UPLOAD_BYTES".to_string()));
        }
        let memory_budget: usize = parse_or(
            get("MEMORY_BUDGET_BYTES"),
            "MEMORY_BUDGET_BYTES",
            DEFAULT_MEMORY_BUDGET_BYTES,
        )?;
        let max_concurrent_documents = match get("MAX_CONCURRENT_DOCUMENTS") {
            Some(value) => match value.trim().parse::<usize>() {
                Ok(limit) if limit > 0 => limit,
                _ => {
                    return Err(ConfigError::InvalidValue(
                        "MAX_CONCURRENT_DOCUMENTS".to_string(),
                    ));
                }
            },
            None => admission_limit(memory_budget, max_upload_bytes),
        };

        Ok(Self {
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            gemini_base_url: get("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string()),
            port: parse_or(get("PORT"), "PORT", DEFAULT_PORT)?,
            allowed_origins: parse_origins(
                get("ALLOWED_ORIGINS")
                    .as_deref()
                    .unwrap_or(DEFAULT_ALLOWED_ORIGINS),
            ),
            environment: get("ENVIRONMENT").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            max_upload_bytes,
            completion_timeout: Duration::from_secs(parse_or(
                get("COMPLETION_TIMEOUT_SECS"),
                "COMPLETION_TIMEOUT_SECS",
                DEFAULT_TIMEOUT_SECS,
            )?),
            completion_max_retries: parse_or(
                get("COMPLETION_MAX_RETRIES"),
                "COMPLETION_MAX_RETRIES",
                0,
            )?,
            completion_retry_backoff: Duration::from_millis(parse_or(
                get("COMPLETION_RETRY_BACKOFF_MS"),
                "COMPLETION_RETRY_BACKOFF_MS",
                DEFAULT_RETRY_BACKOFF_MS,
            )?),
            max_concurrent_documents,
        })
    }

    /// Emit the non-secret settings at debug level.
    pub fn log_summary(&self) {
        tracing::debug!(
            port = self.port,
            environment = %self.environment,
            model = %self.gemini_model,
            origins = ?self.allowed_origins,
            max_upload_bytes = self.max_upload_bytes,
            max_concurrent_documents = self.max_concurrent_documents,
            "Loaded configuration"
        );
    }
}

fn parse_or<T: std::str::FromStr>(
    value: Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    value
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
        .map(|parsed| parsed.unwrap_or(default))
}

/// Split a comma-separated origin list, dropping blank entries.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

/// Number of full-size documents that fit in the memory budget, never less than one.
pub fn admission_limit(memory_budget_bytes: usize, max_upload_bytes: usize) -> usize {
    (memory_budget_bytes / max_upload_bytes.max(1)).max(1)
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
///
/// Runs before tracing is installed so `.env` can supply `RUST_LOG`; call
/// [`Config::log_summary`] once the subscriber is up.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "secret")])).expect("config");
        assert_eq!(config.port, 8000);
        assert_eq!(config.environment, "development");
        assert_eq!(config.gemini_model, DEFAULT_GEMINI_MODEL);
        assert_eq!(config.max_upload_bytes, 10 * 1024 * 1024);
        assert_eq!(config.completion_max_retries, 0);
        assert_eq!(config.completion_timeout, Duration::from_secs(120));
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:5173", "http://localhost:3000"]
        );
        assert_eq!(config.max_concurrent_documents, 25);
    }

    #[test]
    fn missing_api_key_is_reported() {
        let error = Config::from_lookup(lookup(&[("PORT", "9000")])).expect_err("missing key");
        assert!(matches!(error, ConfigError::MissingVariable(name) if name == "GEMINI_API_KEY"));
    }

    #[test]
    fn blank_api_key_counts_as_missing() {
        let error =
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "   ")])).expect_err("blank key");
        assert!(matches!(error, ConfigError::MissingVariable(_)));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let error = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("PORT", "eighty")]))
            .expect_err("invalid port");
        assert!(matches!(error, ConfigError::InvalidValue(name) if name == "PORT"));
    }

    #[test]
    fn origins_are_trimmed_and_blank_entries_dropped() {
        assert_eq!(
            parse_origins(" https://a.example , ,https://b.example,"),
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn explicit_concurrency_overrides_budget() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MEMORY_BUDGET_BYTES", "1"),
            ("MAX_CONCURRENT_DOCUMENTS", "3"),
        ]))
        .expect("config");
        assert_eq!(config.max_concurrent_documents, 3);
    }

    #[test]
    fn admission_limit_never_drops_below_one() {
        assert_eq!(admission_limit(1, DEFAULT_MAX_UPLOAD_BYTES), 1);
        assert_eq!(admission_limit(100 * 1024 * 1024, DEFAULT_MAX_UPLOAD_BYTES), 10);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn summary_is_logged_without_the_api_key() {
        let config = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "top-secret")]))
            .expect("config");
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::with_default(subscriber, || config.log_summary());

        let output = String::from_utf8(logs.0.lock().expect("lock").clone()).expect("utf8");
        assert!(output.contains("Loaded configuration"));
        assert!(output.contains("port=8000"));
        assert!(!output.contains("top-secret"));
    }

    #[test]
    fn zero_ceiling_is_invalid() {
        let error = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("MAX_UPLOAD_BYTES", "0"),
        ]))
        .expect_err("zero ceiling");
        assert!(matches!(error, ConfigError::InvalidValue(name) if name == "MAX_UPLOAD_BYTES"));
    }
}

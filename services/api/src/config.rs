use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// WebSocket endpoint of the speech/AI backend sessions relay to.
    pub upstream_ws_url: String,
    pub log_level: Level,
    /// Maximum session lifetime before the expiry sweep force-ends it.
    pub session_ttl: Duration,
    pub sweep_interval: Duration,
    pub supported_languages: Vec<String>,
    pub supported_models: Vec<String>,
}

const DEFAULT_LANGUAGES: &str = "hi,en,ta,te,bn,mr";
const DEFAULT_MODELS: &str = "vaani-voice-1,vaani-voice-mini";

fn parse_secs(var: &str, default: u64) -> Result<Duration, ConfigError> {
    match std::env::var(var) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::InvalidValue(var.to_string(), e.to_string())),
        Err(_) => Ok(Duration::from_secs(default)),
    }
}

fn parse_csv(var: &str, default: &str) -> Vec<String> {
    std::env::var(var)
        .unwrap_or_else(|_| default.to_string())
        .split(',')
        .map(|entry| entry.trim().to_string())
        .filter(|entry| !entry.is_empty())
        .collect()
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let upstream_ws_url = std::env::var("UPSTREAM_WS_URL")
            .map_err(|_| ConfigError::MissingVar("UPSTREAM_WS_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let session_ttl = parse_secs("SESSION_TTL_SECS", 600)?;
        let sweep_interval = parse_secs("SWEEP_INTERVAL_SECS", 30)?;

        let supported_languages = parse_csv("SUPPORTED_LANGUAGES", DEFAULT_LANGUAGES);
        let supported_models = parse_csv("SUPPORTED_MODELS", DEFAULT_MODELS);

        Ok(Self {
            bind_address,
            upstream_ws_url,
            log_level,
            session_ttl,
            sweep_interval,
            supported_languages,
            supported_models,
        })
    }

    pub fn is_supported_language(&self, language: &str) -> bool {
        self.supported_languages.iter().any(|l| l == language)
    }

    pub fn is_supported_model(&self, model: &str) -> bool {
        self.supported_models.iter().any(|m| m == model)
    }
}

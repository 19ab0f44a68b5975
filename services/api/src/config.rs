use crate::workspace::{DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_WORKSPACES};
use lingo_core::{
    gemini::{DEFAULT_BASE_URL, DEFAULT_SPEECH_MODEL, DEFAULT_TEXT_MODEL},
    tutor::DEFAULT_VOICE,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_GRAMMAR_MODEL: &str = "gemini-2.5-pro";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Not validated at startup; a missing key surfaces on the first model call.
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: String,
    pub text_model: String,
    pub grammar_model: String,
    pub speech_model: String,
    pub tts_voice: String,
    pub log_level: Level,
    pub prompts_path: Option<PathBuf>,
    /// Workspaces untouched for this long are closed and dropped.
    pub workspace_idle_timeout: Duration,
    pub max_workspaces: usize,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn positive_var(name: &str, default: u64) -> Result<u64, ConfigError> {
    let Ok(raw) = std::env::var(name) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidValue(
            name.to_string(),
            format!("'{}' is not a positive integer", raw),
        )),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let bind_address_str = var_or("BIND_ADDRESS", "0.0.0.0:3000");
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let gemini_api_key = std::env::var("GEMINI_API_KEY")
            .or_else(|_| std::env::var("API_KEY"))
            .ok()
            .filter(|key| !key.trim().is_empty());

        let gemini_base_url = var_or("GEMINI_BASE_URL", DEFAULT_BASE_URL);
        if !gemini_base_url.starts_with("http://") && !gemini_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "GEMINI_BASE_URL".to_string(),
                format!("'{}' is not an http(s) URL", gemini_base_url),
            ));
        }

        let text_model = var_or("TEXT_MODEL", DEFAULT_TEXT_MODEL);
        let grammar_model = var_or("GRAMMAR_MODEL", DEFAULT_GRAMMAR_MODEL);
        let speech_model = var_or("SPEECH_MODEL", DEFAULT_SPEECH_MODEL);
        let tts_voice = var_or("TTS_VOICE", DEFAULT_VOICE);

        let log_level_str = var_or("RUST_LOG", "INFO");
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let prompts_path = std::env::var("PROMPTS_PATH").ok().map(PathBuf::from);

        let workspace_idle_timeout = Duration::from_secs(positive_var(
            "WORKSPACE_IDLE_SECS",
            DEFAULT_IDLE_TIMEOUT.as_secs(),
        )?);
        let max_workspaces = positive_var("MAX_WORKSPACES", DEFAULT_MAX_WORKSPACES as u64)?;
        let max_workspaces = usize::try_from(max_workspaces).map_err(|e| {
            ConfigError::InvalidValue("MAX_WORKSPACES".to_string(), e.to_string())
        })?;

        Ok(Self {
            bind_address,
            gemini_api_key,
            gemini_base_url,
            text_model,
            grammar_model,
            speech_model,
            tts_voice,
            log_level,
            prompts_path,
            workspace_idle_timeout,
            max_workspaces,
        })
    }
}

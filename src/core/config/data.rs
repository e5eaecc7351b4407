use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::reveal::DEFAULT_REVEAL_INTERVAL;

pub const DEFAULT_BASE_URL: &str = "http://34.28.28.107:30000/v1";
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3.2-11B-Vision-Instruct";
pub const DEFAULT_UPLOAD_URL: &str = "https://apiv7.goqii.com/user/upload_endoded_image";
pub const DEFAULT_API_KEY_ENV: &str = "SENSAI_API_KEY";

/// Keys accepted by `sensai config set` / `unset`.
pub const CONFIG_KEYS: &[&str] = &[
    "base-url",
    "model",
    "api-key-env",
    "upload-url",
    "reveal-interval-ms",
    "request-timeout-secs",
    "data-dir",
];

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the chat-completion API (the part before `/chat/completions`)
    pub base_url: Option<String>,
    pub model: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Endpoint that hosts uploaded images and returns their URL
    pub upload_url: Option<String>,
    /// Milliseconds between revealed characters; 0 prints answers at once
    pub reveal_interval_ms: Option<u64>,
    /// Request timeout for completion calls; unset means wait indefinitely
    pub request_timeout_secs: Option<u64>,
    /// Directory for the study room and local profile
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigKeyError {
    UnknownKey(String),
    InvalidValue { key: String, value: String },
}

impl fmt::Display for ConfigKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigKeyError::UnknownKey(key) => write!(
                f,
                "Unknown config key '{key}'. Available keys: {}",
                CONFIG_KEYS.join(", ")
            ),
            ConfigKeyError::InvalidValue { key, value } => {
                write!(f, "Invalid value '{value}' for '{key}': expected a whole number")
            }
        }
    }
}

impl std::error::Error for ConfigKeyError {}

fn parse_number(key: &str, value: &str) -> Result<u64, ConfigKeyError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigKeyError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        })
}

impl Config {
    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn model(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn upload_url(&self) -> &str {
        self.upload_url.as_deref().unwrap_or(DEFAULT_UPLOAD_URL)
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or(DEFAULT_API_KEY_ENV)
    }

    /// API key from the configured environment variable, if set and non-empty.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(self.api_key_env())
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn reveal_interval(&self) -> Duration {
        self.reveal_interval_ms
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_REVEAL_INTERVAL)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigKeyError> {
        match key {
            "base-url" => self.base_url = Some(value.to_string()),
            "model" => self.model = Some(value.to_string()),
            "api-key-env" => self.api_key_env = Some(value.to_string()),
            "upload-url" => self.upload_url = Some(value.to_string()),
            "reveal-interval-ms" => self.reveal_interval_ms = Some(parse_number(key, value)?),
            "request-timeout-secs" => {
                self.request_timeout_secs = Some(parse_number(key, value)?)
            }
            "data-dir" => self.data_dir = Some(PathBuf::from(value)),
            other => return Err(ConfigKeyError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn unset(&mut self, key: &str) -> Result<(), ConfigKeyError> {
        match key {
            "base-url" => self.base_url = None,
            "model" => self.model = None,
            "api-key-env" => self.api_key_env = None,
            "upload-url" => self.upload_url = None,
            "reveal-interval-ms" => self.reveal_interval_ms = None,
            "request-timeout-secs" => self.request_timeout_secs = None,
            "data-dir" => self.data_dir = None,
            other => return Err(ConfigKeyError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

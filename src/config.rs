//! Environment-driven configuration

use crate::chat::{ClientConfig, SessionOptions, DEFAULT_ENDPOINT, DEFAULT_MODEL};
use crate::voice::WhisperConfig;
use std::time::Duration;
use thiserror::Error;

pub const API_KEY_VAR: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{var} has invalid value {value:?}: expected {expected}")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client: ClientConfig,
    pub session: SessionOptions,
    /// Language code for transcription and synthesis
    pub language: String,
    /// Remote transcription, when `WHISPER_BASE_URL` is set
    pub whisper: Option<WhisperConfig>,
    pub tts_enabled: bool,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = get(API_KEY_VAR).ok_or(ConfigError::Missing(API_KEY_VAR))?;

        let client = ClientConfig {
            endpoint: get("ANNADATA_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            api_key,
            model: get("ANNADATA_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            connect_timeout: Duration::from_secs(parse_secs(
                "ANNADATA_CONNECT_TIMEOUT_SECS",
                get("ANNADATA_CONNECT_TIMEOUT_SECS"),
                10,
            )?),
            read_timeout: match parse_secs(
                "ANNADATA_READ_TIMEOUT_SECS",
                get("ANNADATA_READ_TIMEOUT_SECS"),
                60,
            )? {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            app_url: get("ANNADATA_APP_URL"),
            app_title: Some(get("ANNADATA_APP_TITLE").unwrap_or_else(|| "AnnaData".to_string())),
        };

        let session = SessionOptions {
            stream: parse_bool("ANNADATA_STREAM", get("ANNADATA_STREAM"), true)?,
            retain_history: parse_bool(
                "ANNADATA_RETAIN_HISTORY",
                get("ANNADATA_RETAIN_HISTORY"),
                true,
            )?,
        };

        let whisper = get("WHISPER_BASE_URL").map(|base_url| WhisperConfig {
            base_url,
            model: get("WHISPER_MODEL").unwrap_or_else(|| "whisper-1".to_string()),
            api_key: get("WHISPER_API_KEY"),
        });

        Ok(Self {
            client,
            session,
            language: get("ANNADATA_LANGUAGE").unwrap_or_else(|| "hi".to_string()),
            whisper,
            tts_enabled: parse_bool("ANNADATA_TTS", get("ANNADATA_TTS"), true)?,
        })
    }
}

fn parse_bool(var: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value,
            expected: "a boolean",
        }),
    }
}

fn parse_secs(var: &'static str, value: Option<String>, default: u64) -> Result<u64, ConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected: "whole seconds",
        }),
    }
}

// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_LOG_FILE: &str = "mdosnapshots.log";
pub const DEFAULT_STATE_FILE: &str = "log2telegram.json";
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Adds the variables of a `.env` file to the process environment, without replacing
/// variables that are already set.
///
/// With no path, `.env` is looked up from the working directory upwards. Returns the file
/// that was loaded.
pub fn load_dotenv(path: Option<&Path>) -> Option<PathBuf> {
    match path {
        Some(path) => dotenvy::from_path(path).ok().map(|()| path.to_path_buf()),
        None => dotenvy::dotenv().ok(),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifierConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("Invalid value '{value}' for {name}")]
    InvalidValue { name: &'static str, value: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Settings of the log notifier, read from the environment.
#[derive(Clone)]
pub struct NotifierConfig {
    /// Telegram bot token
    pub bot_token: String,
    /// Chat receiving the notifications
    pub chat_id: String,
    /// Log file written by the snapshot manager
    pub log_file: PathBuf,
    /// Where the read position is persisted
    pub state_file: PathBuf,
    /// Base URL of the Bot API
    pub api_url: String,
    /// Delivery attempts per message, first try included
    pub send_retries: u32,
    pub retry_delay: Duration,
    /// Pause between consecutive messages of one batch
    pub message_delay: Duration,
    pub request_timeout: Duration,
    /// Only forward status lines that do not report success
    pub only_failures: bool,
    /// Remove the logger's `<timestamp> - <LEVEL> - ` prefix before matching
    pub strip_preamble: bool,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
    /// Log level (e.g., trace, debug, info, warn, error)
    pub log_level: String,
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("bot_token", &"***")
            .field("chat_id", &self.chat_id)
            .field("log_file", &self.log_file)
            .field("state_file", &self.state_file)
            .field("api_url", &self.api_url)
            .field("send_retries", &self.send_retries)
            .field("retry_delay", &self.retry_delay)
            .field("message_delay", &self.message_delay)
            .field("request_timeout", &self.request_timeout)
            .field("only_failures", &self.only_failures)
            .field("strip_preamble", &self.strip_preamble)
            .field("https_proxy", &self.https_proxy)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl NotifierConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, NotifierConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Create configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, NotifierConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let bot_token = var("TELEGRAM_BOT_TOKEN")
            .ok_or(NotifierConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;
        let chat_id =
            var("TELEGRAM_CHAT_ID").ok_or(NotifierConfigError::Missing("TELEGRAM_CHAT_ID"))?;

        let config = Self {
            bot_token: bot_token.trim().to_string(),
            chat_id: chat_id.trim().to_string(),
            log_file: var("LOG2TELEGRAM_LOG_FILE")
                .map_or_else(|| PathBuf::from(DEFAULT_LOG_FILE), PathBuf::from),
            state_file: var("LOG2TELEGRAM_STATE_FILE")
                .map_or_else(|| PathBuf::from(DEFAULT_STATE_FILE), PathBuf::from),
            api_url: var("LOG2TELEGRAM_API_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            send_retries: parse_number(
                "LOG2TELEGRAM_SEND_RETRIES",
                var("LOG2TELEGRAM_SEND_RETRIES"),
                3,
            )?,
            retry_delay: parse_secs(
                "LOG2TELEGRAM_RETRY_DELAY_SECS",
                var("LOG2TELEGRAM_RETRY_DELAY_SECS"),
                5,
            )?,
            message_delay: parse_secs(
                "LOG2TELEGRAM_MESSAGE_DELAY_SECS",
                var("LOG2TELEGRAM_MESSAGE_DELAY_SECS"),
                10,
            )?,
            request_timeout: parse_secs(
                "LOG2TELEGRAM_REQUEST_TIMEOUT_SECS",
                var("LOG2TELEGRAM_REQUEST_TIMEOUT_SECS"),
                10,
            )?,
            only_failures: parse_bool(
                "LOG2TELEGRAM_ONLY_FAILURES",
                var("LOG2TELEGRAM_ONLY_FAILURES"),
                false,
            )?,
            strip_preamble: parse_bool(
                "LOG2TELEGRAM_STRIP_PREAMBLE",
                var("LOG2TELEGRAM_STRIP_PREAMBLE"),
                true,
            )?,
            https_proxy: var("LOG2TELEGRAM_PROXY_HTTPS").or_else(|| var("HTTPS_PROXY")),
            log_level: var("LOG_LEVEL")
                .map(|val| val.to_lowercase())
                .unwrap_or_else(|| "info".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), NotifierConfigError> {
        if self.send_retries == 0 {
            return Err(NotifierConfigError::InvalidConfig(
                "LOG2TELEGRAM_SEND_RETRIES must be at least 1".to_string(),
            ));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(NotifierConfigError::InvalidConfig(format!(
                "LOG2TELEGRAM_API_URL must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }

        if self.request_timeout.is_zero() {
            return Err(NotifierConfigError::InvalidConfig(
                "LOG2TELEGRAM_REQUEST_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.log_level.as_str()) {
            return Err(NotifierConfigError::InvalidConfig(format!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.log_level
            )));
        }

        Ok(())
    }

    /// Telegram `sendMessage` endpoint for the configured bot.
    #[must_use]
    pub fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_url, self.bot_token)
    }
}

fn parse_number(
    name: &'static str,
    value: Option<String>,
    default: u32,
) -> Result<u32, NotifierConfigError> {
    match value {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| NotifierConfigError::InvalidValue { name, value }),
    }
}

fn parse_secs(
    name: &'static str,
    value: Option<String>,
    default: u64,
) -> Result<Duration, NotifierConfigError> {
    match value {
        None => Ok(Duration::from_secs(default)),
        Some(value) => value
            .trim()
            .parse()
            .map(Duration::from_secs)
            .map_err(|_| NotifierConfigError::InvalidValue { name, value }),
    }
}

fn parse_bool(
    name: &'static str,
    value: Option<String>,
    default: bool,
) -> Result<bool, NotifierConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(NotifierConfigError::InvalidValue { name, value }),
    }
}

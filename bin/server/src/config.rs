//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables.
//!
//! See [`GithubConfig`](roster_store::GithubConfig) for the record document
//! and [`EngineSettings`](roster_conversation::EngineSettings) for the
//! conversation engine.

use reqwest::Url;
use roster_conversation::EngineSettings;
use roster_store::GithubConfig;
use rootcause::Report;
use serde::Deserialize;
use std::fmt;

/// Path the chat platform posts updates to.
pub const WEBHOOK_PATH: &str = "/telegram/webhook";

/// Errors from loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The sources could not be read or deserialized.
    Load { reason: String },
    /// Required values are present but empty.
    Missing { fields: Vec<&'static str> },
    /// The public host does not form a valid webhook URL.
    InvalidPublicHost { host: String },
    /// The default expiration is not a `YYYY-MM-DD` date.
    InvalidDefaultExpiration { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Load { reason } => write!(f, "failed to load configuration: {reason}"),
            Self::Missing { fields } => {
                write!(f, "missing required configuration: {}", fields.join(", "))
            }
            Self::InvalidPublicHost { host } => {
                write!(f, "public host '{host}' does not form a valid webhook URL")
            }
            Self::InvalidDefaultExpiration { value } => {
                write!(f, "default expiration '{value}' is not a YYYY-MM-DD date")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Port the webhook and health endpoints listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Chat platform configuration.
    pub telegram: TelegramConfig,

    /// Record document configuration.
    pub github: GithubConfig,

    /// Conversation engine settings.
    #[serde(default)]
    pub conversation: EngineSettings,
}

fn default_port() -> u16 {
    8080
}

/// Telegram bot configuration.
#[derive(Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,
    /// Public hostname the webhook is reachable at.
    pub public_host: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("public_host", &self.public_host)
            .finish()
    }
}

impl TelegramConfig {
    /// Returns the URL registered with the chat platform.
    #[must_use]
    pub fn webhook_url(&self) -> Option<Url> {
        let host = self.public_host.trim().trim_end_matches('/');
        Url::parse(&format!("https://{host}{WEBHOOK_PATH}")).ok()
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, Report<ConfigError>> {
        Self::from_builder(
            config::Config::builder().add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, Report<ConfigError>> {
        let config: Self = builder
            .build()
            .and_then(config::Config::try_deserialize)
            .map_err(|e| ConfigError::Load {
                reason: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that deserialization alone does not catch.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first problem found.
    pub fn validate(&self) -> Result<(), Report<ConfigError>> {
        let mut missing = Vec::new();
        if self.telegram.bot_token.trim().is_empty() {
            missing.push("telegram.bot_token");
        }
        if self.telegram.public_host.trim().is_empty() {
            missing.push("telegram.public_host");
        }
        missing.extend(self.github.missing_fields());
        if !missing.is_empty() {
            return Err(ConfigError::Missing { fields: missing }.into());
        }

        if self.telegram.webhook_url().is_none() {
            return Err(ConfigError::InvalidPublicHost {
                host: self.telegram.public_host.clone(),
            }
            .into());
        }

        if !self.conversation.is_valid() {
            return Err(ConfigError::InvalidDefaultExpiration {
                value: self.conversation.default_expiration.clone(),
            }
            .into());
        }

        Ok(())
    }
}

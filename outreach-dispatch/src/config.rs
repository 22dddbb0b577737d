//! Dispatch engine configuration
//!
//! Deserialized from the daemon's RON config. Pacing and timeout fields are
//! plain seconds with [`Duration`] accessors; [`DispatchConfig::validate`]
//! is called once at startup and rejects out-of-range values instead of
//! clamping them.

use std::time::Duration;

use serde::Deserialize;

use crate::{error::ConfigError, template::TemplateCatalog};

/// Shortest allowed delay between successive sends
pub const MIN_INTERVAL_SECONDS: u64 = 5;
/// Longest allowed delay between successive sends
pub const MAX_INTERVAL_SECONDS: u64 = 60;

const fn default_interval_seconds() -> u64 {
    30
}

const fn default_send_timeout_seconds() -> u64 {
    30
}

const fn default_http_timeout_seconds() -> u64 {
    10
}

const fn default_max_message_length() -> usize {
    480
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Seconds between successive sends, bounded by
    /// [`MIN_INTERVAL_SECONDS`]..=[`MAX_INTERVAL_SECONDS`]
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Upper bound on a single transport send
    #[serde(default = "default_send_timeout_seconds")]
    pub send_timeout_seconds: u64,
    /// Upper bound on recipient-source requests
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
    /// Rendered messages longer than this settle as failures
    #[serde(default = "default_max_message_length")]
    pub max_message_length: usize,
    pub recipient_endpoint: String,
    pub gateway_endpoint: String,
    #[serde(default)]
    pub gateway_token: Option<String>,
    #[serde(default)]
    pub templates: TemplateCatalog,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            interval_seconds: default_interval_seconds(),
            send_timeout_seconds: default_send_timeout_seconds(),
            http_timeout_seconds: default_http_timeout_seconds(),
            max_message_length: default_max_message_length(),
            recipient_endpoint: String::new(),
            gateway_endpoint: String::new(),
            gateway_token: None,
            templates: TemplateCatalog::default(),
        }
    }
}

impl DispatchConfig {
    /// # Errors
    ///
    /// Returns a `ConfigError` when a field is outside its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_INTERVAL_SECONDS..=MAX_INTERVAL_SECONDS).contains(&self.interval_seconds) {
            return Err(ConfigError::IntervalOutOfRange {
                seconds: self.interval_seconds,
            });
        }

        if self.send_timeout_seconds == 0 {
            return Err(ConfigError::ZeroSendTimeout);
        }

        if self.max_message_length == 0 {
            return Err(ConfigError::ZeroMessageLength);
        }

        Ok(())
    }

    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    #[must_use]
    pub const fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_seconds)
    }

    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

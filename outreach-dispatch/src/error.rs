//! Error types for the dispatch engine
//!
//! Only fetch, validation and configuration failures propagate out of the
//! engine. Per-recipient failures (`DeliveryError`, `RenderError`) are
//! absorbed into that recipient's terminal status and the run continues.

use thiserror::Error;

/// Errors surfaced by engine operations
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The recipient source could not produce a list
    #[error("Fetch failure: {0}")]
    Fetch(#[from] FetchError),

    /// A start request was refused before any work began
    #[error("Validation failure: {0}")]
    Validation(#[from] ValidationError),

    /// The engine was constructed with invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Recipient source failures
///
/// None of these replace the roster: a failed fetch leaves the previous
/// recipient list untouched rather than installing a partial one.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The HTTP request itself failed (connect, body, deserialize)
    #[error("recipient source request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The endpoint answered with a non-success status
    #[error("recipient source returned {status}: {body}")]
    Endpoint { status: u16, body: String },
}

/// Refusals reported synchronously by a start request; job state is unchanged
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("no eligible recipients: nothing selected or everything already sent")]
    NoEligibleRecipients,

    #[error("unknown template: {0}")]
    UnknownTemplate(String),

    #[error("template {id} has no content for locale {locale}")]
    MissingLocale { id: String, locale: String },

    #[error("template {0} is empty")]
    EmptyTemplate(String),
}

/// A single transport send failing
///
/// Recorded on the recipient as its terminal status, never fatal to the run.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The HTTP request itself failed
    #[error("transport request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway answered with a non-success status
    #[error("gateway returned {status}: {body}")]
    Gateway { status: u16, body: String },

    /// The gateway accepted the request but refused the message
    #[error("gateway rejected the message: {0}")]
    Rejected(String),

    /// The send did not settle within the configured timeout
    #[error("send timed out after {0}s")]
    Timeout(u64),
}

/// Rendering a message for one recipient failing
///
/// Treated exactly like a delivery failure for that recipient.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("rendered message is {length} characters, limit is {limit}")]
    MessageTooLong { length: usize, limit: usize },
}

/// Invalid engine configuration, rejected at construction time
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("dispatch interval must be 5 to 60 seconds, got {seconds}")]
    IntervalOutOfRange { seconds: u64 },

    #[error("send timeout must be non-zero")]
    ZeroSendTimeout,

    #[error("maximum message length must be non-zero")]
    ZeroMessageLength,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn fetch_converts_into_dispatch_error() {
        let err: DispatchError = FetchError::Endpoint {
            status: 502,
            body: "bad gateway".to_string(),
        }
        .into();
        assert!(matches!(err, DispatchError::Fetch(_)));
    }

    #[test]
    fn validation_converts_into_dispatch_error() {
        let err: DispatchError = ValidationError::NoEligibleRecipients.into();
        assert!(matches!(err, DispatchError::Validation(_)));
    }

    #[test]
    fn config_converts_into_dispatch_error() {
        let err: DispatchError = ConfigError::IntervalOutOfRange { seconds: 3 }.into();
        assert!(matches!(err, DispatchError::Config(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: dispatch interval must be 5 to 60 seconds, got 3"
        );
    }

    #[test]
    fn delivery_timeout_display_names_the_seconds() {
        assert_eq!(
            DeliveryError::Timeout(30).to_string(),
            "send timed out after 30s"
        );
    }

    #[test]
    fn render_error_display_reports_both_lengths() {
        let err = RenderError::MessageTooLong {
            length: 500,
            limit: 480,
        };
        assert_eq!(
            err.to_string(),
            "rendered message is 500 characters, limit is 480"
        );
    }
}

//! Outbound SMS transport
//!
//! - [`SmsTransport`] is the provider boundary the delivery worker drives
//! - [`HttpSmsGateway`] speaks a JSON gateway's send contract

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DeliveryError;

/// Longest slice of a provider error body kept in an error string
const BODY_EXCERPT_LIMIT: usize = 256;

/// Acknowledgement returned by a transport on success
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub message_id: Option<String>,
}

/// Settled outcome of one delivery attempt
///
/// Always one of `success` with an optional provider id, or a failure with
/// a human-readable reason. Transport errors never escape as errors past
/// the delivery worker; they arrive here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryResult {
    pub success: bool,
    pub provider_message_id: Option<String>,
    pub error: Option<String>,
}

impl DeliveryResult {
    #[must_use]
    pub const fn delivered(provider_message_id: Option<String>) -> Self {
        Self {
            success: true,
            provider_message_id,
            error: None,
        }
    }

    #[must_use]
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            provider_message_id: None,
            error: Some(error.into()),
        }
    }
}

/// The opaque message-delivery boundary
///
/// One provider call per invocation, no retries. Time-bounding is the
/// caller's concern.
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send(&self, to: &str, text: &str) -> Result<SendReceipt, DeliveryError>;
}

#[derive(Debug, Serialize)]
struct GatewayRequest<'a> {
    to: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GatewayAck {
    #[serde(default)]
    message_id: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// SMS provider adapter POSTing `{to, text}` to a configured endpoint
#[derive(Debug, Clone)]
pub struct HttpSmsGateway {
    client: reqwest::Client,
    endpoint: String,
    bearer_token: Option<String>,
}

impl HttpSmsGateway {
    /// # Errors
    ///
    /// Returns a `DeliveryError` if the underlying HTTP client cannot be
    /// constructed.
    pub fn new(
        endpoint: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bearer_token,
        })
    }
}

#[async_trait]
impl SmsTransport for HttpSmsGateway {
    async fn send(&self, to: &str, text: &str) -> Result<SendReceipt, DeliveryError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&GatewayRequest { to, text });

        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Gateway {
                status: status.as_u16(),
                body: excerpt(&response.text().await.unwrap_or_default()),
            });
        }

        let ack: GatewayAck = response.json().await?;
        if let Some(reason) = ack.error {
            return Err(DeliveryError::Rejected(reason));
        }

        Ok(SendReceipt {
            message_id: ack.message_id,
        })
    }
}

fn excerpt(body: &str) -> String {
    body.chars().take(BODY_EXCERPT_LIMIT).collect()
}

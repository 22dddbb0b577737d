//! Delivery worker
//!
//! Sends to exactly one recipient per call, bounds the transport with the
//! configured timeout, and folds every failure into the returned
//! [`DeliveryResult`]. Pacing and sequencing live in the dispatcher; this
//! never retries and never runs two sends for the same job.

use std::{sync::Arc, time::Duration};

use crate::{
    error::DeliveryError,
    recipient::Recipient,
    transport::{DeliveryResult, SmsTransport},
};

pub struct DeliveryWorker {
    transport: Arc<dyn SmsTransport>,
    send_timeout: Duration,
}

impl DeliveryWorker {
    #[must_use]
    pub fn new(transport: Arc<dyn SmsTransport>, send_timeout: Duration) -> Self {
        Self {
            transport,
            send_timeout,
        }
    }

    /// Deliver `text` to one recipient
    ///
    /// Transport errors and timeout expiry never escape; both settle as a
    /// failed [`DeliveryResult`] carrying the reason.
    pub async fn send(&self, recipient: &Recipient, text: &str) -> DeliveryResult {
        let attempt = self.transport.send(&recipient.phone, text);

        let outcome = match tokio::time::timeout(self.send_timeout, attempt).await {
            Ok(settled) => settled,
            Err(_) => Err(DeliveryError::Timeout(self.send_timeout.as_secs())),
        };

        match outcome {
            Ok(receipt) => {
                outreach_common::outgoing!(
                    level = DEBUG,
                    "delivered to {}, provider id {:?}",
                    recipient.phone,
                    receipt.message_id
                );

                DeliveryResult::delivered(receipt.message_id)
            }
            Err(error) => {
                outreach_common::outgoing!(
                    level = WARN,
                    "delivery to {} failed: {error}",
                    recipient.phone
                );

                DeliveryResult::failed(error.to_string())
            }
        }
    }
}

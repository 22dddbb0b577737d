//! Sequential bulk-message dispatch engine
//!
//! This crate provides functionality to:
//! - Fetch and filter candidate recipients into a selectable roster
//! - Render per-recipient messages from a locale-aware template catalog
//! - Deliver one message at a time through an opaque SMS transport, with a
//!   configurable delay between successive sends
//! - Drive a run through its pause/resume/stop lifecycle and publish
//!   progress snapshots at every commit point

mod config;
mod dispatcher;
mod error;
mod job;
mod recipient;
mod roster;
mod selector;
mod template;
mod tracker;
mod transport;
mod worker;

// Re-export configuration types
pub use config::{DispatchConfig, MAX_INTERVAL_SECONDS, MIN_INTERVAL_SECONDS};
// Re-export the controller
pub use dispatcher::Dispatcher;
// Re-export error types
pub use error::{
    ConfigError, DeliveryError, DispatchError, FetchError, RenderError, ValidationError,
};
// Re-export run types
pub use job::{DispatchJob, JobControl, JobState};
pub use recipient::{Recipient, RecipientStatus};
pub use roster::Roster;
// Re-export selection types
pub use selector::{
    HttpRecipientSource, RecipientQuery, RecipientSource, retain_first_phone_occurrence,
};
pub use template::{MessageTemplate, SUPPORTED_TOKENS, TemplateCatalog};
pub use tracker::DispatchSnapshot;
// Re-export transport types
pub use transport::{DeliveryResult, HttpSmsGateway, SendReceipt, SmsTransport};
pub use worker::DeliveryWorker;

//! Control protocol for managing a running outreach daemon
//!
//! Provides an IPC mechanism over a Unix domain socket to:
//! - Start/pause/resume/stop dispatch runs and query their status
//! - Fetch, select, and list roster recipients
//! - Check daemon health
//!
//! Frames are length-prefixed bincode with a versioned request wrapper.

pub mod client;
pub mod error;
pub mod protocol;
pub mod server;

pub use client::ControlClient;
pub use error::{ControlError, Result};
pub use protocol::{
    JobCommand, PROTOCOL_VERSION, Request, RequestCommand, Response, ResponsePayload,
    RosterCommand, SystemCommand,
};
pub use server::{CommandHandler, ControlServer};

/// Default path for the control socket
pub const DEFAULT_CONTROL_SOCKET: &str = "/tmp/outreach.sock";

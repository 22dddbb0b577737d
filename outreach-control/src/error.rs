//! Error types for control operations

use thiserror::Error;

/// Errors that can occur while talking to, or serving, the control socket
#[derive(Debug, Error)]
pub enum ControlError {
    /// I/O error communicating with the control socket
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Protocol deserialization error
    #[error("protocol error: {0}")]
    ProtocolDeserialization(#[from] bincode::error::DecodeError),

    /// Protocol serialization error
    #[error("protocol error: {0}")]
    ProtocolSerialization(#[from] bincode::error::EncodeError),

    /// The two ends disagree on the protocol version
    #[error("protocol version mismatch: server speaks v{server}, client v{client}")]
    VersionMismatch { server: u32, client: u32 },

    /// Server returned an error payload
    #[error("server error: {0}")]
    ServerError(String),

    /// Connection closed unexpectedly
    #[error("connection closed")]
    ConnectionClosed,

    /// Request timeout
    #[error("request timeout")]
    Timeout,

    /// Control socket path is invalid
    #[error("invalid socket path: {0}")]
    InvalidSocketPath(String),
}

/// Result type for control operations
pub type Result<T> = std::result::Result<T, ControlError>;

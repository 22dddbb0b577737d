//! Client for connecting to the control socket

use std::{path::Path, time::Duration};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::UnixStream,
};
use tracing::{debug, trace};

use crate::{ControlError, Request, Response, ResponsePayload, Result};

/// Maximum response size; large enough for a full roster listing while
/// bounding memory per response (10MB)
const MAX_RESPONSE_SIZE: u32 = 10_000_000;

/// Client for communicating with the outreach control server
///
/// Connections are one-shot: each request opens a fresh stream, sends one
/// length-prefixed request, and reads one response.
pub struct ControlClient {
    socket_path: String,
    timeout: Duration,
}

impl ControlClient {
    /// Create a new control client with the given socket path
    #[must_use]
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
            timeout: Duration::from_secs(10),
        }
    }

    /// Set the request timeout
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Send a request and receive a response
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Connection fails
    /// - A protocol error occurs or the versions are incompatible
    /// - The request times out
    /// - The server returns an error payload
    pub async fn send_request(&self, request: Request) -> Result<Response> {
        // The timeout covers the entire request/response cycle
        tokio::time::timeout(self.timeout, self.send_and_receive(request))
            .await
            .map_err(|_| ControlError::Timeout)?
    }

    async fn send_and_receive(&self, request: Request) -> Result<Response> {
        debug!("Connecting to control socket: {}", self.socket_path);
        let mut stream = UnixStream::connect(&self.socket_path).await?;

        let request_bytes = bincode::serde::encode_to_vec(&request, bincode::config::legacy())?;
        let request_len = u32::try_from(request_bytes.len())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        trace!("Sending request: {request_len} bytes");

        stream.write_all(&request_len.to_be_bytes()).await?;
        stream.write_all(&request_bytes).await?;
        stream.flush().await?;

        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await?;
        let response_len = u32::from_be_bytes(len_buf);

        if response_len > MAX_RESPONSE_SIZE {
            return Err(ControlError::ProtocolDeserialization(
                bincode::error::DecodeError::OtherString(format!(
                    "response too large: {response_len} bytes (max {MAX_RESPONSE_SIZE})"
                )),
            ));
        }

        trace!("Receiving response: {response_len} bytes");

        let mut response_bytes = vec![0u8; response_len as usize];
        stream.read_exact(&mut response_bytes).await?;

        let (response, _): (Response, _) = bincode::serde::decode_from_slice(
            response_bytes.as_slice(),
            bincode::config::legacy(),
        )?;

        if !response.is_version_compatible() {
            return Err(ControlError::VersionMismatch {
                server: response.version,
                client: crate::PROTOCOL_VERSION,
            });
        }

        if let ResponsePayload::Error(ref err) = response.payload {
            return Err(ControlError::ServerError(err.clone()));
        }

        Ok(response)
    }

    /// Check if the control socket exists on disk
    ///
    /// # Errors
    ///
    /// Returns an error if the socket path does not exist
    pub fn check_socket_exists(&self) -> Result<()> {
        let path = Path::new(&self.socket_path);
        if !path.exists() {
            return Err(ControlError::InvalidSocketPath(format!(
                "socket does not exist: {}",
                self.socket_path
            )));
        }
        Ok(())
    }
}

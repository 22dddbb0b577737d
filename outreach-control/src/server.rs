//! Control server implementation

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::{path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{UnixListener, UnixStream},
    sync::broadcast,
};
use tracing::{debug, error, info, trace, warn};

use crate::{ControlError, Request, Response, Result};

/// Maximum request size; anything larger is rejected unread (1MB)
const MAX_REQUEST_SIZE: u32 = 1_000_000;

/// Handler trait for processing control requests
///
/// Implement this trait to bridge protocol commands onto the daemon
#[async_trait]
pub trait CommandHandler: Send + Sync {
    /// Handle a request and return a response
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be processed
    async fn handle_request(&self, request: Request) -> Result<Response>;
}

/// Control server for managing the outreach daemon via Unix domain socket
pub struct ControlServer {
    socket_path: String,
    handler: Arc<dyn CommandHandler>,
}

impl ControlServer {
    pub fn new(socket_path: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        Self {
            socket_path: socket_path.into(),
            handler,
        }
    }

    /// Start the control server
    ///
    /// This function runs until a shutdown signal is received.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The socket path is already served by a live instance
    /// - The socket cannot be bound
    /// - A fatal I/O error occurs
    pub async fn serve(
        &self,
        mut shutdown: broadcast::Receiver<outreach_common::Signal>,
    ) -> Result<()> {
        let socket_path = Path::new(&self.socket_path);
        if socket_path.exists() {
            // A connectable socket means another instance owns this path
            if UnixStream::connect(socket_path).await.is_ok() {
                return Err(ControlError::Io(std::io::Error::new(
                    std::io::ErrorKind::AddrInUse,
                    format!(
                        "socket already in use by running instance: {}",
                        self.socket_path
                    ),
                )));
            }
            // Stale socket from a crashed process, safe to remove
            info!("Removing stale socket file: {}", self.socket_path);
            tokio::fs::remove_file(socket_path).await?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        // Owner only: rw-------
        #[cfg(unix)]
        {
            let metadata = tokio::fs::metadata(&self.socket_path).await?;
            let mut perms = metadata.permissions();
            perms.set_mode(0o600);
            tokio::fs::set_permissions(&self.socket_path, perms).await?;
            info!(
                "Control socket created with mode 0600 (owner only): {}",
                self.socket_path
            );
        }
        #[cfg(not(unix))]
        {
            info!("Control server listening on: {}", self.socket_path);
        }

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, _addr)) => {
                            let handler = Arc::clone(&self.handler);
                            tokio::spawn(async move {
                                if let Err(e) = Self::handle_connection(stream, handler).await {
                                    error!("Error handling control connection: {e}");
                                }
                            });
                        }
                        Err(e) => {
                            error!("Error accepting control connection: {e}");
                        }
                    }
                }
                sig = shutdown.recv() => {
                    match sig {
                        Ok(outreach_common::Signal::Shutdown | outreach_common::Signal::Finalised) => {
                            info!("Control server shutting down");
                            break;
                        }
                        Err(e) => {
                            error!("Control server shutdown channel error: {e}");
                            break;
                        }
                    }
                }
            }
        }

        if socket_path.exists() {
            debug!("Removing socket file: {}", self.socket_path);
            let _ = tokio::fs::remove_file(socket_path).await;
        }

        Ok(())
    }

    /// Handle a single client connection
    async fn handle_connection(
        mut stream: UnixStream,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<()> {
        // Bound both directions so a broken client cannot pin the task
        let timeout = Duration::from_secs(30);

        let request = tokio::time::timeout(timeout, Self::read_request(&mut stream))
            .await
            .map_err(|_| ControlError::Timeout)??;

        trace!("Received request: {request:?}");

        let response = if request.is_version_compatible() {
            match handler.handle_request(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!("Error handling request: {e}");
                    Response::error(e.to_string())
                }
            }
        } else {
            warn!(
                "Rejecting request with protocol version {}, server speaks {}",
                request.version,
                crate::PROTOCOL_VERSION
            );
            Response::error(format!(
                "unsupported protocol version {} (server speaks {})",
                request.version,
                crate::PROTOCOL_VERSION
            ))
        };

        trace!("Sending response: {response:?}");

        tokio::time::timeout(timeout, Self::write_response(&mut stream, &response))
            .await
            .map_err(|_| ControlError::Timeout)??;

        Ok(())
    }

    /// Read a length-prefixed request from the stream
    async fn read_request(stream: &mut UnixStream) -> Result<Request> {
        let mut len_buf = [0u8; 4];
        stream.read_exact(&mut len_buf).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                ControlError::ConnectionClosed
            } else {
                ControlError::Io(e)
            }
        })?;

        let request_len = u32::from_be_bytes(len_buf);
        if request_len > MAX_REQUEST_SIZE {
            return Err(ControlError::ProtocolDeserialization(
                bincode::error::DecodeError::OtherString(format!(
                    "request too large: {request_len} bytes"
                )),
            ));
        }

        let mut request_bytes = vec![0u8; request_len as usize];
        stream.read_exact(&mut request_bytes).await?;

        let (request, _): (Request, _) =
            bincode::serde::decode_from_slice(request_bytes.as_slice(), bincode::config::legacy())?;
        Ok(request)
    }

    /// Write a length-prefixed response to the stream
    async fn write_response(stream: &mut UnixStream, response: &Response) -> Result<()> {
        let response_bytes = bincode::serde::encode_to_vec(response, bincode::config::legacy())?;
        let response_len = u32::try_from(response_bytes.len())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        stream.write_all(&response_len.to_be_bytes()).await?;
        stream.write_all(&response_bytes).await?;
        stream.flush().await?;

        Ok(())
    }
}

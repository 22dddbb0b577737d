use std::sync::{Arc, LazyLock};

use outreach_common::{Signal, internal, logging};
use outreach_control::{ControlServer, DEFAULT_CONTROL_SOCKET};
use outreach_dispatch::{DispatchConfig, Dispatcher, HttpRecipientSource, HttpSmsGateway};
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::control_handler::OutreachControlHandler;

#[derive(Deserialize)]
pub struct Outreach {
    #[serde(default = "default_control_socket")]
    control_socket: String,
    dispatch: DispatchConfig,
}

fn default_control_socket() -> String {
    DEFAULT_CONTROL_SOCKET.to_string()
}

pub static SHUTDOWN_BROADCAST: LazyLock<broadcast::Sender<Signal>> = LazyLock::new(|| {
    let (sender, _receiver) = broadcast::channel(64);
    sender
});

async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");
        }
        _ = terminate.recv() => {
            internal!(level = INFO, "Terminate signal received, shutting down");
        }
    };

    let mut receiver = SHUTDOWN_BROADCAST.subscribe();

    SHUTDOWN_BROADCAST
        .send(Signal::Shutdown)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Interrupted, e.to_string()))?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    Ok(())
}

impl Outreach {
    /// Run the daemon: the dispatch engine and its control socket
    ///
    /// # Errors
    ///
    /// This function will return an error if the dispatch configuration is
    /// out of range, or if either HTTP client cannot be constructed.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        let source = HttpRecipientSource::new(
            self.dispatch.recipient_endpoint.clone(),
            self.dispatch.http_timeout(),
        )?;
        let transport = HttpSmsGateway::new(
            self.dispatch.gateway_endpoint.clone(),
            self.dispatch.gateway_token.clone(),
            self.dispatch.http_timeout(),
        )?;

        let dispatcher = Arc::new(Dispatcher::new(
            self.dispatch,
            Arc::new(source),
            Arc::new(transport),
        )?);

        let handler = Arc::new(OutreachControlHandler::new(Arc::clone(&dispatcher)));
        let control = ControlServer::new(self.control_socket, handler);

        internal!(level = INFO, "Controller running");

        let ret = tokio::select! {
            () = dispatcher.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                Ok(())
            }
            r = control.serve(SHUTDOWN_BROADCAST.subscribe()) => {
                r.map_err(Into::into)
            }
            r = shutdown() => {
                r
            }
        };

        internal!(level = INFO, "Shutting down...");

        ret
    }
}

//! Integration tests for control socket client/server communication
//!
//! These tests run the real server on a throwaway socket path and drive it
//! with the real client, covering framing, version negotiation, socket
//! lifecycle, and every command family.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::panic,
    clippy::unreachable
)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use outreach_control::{
    ControlClient, ControlError, ControlServer, Result,
    protocol::{
        JobCommand, JobStatusInfo, RecipientFilters, RecipientRow, Request, RequestCommand,
        Response, ResponseData, ResponsePayload, RosterCommand, SystemCommand, SystemStatus,
    },
    server::CommandHandler,
};
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Command handler backed by canned data instead of a live dispatcher
struct MockHandler {
    rows: Vec<RecipientRow>,
}

impl MockHandler {
    fn new() -> Self {
        let rows = vec![
            RecipientRow {
                id: "1".to_string(),
                name: "Anna Petrova".to_string(),
                phone: "+37120000001".to_string(),
                selected: true,
                status: "sent".to_string(),
                error: None,
                provider_message_id: Some("msg-1".to_string()),
            },
            RecipientRow {
                id: "2".to_string(),
                name: "Boris Ozols".to_string(),
                phone: "+37120000002".to_string(),
                selected: true,
                status: "failed".to_string(),
                error: Some("rate limited".to_string()),
                provider_message_id: None,
            },
        ];

        Self { rows }
    }
}

#[async_trait]
impl CommandHandler for MockHandler {
    async fn handle_request(&self, request: Request) -> Result<Response> {
        match request.command {
            RequestCommand::Job(cmd) => match cmd {
                JobCommand::Start {
                    template_id,
                    locale,
                } => Ok(Response::data(ResponseData::Message(format!(
                    "started {template_id} ({})",
                    locale.as_deref().unwrap_or("default locale")
                )))),
                JobCommand::Pause | JobCommand::Resume | JobCommand::Stop => Ok(Response::ok()),
                JobCommand::Status => {
                    Ok(Response::data(ResponseData::JobStatus(JobStatusInfo {
                        run_id: Some("01JABCDEF0123456789ABCDEFG".to_string()),
                        state: "running".to_string(),
                        current_index: 1,
                        total: 2,
                        selected_count: 2,
                        sent_count: 1,
                        failed_count: 0,
                        pending_count: 1,
                        started_at: None,
                    })))
                }
            },
            RequestCommand::Roster(cmd) => match cmd {
                RosterCommand::Fetch { filters } => {
                    Ok(Response::data(ResponseData::Message(format!(
                        "fetched {} to {}, unique phones {}",
                        filters.date_from, filters.date_to, filters.unique_phones_only
                    ))))
                }
                RosterCommand::Select { ids } => Ok(Response::data(ResponseData::Message(
                    format!("selected {}", ids.len()),
                ))),
                RosterCommand::Deselect { ids } => Ok(Response::data(ResponseData::Message(
                    format!("deselected {}", ids.len()),
                ))),
                RosterCommand::List { status_filter } => {
                    let rows = self
                        .rows
                        .iter()
                        .filter(|row| {
                            status_filter
                                .as_ref()
                                .is_none_or(|status| row.status == *status)
                        })
                        .cloned()
                        .collect();
                    Ok(Response::data(ResponseData::RecipientList(rows)))
                }
            },
            RequestCommand::System(cmd) => match cmd {
                SystemCommand::Ping => Ok(Response::ok()),
                SystemCommand::Status => {
                    Ok(Response::data(ResponseData::SystemStatus(SystemStatus {
                        version: "0.1.0".to_string(),
                        uptime_secs: 4242,
                        job_state: "idle".to_string(),
                        roster_size: self.rows.len(),
                        selected_count: self.rows.len(),
                    })))
                }
            },
        }
    }
}

/// Helper to start a test control server
async fn start_test_server(
    socket_path: &str,
    handler: Arc<dyn CommandHandler>,
) -> (
    tokio::task::JoinHandle<()>,
    broadcast::Sender<outreach_common::Signal>,
) {
    let server = ControlServer::new(socket_path, handler);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.serve(shutdown_rx).await {
            eprintln!("Server error: {e}");
        }
    });

    // Give the server time to bind
    tokio::time::sleep(Duration::from_millis(100)).await;

    (server_handle, shutdown_tx)
}

fn date(text: &str) -> chrono::NaiveDate {
    text.parse().expect("literal date")
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn ping_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let response = client.send_request(request).await.unwrap();

    assert!(matches!(response.payload, ResponsePayload::Ok));
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn system_status_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Status));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::SystemStatus(status) => {
                assert_eq!(status.version, "0.1.0");
                assert_eq!(status.uptime_secs, 4242);
                assert_eq!(status.job_state, "idle");
                assert_eq!(status.roster_size, 2);
            }
            _ => panic!("Expected SystemStatus response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn job_status_round_trips() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::Job(JobCommand::Status));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::JobStatus(info) => {
                assert_eq!(info.state, "running");
                assert_eq!(info.current_index, 1);
                assert_eq!(info.total, 2);
                assert_eq!(info.sent_count, 1);
                assert_eq!(info.pending_count, 1);
                assert_eq!(info.run_id.as_deref(), Some("01JABCDEF0123456789ABCDEFG"));
            }
            _ => panic!("Expected JobStatus response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn roster_list_round_trips_with_optional_fields() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::Roster(RosterCommand::List {
        status_filter: None,
    }));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::RecipientList(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].provider_message_id.as_deref(), Some("msg-1"));
                assert!(rows[0].error.is_none());
                assert_eq!(rows[1].error.as_deref(), Some("rate limited"));
                assert!(rows[1].provider_message_id.is_none());
            }
            _ => panic!("Expected RecipientList response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn roster_list_honors_the_status_filter() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::Roster(RosterCommand::List {
        status_filter: Some("failed".to_string()),
    }));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::RecipientList(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].id, "2");
                assert_eq!(rows[0].status, "failed");
            }
            _ => panic!("Expected RecipientList response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn roster_fetch_carries_the_filter_window_intact() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::Roster(RosterCommand::Fetch {
        filters: RecipientFilters {
            date_from: date("2026-09-01"),
            date_to: date("2026-09-30"),
            doctor_id: None,
            service_id: None,
            specialist_id: None,
            unique_phones_only: true,
        },
    }));
    let response = client.send_request(request).await.unwrap();

    match response.payload {
        ResponsePayload::Data(data) => match *data {
            ResponseData::Message(msg) => {
                assert_eq!(msg, "fetched 2026-09-01 to 2026-09-30, unique phones true");
            }
            _ => panic!("Expected Message response"),
        },
        _ => panic!("Expected Data response"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn the_server_rejects_a_future_protocol_version() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request {
        version: 99,
        token: None,
        command: RequestCommand::System(SystemCommand::Ping),
    };
    let result = client.send_request(request).await;

    match result {
        Err(ControlError::ServerError(msg)) => {
            assert!(msg.contains("unsupported protocol version 99"));
        }
        other => panic!("Expected a server error, got {other:?}"),
    }
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn connecting_to_a_missing_socket_is_an_io_error() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("nonexistent.sock");
    let socket_str = socket_path.to_str().unwrap();

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let result = client.send_request(request).await;

    assert!(result.is_err());
    assert!(matches!(result.unwrap_err(), ControlError::Io(_)));
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn check_socket_exists_tracks_the_server_lifecycle() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let client = ControlClient::new(socket_str);
    let result = client.check_socket_exists();
    assert!(matches!(
        result.unwrap_err(),
        ControlError::InvalidSocketPath(_)
    ));

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    assert!(client.check_socket_exists().is_ok());
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn graceful_shutdown_removes_the_socket_file() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    let handler = Arc::new(MockHandler::new());
    let (server_handle, shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let response = client.send_request(request).await.unwrap();
    assert!(matches!(response.payload, ResponsePayload::Ok));

    shutdown_tx.send(outreach_common::Signal::Shutdown).unwrap();

    tokio::time::timeout(Duration::from_secs(5), server_handle)
        .await
        .expect("Server did not shut down within timeout")
        .expect("Server task panicked");

    assert!(!socket_path.exists());
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn a_stale_socket_file_is_replaced_on_startup() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap();

    // A bound-then-dropped listener leaves its file behind, the same
    // footprint a crashed daemon leaves
    let stale = std::os::unix::net::UnixListener::bind(&socket_path).unwrap();
    drop(stale);
    assert!(socket_path.exists());

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(socket_str, handler).await;

    let client = ControlClient::new(socket_str);
    let request = Request::new(RequestCommand::System(SystemCommand::Ping));
    let response = client.send_request(request).await.unwrap();
    assert!(matches!(response.payload, ResponsePayload::Ok));
}

#[tokio::test]
#[cfg_attr(miri, ignore)]
async fn concurrent_requests_are_all_served() {
    let temp_dir = TempDir::new().unwrap();
    let socket_path = temp_dir.path().join("test.sock");
    let socket_str = socket_path.to_str().unwrap().to_string();

    let handler = Arc::new(MockHandler::new());
    let (_server_handle, _shutdown_tx) = start_test_server(&socket_str, handler).await;

    let mut join_handles = vec![];

    for i in 0..10 {
        let socket_str = socket_str.clone();
        let handle = tokio::spawn(async move {
            let client = ControlClient::new(&socket_str);
            let request = if i % 2 == 0 {
                Request::new(RequestCommand::System(SystemCommand::Ping))
            } else {
                Request::new(RequestCommand::Job(JobCommand::Status))
            };
            client.send_request(request).await
        });
        join_handles.push(handle);
    }

    for handle in join_handles {
        let result = handle.await.unwrap();
        assert!(result.is_ok());
    }
}

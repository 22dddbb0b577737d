//! Control protocol types and serialization

use std::fmt::{Display, Formatter};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Current protocol version
pub const PROTOCOL_VERSION: u32 = 1;

/// Render an uptime as a compact `1d 2h 3m 4s` string
fn format_uptime(mut secs: u64) -> String {
    let days = secs / 86_400;
    secs %= 86_400;
    let hours = secs / 3600;
    secs %= 3600;
    let minutes = secs / 60;
    secs %= 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {secs}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

/// Request sent to the control server (versioned wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Protocol version
    pub version: u32,
    /// Optional bearer token, reserved for deployments that gate the socket
    #[serde(default)]
    pub token: Option<String>,
    /// The actual command to execute
    pub command: RequestCommand,
}

/// Request command types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestCommand {
    /// Dispatch run control commands
    Job(JobCommand),
    /// Recipient roster commands
    Roster(RosterCommand),
    /// System management commands
    System(SystemCommand),
}

/// Dispatch run control commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobCommand {
    /// Start a run with the given template
    Start {
        /// Template id from the daemon's catalog
        template_id: String,
        /// Template locale; the catalog's default when omitted
        locale: Option<String>,
    },
    /// Pause the active run after the in-flight send settles
    Pause,
    /// Resume a paused run at its exact position
    Resume,
    /// Stop the active run, letting the in-flight send settle
    Stop,
    /// Get the active (or most recent) run's status
    Status,
}

/// Recipient roster commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RosterCommand {
    /// Replace the roster from the recipient source
    Fetch {
        /// Filter criteria forwarded to the source
        filters: RecipientFilters,
    },
    /// Include the given recipients in the next run
    Select {
        /// Recipient ids to include
        ids: Vec<String>,
    },
    /// Exclude the given recipients from the next run
    Deselect {
        /// Recipient ids to exclude
        ids: Vec<String>,
    },
    /// List recipients and their delivery status
    List {
        /// Only rows with this status (optional)
        status_filter: Option<String>,
    },
}

/// System management commands
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SystemCommand {
    /// Health check / ping
    Ping,
    /// Get daemon status and statistics
    Status,
}

/// Filter criteria for a roster fetch
///
/// Mirrors the recipient source's query surface; the daemon translates
/// these into the engine's query type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientFilters {
    /// Inclusive start of the visit-date window
    pub date_from: NaiveDate,
    /// Inclusive end of the visit-date window
    pub date_to: NaiveDate,
    /// Only visits with this doctor (optional)
    pub doctor_id: Option<String>,
    /// Only visits for this service (optional)
    pub service_id: Option<String>,
    /// Only visits with this specialist (optional)
    pub specialist_id: Option<String>,
    /// Collapse recipients sharing a phone number to the first occurrence
    pub unique_phones_only: bool,
}

/// Response from the control server (versioned wrapper)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Protocol version
    pub version: u32,
    /// The actual response payload
    pub payload: ResponsePayload,
}

/// Response payload types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponsePayload {
    /// Command succeeded
    Ok,
    /// Command succeeded with data
    Data(Box<ResponseData>),
    /// Command failed with error message
    Error(String),
}

/// Response data types
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseData {
    /// Dispatch run status
    JobStatus(JobStatusInfo),
    /// Recipient roster rows
    RecipientList(Vec<RecipientRow>),
    /// Daemon status information
    SystemStatus(SystemStatus),
    /// Simple string message
    Message(String),
}

/// Dispatch run status (for the job status command)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusInfo {
    /// Run id (ULID), absent before the first run
    pub run_id: Option<String>,
    /// Run state (idle, running, paused, completed, stopped)
    pub state: String,
    /// Position within the frozen worklist
    pub current_index: usize,
    /// Worklist length
    pub total: usize,
    /// Recipients currently selected in the roster
    pub selected_count: usize,
    /// Deliveries acknowledged by the gateway
    pub sent_count: usize,
    /// Deliveries that settled as failures
    pub failed_count: usize,
    /// Worklist entries not yet settled
    pub pending_count: usize,
    /// When the run started
    pub started_at: Option<DateTime<Utc>>,
}

impl Display for JobStatusInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("State:     {}\n", self.state))?;
        if let Some(ref run_id) = self.run_id {
            f.write_fmt(format_args!("Run:       {run_id}\n"))?;
        }
        if let Some(started_at) = self.started_at {
            f.write_fmt(format_args!(
                "Started:   {}\n",
                started_at.format("%Y-%m-%d %H:%M:%S UTC")
            ))?;
        }
        f.write_fmt(format_args!(
            "Progress:  {}/{}\n",
            self.current_index, self.total
        ))?;
        f.write_fmt(format_args!("Selected:  {}\n", self.selected_count))?;
        f.write_fmt(format_args!("Sent:      {}\n", self.sent_count))?;
        f.write_fmt(format_args!("Failed:    {}\n", self.failed_count))?;
        f.write_fmt(format_args!("Pending:   {}\n", self.pending_count))
    }
}

/// One roster row (for the list command)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipientRow {
    /// Upstream recipient id
    pub id: String,
    /// Display name
    pub name: String,
    /// Destination phone number
    pub phone: String,
    /// Whether the recipient is included in the next run
    pub selected: bool,
    /// Delivery status (idle, sending, sent, failed)
    pub status: String,
    /// Failure reason, when status is failed
    pub error: Option<String>,
    /// Gateway receipt, when status is sent
    pub provider_message_id: Option<String>,
}

impl Display for RecipientRow {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let marker = if self.selected { ' ' } else { '-' };
        f.write_fmt(format_args!(
            "{marker} {:<10} {:<9} {:<16} {}",
            self.id, self.status, self.phone, self.name
        ))?;
        if let Some(ref message_id) = self.provider_message_id {
            f.write_fmt(format_args!("  ({message_id})"))?;
        }
        if let Some(ref error) = self.error {
            f.write_fmt(format_args!("  [{error}]"))?;
        }
        Ok(())
    }
}

/// Daemon status information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Daemon version
    pub version: String,
    /// Uptime in seconds
    pub uptime_secs: u64,
    /// Current run state
    pub job_state: String,
    /// Number of recipients in the roster
    pub roster_size: usize,
    /// Number of recipients currently selected
    pub selected_count: usize,
}

impl Display for SystemStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!("Version:   {}\n", self.version))?;
        f.write_fmt(format_args!(
            "Uptime:    {}\n",
            format_uptime(self.uptime_secs)
        ))?;
        f.write_fmt(format_args!("Job:       {}\n", self.job_state))?;
        f.write_fmt(format_args!(
            "Roster:    {} recipients, {} selected\n",
            self.roster_size, self.selected_count
        ))
    }
}

impl Request {
    /// Create a new request with the current protocol version
    #[must_use]
    pub const fn new(command: RequestCommand) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            token: None,
            command,
        }
    }

    /// Create a new request carrying a bearer token
    #[must_use]
    pub fn with_token(command: RequestCommand, token: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            token: Some(token.into()),
            command,
        }
    }

    /// Check if the request version is compatible with the current version
    #[must_use]
    pub const fn is_version_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

impl Response {
    /// Create an error response
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Error(message.into()),
        }
    }

    /// Create a success response with no data
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Ok,
        }
    }

    /// Create a response with data
    #[must_use]
    pub fn data(data: ResponseData) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            payload: ResponsePayload::Data(Box::new(data)),
        }
    }

    /// Check if the response indicates success (not an error)
    #[must_use]
    pub const fn is_success(&self) -> bool {
        !matches!(self.payload, ResponsePayload::Error(_))
    }

    /// Check if the response version is compatible with the current version
    #[must_use]
    pub const fn is_version_compatible(&self) -> bool {
        self.version == PROTOCOL_VERSION
    }
}

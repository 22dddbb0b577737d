//! Recipient records and their delivery lifecycle

use serde::{Deserialize, Serialize};

/// Where a recipient stands within the current (or most recent) run
///
/// The only legal progression during a run is Idle → Sending → Sent or
/// Failed. Sent is sticky: later runs exclude the recipient instead of
/// resetting it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecipientStatus {
    #[default]
    Idle,
    Sending,
    Sent,
    Failed,
}

impl RecipientStatus {
    /// Whether this recipient has reached a terminal status for the run
    #[must_use]
    pub const fn is_settled(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }
}

impl std::fmt::Display for RecipientStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        })
    }
}

/// One addressable target, eligible for at most one message per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Upstream identifier, unique within a roster
    pub id: String,
    /// Display name, also the source of the name placeholders
    pub name: String,
    /// Destination address
    pub phone: String,
    /// Whether the operator wants this recipient in the next run
    pub selected: bool,
    pub status: RecipientStatus,
    /// Human-readable reason when `status` is `Failed`
    pub error: Option<String>,
    /// Gateway receipt for a successful send
    pub provider_message_id: Option<String>,
}

impl Recipient {
    /// A freshly fetched recipient: selected, nothing attempted yet
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            selected: true,
            status: RecipientStatus::Idle,
            error: None,
            provider_message_id: None,
        }
    }

    /// Eligible for the next worklist: wanted by the operator and not
    /// already sent
    #[must_use]
    pub const fn is_eligible(&self) -> bool {
        self.selected && !matches!(self.status, RecipientStatus::Sent)
    }
}

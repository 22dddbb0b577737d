//! Derived status read model
//!
//! [`DispatchSnapshot`] is what observers see of a run. The dispatcher
//! publishes one on its watch channel only at commit points, so a snapshot
//! never shows the cursor past a recipient whose terminal status has not
//! been recorded yet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{DispatchJob, JobState};

/// Point-in-time view of the dispatcher and its current (or last) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSnapshot {
    pub run_id: Option<String>,
    pub state: JobState,
    pub current_index: usize,
    pub total: usize,
    /// Recipients currently selected on the roster, not the worklist size
    pub selected_count: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    pub pending_count: usize,
    pub started_at: Option<DateTime<Utc>>,
}

impl DispatchSnapshot {
    /// View of a dispatcher with no run yet
    #[must_use]
    pub fn idle(selected_count: usize) -> Self {
        Self {
            selected_count,
            ..Self::default()
        }
    }

    /// View of one run plus the roster's live selection count
    #[must_use]
    pub fn of_job(job: &DispatchJob, selected_count: usize) -> Self {
        Self {
            run_id: Some(job.run_id().to_string()),
            state: job.state(),
            current_index: job.current_index(),
            total: job.total(),
            selected_count,
            sent_count: job.sent(),
            failed_count: job.failed(),
            pending_count: job.pending(),
            started_at: Some(job.started_at()),
        }
    }
}

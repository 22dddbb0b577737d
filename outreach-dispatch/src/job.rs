//! Dispatch job lifecycle
//!
//! - [`JobState`] is the run's finite state machine
//! - [`JobControl`] enumerates the inputs a run reacts to
//! - [`DispatchJob`] is the single-writer record of one run: the frozen
//!   worklist, the cursor, and the outcome counters

use chrono::{DateTime, Utc};
use outreach_common::traits::fsm::FiniteStateMachine;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{recipient::Recipient, transport::DeliveryResult};

/// Lifecycle of a dispatch run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Stopped,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        })
    }
}

/// Control inputs accepted by the run state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobControl {
    Start,
    Pause,
    Resume,
    Finish,
    Stop,
}

impl FiniteStateMachine for JobState {
    type Input = JobControl;
    type Context = ();

    fn transition(self, input: Self::Input, _: &mut Self::Context) -> Self {
        match (self, input) {
            (Self::Idle, JobControl::Start)
            | (Self::Paused, JobControl::Resume) => Self::Running,
            (Self::Running, JobControl::Pause) => Self::Paused,
            (Self::Running | Self::Paused, JobControl::Finish) => Self::Completed,
            (Self::Running | Self::Paused, JobControl::Stop) => Self::Stopped,
            (state, _) => state,
        }
    }
}

/// One run's frozen worklist and progress
///
/// The worklist is fixed at construction; roster changes made while the run
/// is underway never reach it. Counters and the cursor have exactly one
/// writer, the dispatch loop.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    run_id: Ulid,
    state: JobState,
    worklist: Vec<Recipient>,
    current_index: usize,
    sent: usize,
    failed: usize,
    started_at: DateTime<Utc>,
}

impl DispatchJob {
    #[must_use]
    pub fn new(worklist: Vec<Recipient>) -> Self {
        Self {
            run_id: Ulid::new(),
            state: JobState::default(),
            worklist,
            current_index: 0,
            sent: 0,
            failed: 0,
            started_at: Utc::now(),
        }
    }

    /// Feed one control input through the state machine
    pub fn control(&mut self, input: JobControl) -> JobState {
        self.state = self.state.transition(input, &mut ());
        self.state
    }

    #[must_use]
    pub const fn run_id(&self) -> Ulid {
        self.run_id
    }

    #[must_use]
    pub const fn state(&self) -> JobState {
        self.state
    }

    #[must_use]
    pub const fn current_index(&self) -> usize {
        self.current_index
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.worklist.len()
    }

    #[must_use]
    pub const fn sent(&self) -> usize {
        self.sent
    }

    #[must_use]
    pub const fn failed(&self) -> usize {
        self.failed
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.total() - self.sent - self.failed
    }

    #[must_use]
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    #[must_use]
    pub fn worklist(&self) -> &[Recipient] {
        &self.worklist
    }

    /// The recipient the cursor points at, if the run still has one
    #[must_use]
    pub fn current(&self) -> Option<&Recipient> {
        self.worklist.get(self.current_index)
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.current_index >= self.worklist.len()
    }

    /// Commit one settled outcome and advance the cursor
    pub fn record(&mut self, result: &DeliveryResult) {
        if result.success {
            self.sent += 1;
        } else {
            self.failed += 1;
        }

        self.current_index += 1;
    }

    /// Ids the cursor has not settled yet, in worklist order
    #[must_use]
    pub fn unsettled_ids(&self) -> Vec<String> {
        self.worklist[self.current_index..]
            .iter()
            .map(|recipient| recipient.id.clone())
            .collect()
    }
}

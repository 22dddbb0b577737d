//! The dispatch controller
//!
//! Owns the roster, the active [`DispatchJob`], and the pacing loop. One
//! tokio task drives a run; everything else observes it through snapshot
//! subscriptions and issues control inputs through the job's state machine.
//!
//! Sequencing is a contract here, not a runtime accident: a recipient's
//! outcome is always recorded (roster status first, then job counters and
//! cursor) before the next snapshot is published, and the next delivery
//! never starts before the full inter-send interval has elapsed.

use std::{sync::Arc, time::Duration};

use outreach_common::{Signal, internal};
use parking_lot::RwLock;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};

use crate::{
    config::DispatchConfig,
    error::{DispatchError, RenderError, ValidationError},
    job::{DispatchJob, JobControl, JobState},
    recipient::Recipient,
    roster::Roster,
    selector::{RecipientQuery, RecipientSource},
    template::MessageTemplate,
    tracker::DispatchSnapshot,
    transport::{DeliveryResult, SmsTransport},
    worker::DeliveryWorker,
};

/// Sequential bulk-message dispatcher
///
/// Control methods are safe to call from any task at any time; they are
/// no-ops whenever the run's state machine has no transition for them.
/// `start` is guarded so concurrent attempts can never spawn two loops over
/// the same worklist.
pub struct Dispatcher {
    config: DispatchConfig,
    roster: Arc<Roster>,
    source: Arc<dyn RecipientSource>,
    worker: Arc<DeliveryWorker>,
    job: Arc<RwLock<Option<DispatchJob>>>,
    snapshots: Arc<watch::Sender<DispatchSnapshot>>,
    runner: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Dispatcher {
    /// # Errors
    ///
    /// Returns a `ConfigError` when the pacing or timeout configuration is
    /// out of range.
    pub fn new(
        config: DispatchConfig,
        source: Arc<dyn RecipientSource>,
        transport: Arc<dyn SmsTransport>,
    ) -> Result<Self, DispatchError> {
        config.validate()?;

        let worker = Arc::new(DeliveryWorker::new(transport, config.send_timeout()));
        let (snapshots, _) = watch::channel(DispatchSnapshot::default());

        Ok(Self {
            config,
            roster: Arc::new(Roster::new()),
            source,
            worker,
            job: Arc::new(RwLock::new(None)),
            snapshots: Arc::new(snapshots),
            runner: tokio::sync::Mutex::new(None),
        })
    }

    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Replace the roster with freshly fetched candidates
    ///
    /// A run already underway keeps its frozen worklist; the new roster
    /// only affects later runs.
    ///
    /// # Errors
    ///
    /// Returns a `FetchError` when the recipient source fails; the existing
    /// roster is left untouched.
    pub async fn fetch_recipients(&self, query: &RecipientQuery) -> Result<usize, DispatchError> {
        let recipients = self.source.fetch(query).await?;
        let count = recipients.len();

        self.roster.replace_all(recipients);
        self.publish();
        internal!(level = INFO, "roster replaced, {count} candidates");

        Ok(count)
    }

    /// Toggle roster inclusion, returning how many entries changed
    pub fn set_selected(&self, ids: &[String], selected: bool) -> usize {
        let changed = self.roster.set_selected(ids, selected);
        if changed > 0 {
            self.publish();
        }

        changed
    }

    #[must_use]
    pub fn recipients(&self) -> Vec<Recipient> {
        self.roster.recipients()
    }

    #[must_use]
    pub fn recipient(&self, id: &str) -> Option<Recipient> {
        self.roster.recipient(id)
    }

    #[must_use]
    pub fn state(&self) -> JobState {
        self.job.read().as_ref().map_or(JobState::Idle, DispatchJob::state)
    }

    #[must_use]
    pub fn snapshot(&self) -> DispatchSnapshot {
        snapshot_of(&self.job, &self.roster)
    }

    /// Subscribe to snapshots; one is published at every commit point
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<DispatchSnapshot> {
        self.snapshots.subscribe()
    }

    /// Start a run over the currently eligible recipients
    ///
    /// The worklist is frozen here: selected recipients not already sent,
    /// in roster order. Calling this while a run is underway (running or
    /// paused) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` when the template cannot be resolved or
    /// nobody is eligible; no state changes in that case.
    pub async fn start(
        &self,
        template_id: &str,
        locale: Option<&str>,
    ) -> Result<(), DispatchError> {
        let mut runner = self.runner.lock().await;

        if matches!(self.state(), JobState::Running | JobState::Paused) {
            internal!(level = DEBUG, "start ignored, a run is already underway");
            return Ok(());
        }

        // reap the previous run's task before installing a new one
        if let Some(handle) = runner.take() {
            if let Err(error) = handle.await {
                outreach_common::tracing::warn!("previous run task ended abnormally: {error}");
            }
        }

        let template = self.config.templates.resolve(template_id, locale)?;

        let worklist = self.roster.eligible();
        if worklist.is_empty() {
            return Err(ValidationError::NoEligibleRecipients.into());
        }

        let mut job = DispatchJob::new(worklist);
        job.control(JobControl::Start);
        let run_id = job.run_id();
        let total = job.total();
        *self.job.write() = Some(job);
        self.publish();

        internal!(
            level = INFO,
            "run {run_id} started, {total} recipients, template {template_id}, one send every {}s",
            self.config.interval_seconds
        );

        let task = JobRunner {
            roster: Arc::clone(&self.roster),
            worker: Arc::clone(&self.worker),
            job: Arc::clone(&self.job),
            snapshots: Arc::clone(&self.snapshots),
            template,
            interval: self.config.interval(),
            max_message_length: self.config.max_message_length,
        };
        *runner = Some(tokio::spawn(task.run(self.snapshots.subscribe())));

        Ok(())
    }

    /// Pause after the in-flight delivery, if any, has settled
    ///
    /// The pending inter-send timer is abandoned; resuming starts a fresh
    /// full interval.
    pub fn pause(&self) {
        self.transition(JobControl::Pause);
    }

    /// Resume a paused run at the exact position it paused at
    pub fn resume(&self) {
        self.transition(JobControl::Resume);
    }

    /// Stop the run and wait for it to wind down
    ///
    /// An in-flight delivery is not torn down mid-send; its outcome is
    /// still recorded as the run's last effect, after which any recipient
    /// left marked as sending is normalized back to idle.
    pub async fn stop(&self) {
        if !self.transition(JobControl::Stop) {
            return;
        }

        let mut runner = self.runner.lock().await;
        if let Some(handle) = runner.take() {
            if let Err(error) = handle.await {
                outreach_common::tracing::warn!("run task ended abnormally: {error}");
            }
        }
    }

    /// Block until shutdown is signalled, then stop any active run
    pub async fn serve(&self, mut shutdown: broadcast::Receiver<Signal>) {
        loop {
            match shutdown.recv().await {
                Ok(Signal::Shutdown | Signal::Finalised) => {
                    internal!(level = INFO, "dispatcher received shutdown signal");
                    self.stop().await;
                    break;
                }
                Err(error) => {
                    outreach_common::tracing::error!(
                        "dispatcher shutdown channel error: {error}"
                    );
                    break;
                }
            }
        }
    }

    /// Feed one input through the job's state machine
    ///
    /// Returns whether the state actually changed. The snapshot publish
    /// happens after the job lock is released.
    fn transition(&self, input: JobControl) -> bool {
        let mut changed = false;

        {
            let mut slot = self.job.write();
            if let Some(job) = slot.as_mut() {
                let before = job.state();
                let after = job.control(input);
                changed = before != after;

                if changed {
                    internal!(level = INFO, "run {} {before} -> {after}", job.run_id());
                }
            }
        }

        if changed {
            self.publish();
        }

        changed
    }

    fn publish(&self) {
        publish_to(&self.snapshots, &self.job, &self.roster);
    }
}

fn snapshot_of(job: &RwLock<Option<DispatchJob>>, roster: &Roster) -> DispatchSnapshot {
    let selected = roster.selected_count();

    job.read()
        .as_ref()
        .map_or_else(|| DispatchSnapshot::idle(selected), |job| {
            DispatchSnapshot::of_job(job, selected)
        })
}

fn publish_to(
    snapshots: &watch::Sender<DispatchSnapshot>,
    job: &RwLock<Option<DispatchJob>>,
    roster: &Roster,
) {
    let next = snapshot_of(job, roster);

    snapshots.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

/// The task driving one run to completion
///
/// Exactly one exists per run; it is the only writer of job progress. Its
/// suspension points are the delivery await and the interval timer, and the
/// job state is re-checked after each of them.
struct JobRunner {
    roster: Arc<Roster>,
    worker: Arc<DeliveryWorker>,
    job: Arc<RwLock<Option<DispatchJob>>>,
    snapshots: Arc<watch::Sender<DispatchSnapshot>>,
    template: MessageTemplate,
    interval: Duration,
    max_message_length: usize,
}

impl JobRunner {
    async fn run(self, mut wakeups: watch::Receiver<DispatchSnapshot>) {
        loop {
            match self.state() {
                JobState::Running => {}
                JobState::Paused => {
                    if wakeups.changed().await.is_err() {
                        return;
                    }
                    continue;
                }
                JobState::Stopped => {
                    self.halt();
                    return;
                }
                JobState::Idle | JobState::Completed => return,
            }

            if self.exhausted() {
                self.finish();
                return;
            }

            self.dispatch_next().await;

            // a command may have landed while the delivery was in flight
            match self.state() {
                JobState::Running | JobState::Paused => {}
                JobState::Stopped => {
                    self.halt();
                    return;
                }
                JobState::Idle | JobState::Completed => return,
            }

            if self.exhausted() {
                self.finish();
                return;
            }

            if !self.pace(&mut wakeups).await {
                return;
            }
        }
    }

    /// Deliver to the recipient under the cursor and commit the outcome
    ///
    /// Commit order: roster status first, then job counters and cursor,
    /// then one snapshot publish. Observers can never see the cursor past
    /// a recipient whose terminal status is missing.
    async fn dispatch_next(&self) {
        let Some(recipient) = self.current_recipient() else {
            return;
        };

        self.roster.mark_sending(&recipient.id);

        let result = match self.render_checked(&recipient) {
            Ok(text) => self.worker.send(&recipient, &text).await,
            Err(error) => {
                outreach_common::tracing::warn!(
                    "message for {} not sent: {error}",
                    recipient.id
                );
                DeliveryResult::failed(error.to_string())
            }
        };

        self.roster.record_outcome(&recipient.id, &result);

        {
            let mut slot = self.job.write();
            if let Some(job) = slot.as_mut() {
                job.record(&result);
            }
        }

        self.publish();
    }

    /// Wait out the inter-send interval, observing commands as they land
    ///
    /// A pause parks here with the timer abandoned; the matching resume
    /// restarts a full interval. Returns `false` once the dispatcher side
    /// has gone away.
    async fn pace(&self, wakeups: &mut watch::Receiver<DispatchSnapshot>) -> bool {
        // our own publishes up to here are not wake-ups
        drop(wakeups.borrow_and_update());

        let sleep = tokio::time::sleep(self.interval);
        tokio::pin!(sleep);

        loop {
            match self.state() {
                JobState::Running => {}
                JobState::Paused => {
                    if wakeups.changed().await.is_err() {
                        return false;
                    }
                    sleep
                        .as_mut()
                        .reset(tokio::time::Instant::now() + self.interval);
                    continue;
                }
                JobState::Idle | JobState::Completed | JobState::Stopped => return true,
            }

            tokio::select! {
                () = &mut sleep => return true,
                changed = wakeups.changed() => {
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }

    fn render_checked(&self, recipient: &Recipient) -> Result<String, RenderError> {
        let text = self.template.render(recipient);
        let length = text.chars().count();

        if length > self.max_message_length {
            return Err(RenderError::MessageTooLong {
                length,
                limit: self.max_message_length,
            });
        }

        Ok(text)
    }

    /// Exit path for an exhausted worklist
    fn finish(&self) {
        let summary = {
            let mut slot = self.job.write();
            slot.as_mut().map(|job| {
                job.control(JobControl::Finish);
                (job.run_id(), job.sent(), job.failed())
            })
        };
        let Some((run_id, sent, failed)) = summary else {
            return;
        };

        self.publish();
        internal!(level = INFO, "run {run_id} completed, {sent} sent, {failed} failed");
    }

    /// Exit path for a stopped run: normalize stragglers, then report
    fn halt(&self) {
        let summary = {
            let slot = self.job.read();
            slot.as_ref()
                .map(|job| (job.run_id(), job.sent(), job.failed(), job.unsettled_ids()))
        };
        let Some((run_id, sent, failed, unsettled)) = summary else {
            return;
        };

        let reset = self.roster.reset_unsettled(&unsettled);
        if reset > 0 {
            outreach_common::tracing::debug!("{reset} in-flight markers reset to idle");
        }

        self.publish();
        internal!(level = INFO, "run {run_id} stopped, {sent} sent, {failed} failed");
    }

    fn state(&self) -> JobState {
        self.job.read().as_ref().map_or(JobState::Idle, DispatchJob::state)
    }

    fn exhausted(&self) -> bool {
        self.job.read().as_ref().is_none_or(DispatchJob::is_exhausted)
    }

    fn current_recipient(&self) -> Option<Recipient> {
        self.job.read().as_ref().and_then(|job| job.current().cloned())
    }

    fn publish(&self) {
        publish_to(&self.snapshots, &self.job, &self.roster);
    }
}

//! Shared scaffolding for dispatch engine integration tests
//!
//! Provides an in-memory recipient source, a scriptable transport that
//! records call order and concurrency, and a harness that wires both into
//! a [`Dispatcher`]. All tests run under tokio's paused clock, so scripted
//! delays are virtual time.

use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use outreach_dispatch::{
    DeliveryError, DispatchConfig, DispatchSnapshot, Dispatcher, FetchError, Recipient,
    RecipientQuery, RecipientSource, SendReceipt, SmsTransport, TemplateCatalog,
    retain_first_phone_occurrence,
};
use parking_lot::Mutex;
use tokio::sync::watch;

/// Upper bound on any virtual-time wait; far beyond every scripted delay
pub const WAIT_CAP: Duration = Duration::from_secs(86_400);

/// Recipient source returning scripted batches instead of hitting HTTP
///
/// The last batch repeats once the earlier ones are consumed, and the
/// dedup flag is honored the way the real adapter honors it.
pub struct ScriptedSource {
    batches: Mutex<VecDeque<Vec<Recipient>>>,
}

impl ScriptedSource {
    pub fn new(recipients: Vec<Recipient>) -> Self {
        Self::of_batches(vec![recipients])
    }

    pub fn of_batches(batches: Vec<Vec<Recipient>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
        }
    }
}

#[async_trait]
impl RecipientSource for ScriptedSource {
    async fn fetch(&self, query: &RecipientQuery) -> Result<Vec<Recipient>, FetchError> {
        let batch = {
            let mut batches = self.batches.lock();
            if batches.len() > 1 {
                batches.pop_front().unwrap_or_default()
            } else {
                batches.front().cloned().unwrap_or_default()
            }
        };

        Ok(if query.unique_phones_only {
            retain_first_phone_occurrence(batch)
        } else {
            batch
        })
    }
}

/// What the mock transport should do for one phone number
#[derive(Debug, Clone, Copy)]
pub enum SendScript {
    /// Ack immediately with a generated provider id
    Deliver,
    /// Ack after this many virtual seconds
    DeliverSlow(u64),
    /// Refuse with this reason
    Reject(&'static str),
    /// Never ack; the caller's send timeout has to fire
    Hang,
}

/// Transport double recording call order and concurrency
pub struct MockTransport {
    scripts: Mutex<HashMap<String, SendScript>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    serial: AtomicUsize,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            serial: AtomicUsize::new(0),
        })
    }

    pub fn script(&self, phone: &str, script: SendScript) {
        self.scripts.lock().insert(phone.to_string(), script);
    }

    /// Phone numbers in the order sends were issued
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Highest number of sends ever outstanding at once
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight gauge even when the send future is dropped
/// because the caller's timeout won
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl SmsTransport for MockTransport {
    async fn send(&self, to: &str, _text: &str) -> Result<SendReceipt, DeliveryError> {
        let outstanding = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(outstanding, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        self.calls.lock().push(to.to_string());

        let script = self
            .scripts
            .lock()
            .get(to)
            .copied()
            .unwrap_or(SendScript::Deliver);

        match script {
            SendScript::Deliver => Ok(self.receipt()),
            SendScript::DeliverSlow(seconds) => {
                tokio::time::sleep(Duration::from_secs(seconds)).await;
                Ok(self.receipt())
            }
            SendScript::Reject(reason) => Err(DeliveryError::Rejected(reason.to_string())),
            SendScript::Hang => {
                tokio::time::sleep(WAIT_CAP * 2).await;
                Ok(SendReceipt::default())
            }
        }
    }
}

impl MockTransport {
    fn receipt(&self) -> SendReceipt {
        SendReceipt {
            message_id: Some(format!("msg-{}", self.serial.fetch_add(1, Ordering::SeqCst))),
        }
    }
}

pub struct Harness {
    pub dispatcher: Arc<Dispatcher>,
    pub transport: Arc<MockTransport>,
}

/// Recipients "1".."=count" with distinct phones, in order
pub fn recipients(count: usize) -> Vec<Recipient> {
    (1..=count)
        .map(|index| {
            Recipient::new(
                index.to_string(),
                format!("Patient {index}"),
                phone(index),
            )
        })
        .collect()
}

pub fn phone(index: usize) -> String {
    format!("+3712000{index:04}")
}

pub fn query() -> RecipientQuery {
    RecipientQuery::new(date("2026-09-01"), date("2026-09-30"))
}

pub fn date(text: &str) -> chrono::NaiveDate {
    text.parse().expect("literal date")
}

/// Config with a `visit_reminder` template and everything else defaulted
pub fn standard_config(interval_seconds: u64) -> DispatchConfig {
    DispatchConfig {
        interval_seconds,
        templates: TemplateCatalog {
            templates: HashMap::from([(
                "visit_reminder".to_string(),
                HashMap::from([(
                    "en".to_string(),
                    "Dear {name}, your visit is booked.".to_string(),
                )]),
            )]),
            ..TemplateCatalog::default()
        },
        ..DispatchConfig::default()
    }
}

/// Dispatcher wired to a scripted source, roster already fetched
pub async fn harness(roster: Vec<Recipient>, interval_seconds: u64) -> Harness {
    harness_with(standard_config(interval_seconds), ScriptedSource::new(roster)).await
}

pub async fn harness_with(config: DispatchConfig, source: ScriptedSource) -> Harness {
    let transport = MockTransport::new();
    let dispatcher = Arc::new(
        Dispatcher::new(config, Arc::new(source), transport.clone())
            .expect("valid test config"),
    );

    dispatcher
        .fetch_recipients(&query())
        .await
        .expect("scripted fetch");

    Harness {
        dispatcher,
        transport,
    }
}

/// Wait, in virtual time, until a snapshot satisfies the predicate
pub async fn wait_for(
    snapshots: &mut watch::Receiver<DispatchSnapshot>,
    what: &str,
    predicate: impl Fn(&DispatchSnapshot) -> bool,
) -> DispatchSnapshot {
    let waited = tokio::time::timeout(WAIT_CAP, async {
        loop {
            {
                let snapshot = snapshots.borrow_and_update();
                if predicate(&snapshot) {
                    return snapshot.clone();
                }
            }

            snapshots
                .changed()
                .await
                .expect("dispatcher dropped while waiting");
        }
    })
    .await;

    waited.unwrap_or_else(|_| panic!("timed out waiting for {what}"))
}

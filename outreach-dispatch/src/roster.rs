//! Live registry of fetched recipients
//!
//! The roster is replaced wholesale on a successful fetch and mutated in
//! place by selection toggles and by the dispatch loop's status writes.
//! Worklists are snapshots taken from it, so replacing the roster mid-run
//! never disturbs a job already driving.

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::{
    recipient::{Recipient, RecipientStatus},
    transport::DeliveryResult,
};

#[derive(Debug, Default)]
pub struct Roster {
    entries: DashMap<String, Recipient>,
    /// Display order of `entries`, as returned by the source
    order: RwLock<Vec<String>>,
}

impl Roster {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a freshly fetched recipient list, discarding the previous one
    pub fn replace_all(&self, recipients: Vec<Recipient>) {
        let mut order = self.order.write();
        self.entries.clear();
        order.clear();
        for recipient in recipients {
            order.push(recipient.id.clone());
            self.entries.insert(recipient.id.clone(), recipient);
        }
    }

    /// All recipients, in display order
    #[must_use]
    pub fn recipients(&self) -> Vec<Recipient> {
        let order = self.order.read();
        order
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| entry.clone()))
            .collect()
    }

    #[must_use]
    pub fn recipient(&self, id: &str) -> Option<Recipient> {
        self.entries.get(id).map(|entry| entry.clone())
    }

    /// Toggle inclusion for the given ids, returning how many were found
    pub fn set_selected(&self, ids: &[String], selected: bool) -> usize {
        let mut updated = 0;
        for id in ids {
            if let Some(mut entry) = self.entries.get_mut(id) {
                entry.selected = selected;
                updated += 1;
            }
        }
        updated
    }

    /// Snapshot of the recipients a new run would target, in display order
    #[must_use]
    pub fn eligible(&self) -> Vec<Recipient> {
        self.recipients()
            .into_iter()
            .filter(Recipient::is_eligible)
            .collect()
    }

    pub fn mark_sending(&self, id: &str) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            entry.status = RecipientStatus::Sending;
            entry.error = None;
        }
    }

    /// Record a settled delivery. Unknown ids are ignored: the roster may
    /// have been replaced while the worklist entry was in flight.
    pub fn record_outcome(&self, id: &str, result: &DeliveryResult) {
        if let Some(mut entry) = self.entries.get_mut(id) {
            if result.success {
                entry.status = RecipientStatus::Sent;
                entry.error = None;
                entry.provider_message_id = result.provider_message_id.clone();
            } else {
                entry.status = RecipientStatus::Failed;
                entry.error = result.error.clone();
            }
        }
    }

    /// Normalize recipients a halted run left mid-flight, returning how many
    pub fn reset_unsettled(&self, ids: &[String]) -> usize {
        let mut reset = 0;
        for id in ids {
            if let Some(mut entry) = self.entries.get_mut(id)
                && entry.status == RecipientStatus::Sending
            {
                entry.status = RecipientStatus::Idle;
                reset += 1;
            }
        }
        reset
    }

    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.selected).count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

use std::collections::HashSet;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;
use kairos_core::AvailabilitySlot;
use crate::models::Change;
use crate::pending::{PendingChanges, PendingChangesState};

/// Single owner of the pending-changes store.
///
/// Readers either pull the latest [`PendingChangesState`] with `snapshot()` or
/// subscribe and get notified after each mutation.
pub struct CalendarState {
    store: PendingChanges,
    tx: watch::Sender<PendingChangesState>,
}

impl CalendarState {
    pub fn new(original_state: Vec<AvailabilitySlot>) -> Self {
        let store = PendingChanges::new(original_state);
        let (tx, _) = watch::channel(store.snapshot());
        Self { store, tx }
    }

    pub fn store(&self) -> &PendingChanges {
        &self.store
    }

    pub fn snapshot(&self) -> PendingChangesState {
        self.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PendingChangesState> {
        self.tx.subscribe()
    }

    pub fn changes_stream(&self) -> WatchStream<PendingChangesState> {
        WatchStream::new(self.tx.subscribe())
    }

    /// Run `f` against the store and publish the resulting state.
    pub fn mutate<F, R>(&mut self, f: F) -> R
    where
        F: FnOnce(&mut PendingChanges) -> R,
    {
        let result = f(&mut self.store);
        self.publish();
        result
    }

    pub fn initialize(&mut self, original_state: Vec<AvailabilitySlot>) {
        self.mutate(|store| store.initialize(original_state));
    }

    pub fn add_change(&mut self, change: Change) {
        self.mutate(|store| store.add_change(change));
    }

    pub fn remove_change(&mut self, change_id: Uuid) -> Option<Change> {
        self.mutate(|store| store.remove_change(change_id))
    }

    pub fn restore_state(&mut self, changes: Vec<Change>) {
        self.mutate(|store| store.restore_state(changes));
    }

    pub fn save_changes(&mut self) {
        self.mutate(|store| store.save_changes());
    }

    pub fn commit_succeeded(&mut self, failed: &HashSet<Uuid>) {
        self.mutate(|store| store.commit_succeeded(failed));
    }

    pub fn discard_changes(&mut self) {
        self.mutate(|store| store.discard_changes());
    }

    fn publish(&self) {
        self.tx.send_replace(self.store.snapshot());
    }
}

use std::collections::HashSet;
use serde::Serialize;
use uuid::Uuid;
use kairos_core::AvailabilitySlot;
use crate::models::{Change, ChangeType};

/// Committed slots plus the ordered list of edits staged on top of them.
#[derive(Debug, Clone, Default)]
pub struct PendingChanges {
    original_state: Vec<AvailabilitySlot>,
    changes: Vec<Change>,
}

/// Read-only view published to observers after every mutation.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingChangesState {
    pub original_state: Vec<AvailabilitySlot>,
    pub changes: Vec<Change>,
    pub current_state: Vec<AvailabilitySlot>,
    pub has_unsaved_changes: bool,
}

impl PendingChanges {
    pub fn new(original_state: Vec<AvailabilitySlot>) -> Self {
        Self {
            original_state,
            changes: Vec::new(),
        }
    }

    /// Replace the committed snapshot and drop every staged change.
    pub fn initialize(&mut self, original_state: Vec<AvailabilitySlot>) {
        self.original_state = original_state;
        self.changes.clear();
    }

    /// Stage a change. Several changes to one slot accumulate and fold in order.
    pub fn add_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn remove_change(&mut self, change_id: Uuid) -> Option<Change> {
        let index = self.changes.iter().position(|c| c.id == change_id)?;
        Some(self.changes.remove(index))
    }

    pub fn contains_change(&self, change_id: Uuid) -> bool {
        self.changes.iter().any(|c| c.id == change_id)
    }

    /// Replace the change list wholesale, leaving the committed snapshot alone.
    pub fn restore_state(&mut self, changes: Vec<Change>) {
        self.changes = changes;
    }

    /// Promote the folded state to the new committed snapshot.
    pub fn save_changes(&mut self) {
        self.original_state = self.current_state();
        self.changes.clear();
    }

    /// Promote every change except `failed` into the committed snapshot.
    /// The failed changes stay staged in their original order.
    pub fn commit_succeeded(&mut self, failed: &HashSet<Uuid>) {
        let (kept, committed): (Vec<Change>, Vec<Change>) =
            self.changes.drain(..).partition(|c| failed.contains(&c.id));
        self.original_state = fold_changes(&self.original_state, &committed);
        self.changes = kept;
    }

    pub fn discard_changes(&mut self) {
        self.changes.clear();
    }

    pub fn current_state(&self) -> Vec<AvailabilitySlot> {
        fold_changes(&self.original_state, &self.changes)
    }

    /// Look a slot up in the folded state.
    pub fn find_current(&self, slot_id: Uuid) -> Option<AvailabilitySlot> {
        self.current_state().into_iter().find(|s| s.id == slot_id)
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn original_state(&self) -> &[AvailabilitySlot] {
        &self.original_state
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn has_unsaved_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn snapshot(&self) -> PendingChangesState {
        PendingChangesState {
            original_state: self.original_state.clone(),
            changes: self.changes.clone(),
            current_state: self.current_state(),
            has_unsaved_changes: self.has_unsaved_changes(),
        }
    }
}

/// Apply `changes` in order on top of `original`.
///
/// Replacements and deletes that reference a slot missing from the running
/// fold are skipped.
pub fn fold_changes(original: &[AvailabilitySlot], changes: &[Change]) -> Vec<AvailabilitySlot> {
    let mut state = original.to_vec();

    for change in changes {
        match change.change_type {
            ChangeType::Create => {
                if let Some(entity) = &change.entity {
                    state.push(entity.clone());
                }
            }
            ChangeType::Update | ChangeType::Move | ChangeType::Resize => {
                let (Some(target), Some(entity)) = (change.target_id(), &change.entity) else {
                    continue;
                };
                if let Some(slot) = state.iter_mut().find(|s| s.id == target) {
                    *slot = entity.clone();
                }
            }
            ChangeType::Delete => {
                if let Some(target) = change.entity_id {
                    state.retain(|s| s.id != target);
                }
            }
        }
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn slot(hour: u32) -> AvailabilitySlot {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap();
        AvailabilitySlot::new("provider-1", start, start + Duration::hours(1))
    }

    #[test]
    fn test_fold_preserves_order() {
        let a = slot(9);
        let b = slot(11);
        let c = slot(14);
        let mut store = PendingChanges::new(vec![a.clone(), b.clone()]);

        store.add_change(Change::delete(a.clone()));
        let b_longer = b.with_times(b.start_time, b.end_time + Duration::minutes(30));
        store.add_change(Change::update(b.clone(), b_longer.clone()));
        store.add_change(Change::create(c.clone()));

        assert_eq!(store.current_state(), vec![b_longer, c]);
        assert!(store.has_unsaved_changes());
        // The committed snapshot is untouched until save
        assert_eq!(store.original_state(), &[a, b]);
    }

    #[test]
    fn test_multiple_changes_to_same_slot_accumulate() {
        let a = slot(9);
        let mut store = PendingChanges::new(vec![a.clone()]);

        let first = a.with_times(a.start_time + Duration::hours(1), a.end_time + Duration::hours(1));
        let second = first.with_times(first.start_time, first.end_time + Duration::hours(1));
        store.add_change(Change::moved(a, first.clone()));
        store.add_change(Change::resized(first, second.clone()));

        assert_eq!(store.change_count(), 2);
        assert_eq!(store.current_state(), vec![second]);
    }

    #[test]
    fn test_replacement_of_unknown_slot_is_skipped() {
        let a = slot(9);
        let ghost = slot(12);
        let mut store = PendingChanges::new(vec![a.clone()]);

        let moved_ghost = ghost.with_times(ghost.start_time, ghost.end_time + Duration::hours(1));
        store.add_change(Change::update(ghost.clone(), moved_ghost));
        store.add_change(Change::delete(ghost));

        assert_eq!(store.current_state(), vec![a]);
    }

    #[test]
    fn test_save_promotes_and_discard_reverts() {
        let a = slot(9);
        let b = slot(11);
        let mut store = PendingChanges::new(vec![a.clone()]);

        store.add_change(Change::create(b.clone()));
        store.discard_changes();
        assert_eq!(store.current_state(), vec![a.clone()]);
        assert!(!store.has_unsaved_changes());

        store.add_change(Change::create(b.clone()));
        store.save_changes();
        assert_eq!(store.original_state(), &[a, b]);
        assert_eq!(store.change_count(), 0);
    }

    #[test]
    fn test_commit_succeeded_keeps_only_failed() {
        let a = slot(9);
        let b = slot(11);
        let c = slot(14);
        let mut store = PendingChanges::new(vec![a.clone()]);

        let create_b = Change::create(b.clone());
        let create_c = Change::create(c.clone());
        let delete_a = Change::delete(a.clone());
        store.add_change(create_b.clone());
        store.add_change(create_c.clone());
        store.add_change(delete_a);

        store.commit_succeeded(&HashSet::from([create_c.id]));

        assert_eq!(store.original_state(), &[b.clone()]);
        assert_eq!(store.changes(), &[create_c]);
        assert_eq!(store.current_state(), vec![b, c]);
    }

    #[test]
    fn test_remove_and_restore() {
        let a = slot(9);
        let b = slot(11);
        let mut store = PendingChanges::new(vec![a.clone()]);

        let create = Change::create(b.clone());
        let delete = Change::delete(a.clone());
        store.add_change(create.clone());
        store.add_change(delete.clone());

        let saved = store.changes().to_vec();
        assert_eq!(store.remove_change(delete.id), Some(delete));
        assert!(store.remove_change(Uuid::new_v4()).is_none());
        assert_eq!(store.current_state(), vec![a.clone(), b.clone()]);

        store.restore_state(saved);
        assert_eq!(store.current_state(), vec![b]);
        assert_eq!(store.original_state(), &[a]);
    }

    #[test]
    fn test_initialize_resets_changes() {
        let mut store = PendingChanges::new(vec![slot(9)]);
        store.add_change(Change::create(slot(10)));

        let fresh = vec![slot(13)];
        store.initialize(fresh.clone());

        let snapshot = store.snapshot();
        assert_eq!(snapshot.original_state, fresh);
        assert_eq!(snapshot.current_state, fresh);
        assert!(snapshot.changes.is_empty());
        assert!(!snapshot.has_unsaved_changes);
    }
}

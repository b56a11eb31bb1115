//! Undo/redo history over executed commands.
//!
//! Every successful, undoable command becomes an entry on the undo stack. New
//! entries clear the redo stack, so history never branches. Commands that land
//! within `min_push_interval` of the previous one and touch the same slots are
//! folded into the previous entry, which keeps a drag gesture to one undo step.

use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;
use crate::commands::{CommandResult, UndoableCommand};
use crate::pending::PendingChanges;

pub const DEFAULT_MAX_ENTRIES: usize = 50;
pub const DEFAULT_MIN_PUSH_INTERVAL: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone)]
pub struct HistoryConfig {
    pub max_entries: usize,
    pub min_push_interval: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            min_push_interval: DEFAULT_MIN_PUSH_INTERVAL,
        }
    }
}

#[derive(Debug)]
struct HistoryEntry {
    commands: Vec<Box<dyn UndoableCommand>>,
    description: String,
    affected: Vec<Uuid>,
}

impl HistoryEntry {
    fn undo(&mut self, store: &mut PendingChanges) {
        for command in self.commands.iter_mut().rev() {
            let result = command.undo(store);
            if !result.success {
                warn!("Undo step failed: {}", result.message);
            }
        }
    }

    fn redo(&mut self, store: &mut PendingChanges) {
        for command in self.commands.iter_mut() {
            let result = command.redo(store);
            if !result.success {
                warn!("Redo step failed: {}", result.message);
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct CommandHistory {
    undo_stack: VecDeque<HistoryEntry>,
    redo_stack: VecDeque<HistoryEntry>,
    config: HistoryConfig,
    last_push: Option<Instant>,
}

impl CommandHistory {
    pub fn new(config: HistoryConfig) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: VecDeque::new(),
            config,
            last_push: None,
        }
    }

    /// Validate and run `command`, recording it when it succeeds.
    pub fn execute(&mut self, mut command: Box<dyn UndoableCommand>, store: &mut PendingChanges) -> CommandResult {
        if let Err(reason) = command.validate(store) {
            debug!("Rejected \"{}\": {}", command.description(), reason);
            return CommandResult::failed(format!("{}: {}", command.description(), reason));
        }

        let result = command.execute(store);
        if result.success && result.undoable {
            self.push(command);
        }
        result
    }

    fn push(&mut self, command: Box<dyn UndoableCommand>) {
        let now = Instant::now();
        let mut affected = command.affected_entities();
        affected.sort();

        let recent = self
            .last_push
            .is_some_and(|last| now.duration_since(last) < self.config.min_push_interval);

        match self.undo_stack.back_mut() {
            Some(top) if recent && !affected.is_empty() && top.affected == affected => {
                top.commands.push(command);
            }
            _ => {
                self.undo_stack.push_back(HistoryEntry {
                    description: command.description(),
                    commands: vec![command],
                    affected,
                });
                while self.undo_stack.len() > self.config.max_entries {
                    self.undo_stack.pop_front();
                }
            }
        }

        self.redo_stack.clear();
        self.last_push = Some(now);
    }

    /// Revert the most recent entry. Returns false when there is nothing to undo.
    pub fn undo(&mut self, store: &mut PendingChanges) -> bool {
        let Some(mut entry) = self.undo_stack.pop_back() else {
            return false;
        };
        entry.undo(store);
        self.redo_stack.push_back(entry);
        self.last_push = None;
        true
    }

    /// Re-apply the most recently undone entry. Returns false when there is nothing to redo.
    pub fn redo(&mut self, store: &mut PendingChanges) -> bool {
        let Some(mut entry) = self.redo_stack.pop_back() else {
            return false;
        };
        entry.redo(store);
        self.undo_stack.push_back(entry);
        self.last_push = None;
        true
    }

    /// Forget all history, e.g. after a save or a full discard.
    pub fn clear_history(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.last_push = None;
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.back().map(|e| e.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.back().map(|e| e.description.as_str())
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use kairos_core::AvailabilitySlot;
    use crate::commands::{CreateSlotCommand, DeleteSlotCommand, MoveSlotCommand, UpdateSlotCommand};

    fn slot(hour: u32) -> AvailabilitySlot {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, hour, 0, 0).unwrap();
        AvailabilitySlot::new("provider-1", start, start + chrono::Duration::hours(1))
    }

    fn history() -> CommandHistory {
        CommandHistory::new(HistoryConfig {
            min_push_interval: Duration::ZERO,
            ..Default::default()
        })
    }

    #[test]
    fn test_undo_restores_previous_change_list() {
        let a = slot(9);
        let mut store = PendingChanges::new(vec![a.clone()]);
        let mut history = history();

        history.execute(Box::new(CreateSlotCommand::new(slot(11))), &mut store);
        let before = store.changes().to_vec();

        let longer = a.with_times(a.start_time, a.end_time + chrono::Duration::hours(1));
        assert!(history.execute(Box::new(UpdateSlotCommand::new(a, longer)), &mut store).success);
        assert_ne!(store.changes(), before.as_slice());

        assert!(history.undo(&mut store));
        assert_eq!(store.changes(), before.as_slice());
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut store = PendingChanges::default();
        let mut history = history();

        history.execute(Box::new(CreateSlotCommand::new(slot(9))), &mut store);
        assert!(history.undo(&mut store));
        assert!(history.redo(&mut store));
        assert!(history.undo(&mut store));
        assert!(history.can_redo());

        history.execute(Box::new(CreateSlotCommand::new(slot(10))), &mut store);
        assert!(!history.can_redo());
        assert!(!history.redo(&mut store));
    }

    #[test]
    fn test_undo_and_redo_on_empty_history() {
        let mut store = PendingChanges::default();
        let mut history = history();
        assert!(!history.undo(&mut store));
        assert!(!history.redo(&mut store));
    }

    #[test]
    fn test_stack_is_bounded() {
        let mut store = PendingChanges::default();
        let mut history = history();

        let slots: Vec<AvailabilitySlot> = (0..60)
            .map(|i| {
                let start = Utc.with_ymd_and_hms(2026, 3, 2, 0, 0, 0).unwrap() + chrono::Duration::hours(i);
                AvailabilitySlot::new("provider-1", start, start + chrono::Duration::minutes(30))
            })
            .collect();
        for s in &slots {
            history.execute(Box::new(CreateSlotCommand::new(s.clone())), &mut store);
        }

        assert_eq!(history.undo_len(), 50);
        while history.undo(&mut store) {}
        assert_eq!(history.redo_len(), 50);

        // The ten oldest entries were evicted, so their changes cannot be undone
        let remaining: Vec<_> = store.current_state().into_iter().map(|s| s.id).collect();
        let oldest: Vec<_> = slots[..10].iter().map(|s| s.id).collect();
        assert_eq!(remaining, oldest);
    }

    #[test]
    fn test_rejected_command_is_not_recorded() {
        let mut store = PendingChanges::default();
        let mut history = history();

        let result = history.execute(Box::new(DeleteSlotCommand::new(slot(9))), &mut store);
        assert!(!result.success);
        assert!(!history.can_undo());
    }

    #[test]
    fn test_rapid_moves_of_same_slot_coalesce() {
        let a = slot(9);
        let mut store = PendingChanges::new(vec![a.clone()]);
        let mut history = CommandHistory::new(HistoryConfig {
            min_push_interval: Duration::from_secs(60),
            ..Default::default()
        });

        let mut current = a.clone();
        for step in 1..=3 {
            let offset = chrono::Duration::minutes(15 * step);
            let command = MoveSlotCommand::new(current.clone(), a.start_time + offset, a.end_time + offset);
            assert!(history.execute(Box::new(command), &mut store).success);
            current = store.find_current(a.id).unwrap();
        }

        assert_eq!(history.undo_len(), 1);
        assert!(history.undo(&mut store));
        assert_eq!(store.current_state(), vec![a]);
        assert!(store.changes().is_empty());

        // A different slot starts a new entry even inside the interval
        history.execute(Box::new(CreateSlotCommand::new(slot(12))), &mut store);
        history.execute(Box::new(CreateSlotCommand::new(slot(14))), &mut store);
        assert_eq!(history.undo_len(), 2);
    }

    #[test]
    fn test_clear_history() {
        let mut store = PendingChanges::default();
        let mut history = history();

        history.execute(Box::new(CreateSlotCommand::new(slot(9))), &mut store);
        history.execute(Box::new(CreateSlotCommand::new(slot(10))), &mut store);
        history.undo(&mut store);
        assert_eq!(history.undo_description().map(|d| d.starts_with("Create slot")), Some(true));
        assert!(history.redo_description().is_some());

        history.clear_history();
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }
}

//! Reversible slot edits.
//!
//! Each command turns a user intent into a [`Change`] on the pending store and
//! knows how to take it back. Undo removes the forward change while it is still
//! pending; once it has been committed the inverse change is staged instead.

use std::fmt;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;
use kairos_core::slot::DURATION_TOLERANCE_MINUTES;
use kairos_core::AvailabilitySlot;
use crate::models::Change;
use crate::pending::PendingChanges;

const DATE_FORMAT: &str = "%a %d %b %H:%M";

/// Result of running, undoing or redoing a command
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub success: bool,
    pub undoable: bool,
    pub redoable: bool,
    pub affected_entities: Vec<Uuid>,
    pub side_effects: Vec<String>,
    pub message: String,
}

impl CommandResult {
    pub fn executed(message: impl Into<String>, affected_entities: Vec<Uuid>) -> Self {
        Self {
            success: true,
            undoable: true,
            redoable: false,
            affected_entities,
            side_effects: Vec::new(),
            message: message.into(),
        }
    }

    pub fn undone(message: impl Into<String>, affected_entities: Vec<Uuid>) -> Self {
        Self {
            success: true,
            undoable: false,
            redoable: true,
            affected_entities,
            side_effects: Vec::new(),
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    pub fn with_side_effect(mut self, effect: impl Into<String>) -> Self {
        self.side_effects.push(effect.into());
        self
    }
}

/// An edit that can be executed, undone and redone against the pending store.
pub trait UndoableCommand: Send + Sync + fmt::Debug {
    fn description(&self) -> String;

    fn affected_entities(&self) -> Vec<Uuid>;

    /// Structural and state checks; `Err` carries the reason shown to the user.
    fn validate(&self, store: &PendingChanges) -> Result<(), String>;

    fn can_execute(&self, store: &PendingChanges) -> bool {
        self.validate(store).is_ok()
    }

    fn execute(&mut self, store: &mut PendingChanges) -> CommandResult;

    fn undo(&mut self, store: &mut PendingChanges) -> CommandResult;

    fn redo(&mut self, store: &mut PendingChanges) -> CommandResult;

    fn can_undo(&self) -> bool;

    fn can_redo(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Ready,
    Executed,
    Undone,
}

/// Bookkeeping shared by the single-change commands.
#[derive(Debug)]
struct StagedChange {
    forward: Option<Change>,
    inverse: Option<Change>,
    status: CommandStatus,
}

impl StagedChange {
    fn new() -> Self {
        Self {
            forward: None,
            inverse: None,
            status: CommandStatus::Ready,
        }
    }

    fn apply(&mut self, store: &mut PendingChanges, change: Change, description: String) -> CommandResult {
        let affected = change.target_id().into_iter().collect();
        store.add_change(change.clone());
        self.forward = Some(change);
        self.inverse = None;
        self.status = CommandStatus::Executed;
        CommandResult::executed(description, affected)
    }

    fn revert(&mut self, store: &mut PendingChanges, description: String) -> CommandResult {
        let Some(forward) = self.forward.as_ref().filter(|_| self.status == CommandStatus::Executed) else {
            return CommandResult::failed(format!("Cannot undo \"{}\": not executed", description));
        };
        let affected: Vec<Uuid> = forward.target_id().into_iter().collect();

        if store.remove_change(forward.id).is_none() {
            // Already committed: stage the inverse
            let Some(inverse) = forward.inverse() else {
                return CommandResult::failed(format!("Cannot undo \"{}\": no previous state", description));
            };
            store.add_change(inverse.clone());
            self.inverse = Some(inverse);
        }

        self.status = CommandStatus::Undone;
        CommandResult::undone(format!("Undo {}", description), affected)
    }

    fn reapply(&mut self, store: &mut PendingChanges, description: String) -> CommandResult {
        let Some(forward) = self.forward.clone().filter(|_| self.status == CommandStatus::Undone) else {
            return CommandResult::failed(format!("Cannot redo \"{}\": not undone", description));
        };
        let affected = forward.target_id().into_iter().collect();

        match self.inverse.take() {
            // Dropping the staged inverse brings the committed forward change back
            Some(inverse) if store.remove_change(inverse.id).is_some() => {}
            _ => store.add_change(forward),
        }

        self.status = CommandStatus::Executed;
        CommandResult::executed(format!("Redo {}", description), affected)
    }

    fn can_undo(&self) -> bool {
        self.status == CommandStatus::Executed
    }

    fn can_redo(&self) -> bool {
        self.status == CommandStatus::Undone
    }
}

fn require_current(store: &PendingChanges, slot_id: Uuid) -> Result<AvailabilitySlot, String> {
    store
        .find_current(slot_id)
        .ok_or_else(|| format!("slot {} is not in the calendar", slot_id))
}

#[derive(Debug)]
pub struct CreateSlotCommand {
    slot: AvailabilitySlot,
    staged: StagedChange,
}

impl CreateSlotCommand {
    pub fn new(slot: AvailabilitySlot) -> Self {
        Self { slot, staged: StagedChange::new() }
    }
}

impl UndoableCommand for CreateSlotCommand {
    fn description(&self) -> String {
        format!("Create slot {}", self.slot.start_time.format(DATE_FORMAT))
    }

    fn affected_entities(&self) -> Vec<Uuid> {
        vec![self.slot.id]
    }

    fn validate(&self, store: &PendingChanges) -> Result<(), String> {
        self.slot.validate()?;
        if store.find_current(self.slot.id).is_some() {
            return Err(format!("slot {} already exists", self.slot.id));
        }
        Ok(())
    }

    fn execute(&mut self, store: &mut PendingChanges) -> CommandResult {
        if let Err(reason) = self.validate(store) {
            return CommandResult::failed(format!("Cannot create slot: {}", reason));
        }
        self.staged.apply(store, Change::create(self.slot.clone()), self.description())
    }

    fn undo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.revert(store, self.description())
    }

    fn redo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.reapply(store, self.description())
    }

    fn can_undo(&self) -> bool {
        self.staged.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.staged.can_redo()
    }
}

#[derive(Debug)]
pub struct UpdateSlotCommand {
    previous: AvailabilitySlot,
    updated: AvailabilitySlot,
    staged: StagedChange,
}

impl UpdateSlotCommand {
    pub fn new(previous: AvailabilitySlot, updated: AvailabilitySlot) -> Self {
        Self { previous, updated, staged: StagedChange::new() }
    }
}

impl UndoableCommand for UpdateSlotCommand {
    fn description(&self) -> String {
        format!("Update slot {}", self.previous.start_time.format(DATE_FORMAT))
    }

    fn affected_entities(&self) -> Vec<Uuid> {
        vec![self.previous.id]
    }

    fn validate(&self, store: &PendingChanges) -> Result<(), String> {
        if self.previous.id != self.updated.id {
            return Err("updated slot must keep its id".to_string());
        }
        self.updated.validate()?;
        require_current(store, self.previous.id).map(|_| ())
    }

    fn execute(&mut self, store: &mut PendingChanges) -> CommandResult {
        if let Err(reason) = self.validate(store) {
            return CommandResult::failed(format!("Cannot update slot: {}", reason));
        }
        let change = Change::update(self.previous.clone(), self.updated.clone());
        self.staged.apply(store, change, self.description())
    }

    fn undo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.revert(store, self.description())
    }

    fn redo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.reapply(store, self.description())
    }

    fn can_undo(&self) -> bool {
        self.staged.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.staged.can_redo()
    }
}

#[derive(Debug)]
pub struct DeleteSlotCommand {
    slot: AvailabilitySlot,
    staged: StagedChange,
}

impl DeleteSlotCommand {
    pub fn new(slot: AvailabilitySlot) -> Self {
        Self { slot, staged: StagedChange::new() }
    }
}

impl UndoableCommand for DeleteSlotCommand {
    fn description(&self) -> String {
        format!("Delete slot {}", self.slot.start_time.format(DATE_FORMAT))
    }

    fn affected_entities(&self) -> Vec<Uuid> {
        vec![self.slot.id]
    }

    fn validate(&self, store: &PendingChanges) -> Result<(), String> {
        require_current(store, self.slot.id).map(|_| ())
    }

    fn execute(&mut self, store: &mut PendingChanges) -> CommandResult {
        if let Err(reason) = self.validate(store) {
            return CommandResult::failed(format!("Cannot delete slot: {}", reason));
        }
        let result = self.staged.apply(store, Change::delete(self.slot.clone()), self.description());
        if self.slot.is_booked {
            result.with_side_effect(format!("Slot {} has a booking that stays active", self.slot.id))
        } else {
            result
        }
    }

    fn undo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.revert(store, self.description())
    }

    fn redo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.reapply(store, self.description())
    }

    fn can_undo(&self) -> bool {
        self.staged.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.staged.can_redo()
    }
}

/// Shift a slot to a new position, keeping its length.
#[derive(Debug)]
pub struct MoveSlotCommand {
    previous: AvailabilitySlot,
    moved: AvailabilitySlot,
    staged: StagedChange,
}

impl MoveSlotCommand {
    pub fn new(previous: AvailabilitySlot, new_start: DateTime<Utc>, new_end: DateTime<Utc>) -> Self {
        let moved = previous.with_times(new_start, new_end);
        Self { previous, moved, staged: StagedChange::new() }
    }
}

impl UndoableCommand for MoveSlotCommand {
    fn description(&self) -> String {
        format!(
            "Move slot from {} to {}",
            self.previous.start_time.format(DATE_FORMAT),
            self.moved.start_time.format(DATE_FORMAT)
        )
    }

    fn affected_entities(&self) -> Vec<Uuid> {
        vec![self.previous.id]
    }

    fn validate(&self, store: &PendingChanges) -> Result<(), String> {
        self.moved.validate()?;
        if (self.moved.duration_minutes - self.previous.duration_minutes).abs() > DURATION_TOLERANCE_MINUTES {
            return Err(format!(
                "a move must keep the {} min duration, got {} min",
                self.previous.duration_minutes, self.moved.duration_minutes
            ));
        }
        require_current(store, self.previous.id).map(|_| ())
    }

    fn execute(&mut self, store: &mut PendingChanges) -> CommandResult {
        if let Err(reason) = self.validate(store) {
            return CommandResult::failed(format!("Cannot move slot: {}", reason));
        }
        let change = Change::moved(self.previous.clone(), self.moved.clone());
        self.staged.apply(store, change, self.description())
    }

    fn undo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.revert(store, self.description())
    }

    fn redo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.reapply(store, self.description())
    }

    fn can_undo(&self) -> bool {
        self.staged.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.staged.can_redo()
    }
}

/// Change a slot's bounds, optionally enforcing a minimum length.
#[derive(Debug)]
pub struct ResizeSlotCommand {
    previous: AvailabilitySlot,
    resized: AvailabilitySlot,
    min_duration_minutes: Option<i64>,
    staged: StagedChange,
}

impl ResizeSlotCommand {
    pub fn new(previous: AvailabilitySlot, new_start: DateTime<Utc>, new_end: DateTime<Utc>) -> Self {
        let resized = previous.with_times(new_start, new_end);
        Self {
            previous,
            resized,
            min_duration_minutes: None,
            staged: StagedChange::new(),
        }
    }

    pub fn with_min_duration(mut self, minutes: i64) -> Self {
        self.min_duration_minutes = Some(minutes);
        self
    }
}

impl UndoableCommand for ResizeSlotCommand {
    fn description(&self) -> String {
        format!(
            "Resize slot {} to {} min",
            self.previous.start_time.format(DATE_FORMAT),
            self.resized.duration_minutes
        )
    }

    fn affected_entities(&self) -> Vec<Uuid> {
        vec![self.previous.id]
    }

    fn validate(&self, store: &PendingChanges) -> Result<(), String> {
        self.resized.validate()?;
        if let Some(min) = self.min_duration_minutes {
            if self.resized.duration_minutes < min {
                return Err(format!("slots must be at least {} min long", min));
            }
        }
        require_current(store, self.previous.id).map(|_| ())
    }

    fn execute(&mut self, store: &mut PendingChanges) -> CommandResult {
        if let Err(reason) = self.validate(store) {
            return CommandResult::failed(format!("Cannot resize slot: {}", reason));
        }
        let change = Change::resized(self.previous.clone(), self.resized.clone());
        self.staged.apply(store, change, self.description())
    }

    fn undo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.revert(store, self.description())
    }

    fn redo(&mut self, store: &mut PendingChanges) -> CommandResult {
        self.staged.reapply(store, self.description())
    }

    fn can_undo(&self) -> bool {
        self.staged.can_undo()
    }

    fn can_redo(&self) -> bool {
        self.staged.can_redo()
    }
}

/// Several commands run in sequence and undone as one step.
#[derive(Debug)]
pub struct BatchCommand {
    description: String,
    commands: Vec<Box<dyn UndoableCommand>>,
    stop_on_failure: bool,
    executed: Vec<bool>,
    status: CommandStatus,
}

impl BatchCommand {
    pub fn new(description: impl Into<String>, commands: Vec<Box<dyn UndoableCommand>>) -> Self {
        Self {
            description: description.into(),
            commands,
            stop_on_failure: false,
            executed: Vec::new(),
            status: CommandStatus::Ready,
        }
    }

    /// Abort on the first failing child and roll back the ones already run.
    pub fn stop_on_failure(mut self) -> Self {
        self.stop_on_failure = true;
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl UndoableCommand for BatchCommand {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn affected_entities(&self) -> Vec<Uuid> {
        let mut ids: Vec<Uuid> = self.commands.iter().flat_map(|c| c.affected_entities()).collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn validate(&self, _store: &PendingChanges) -> Result<(), String> {
        // Children are checked one by one as they run, each against the state its predecessors left
        if self.commands.is_empty() {
            return Err("batch is empty".to_string());
        }
        Ok(())
    }

    fn execute(&mut self, store: &mut PendingChanges) -> CommandResult {
        if let Err(reason) = self.validate(store) {
            return CommandResult::failed(format!("Cannot run \"{}\": {}", self.description, reason));
        }

        self.executed = vec![false; self.commands.len()];
        let mut affected = Vec::new();
        let mut side_effects = Vec::new();

        for index in 0..self.commands.len() {
            let result = self.commands[index].execute(store);
            if result.success {
                self.executed[index] = true;
                affected.extend(result.affected_entities);
                side_effects.extend(result.side_effects);
                continue;
            }

            if self.stop_on_failure {
                for done in (0..index).rev() {
                    self.commands[done].undo(store);
                    self.executed[done] = false;
                }
                // Leave the rolled-back children redoable only through a fresh execute
                self.status = CommandStatus::Ready;
                return CommandResult::failed(format!(
                    "\"{}\" stopped at step {}: {}",
                    self.description,
                    index + 1,
                    result.message
                ));
            }
            side_effects.push(result.message);
        }

        let succeeded = self.executed.iter().filter(|done| **done).count();
        if succeeded == 0 {
            return CommandResult {
                side_effects,
                ..CommandResult::failed(format!("\"{}\" made no changes", self.description))
            };
        }

        self.status = CommandStatus::Executed;
        let message = if succeeded == self.commands.len() {
            self.description.clone()
        } else {
            format!("{} ({} of {} applied)", self.description, succeeded, self.commands.len())
        };
        CommandResult {
            side_effects,
            ..CommandResult::executed(message, affected)
        }
    }

    fn undo(&mut self, store: &mut PendingChanges) -> CommandResult {
        if self.status != CommandStatus::Executed {
            return CommandResult::failed(format!("Cannot undo \"{}\": not executed", self.description));
        }
        for (command, done) in self.commands.iter_mut().zip(&self.executed).rev() {
            if *done {
                command.undo(store);
            }
        }
        self.status = CommandStatus::Undone;
        CommandResult::undone(format!("Undo {}", self.description), self.affected_entities())
    }

    fn redo(&mut self, store: &mut PendingChanges) -> CommandResult {
        if self.status != CommandStatus::Undone {
            return CommandResult::failed(format!("Cannot redo \"{}\": not undone", self.description));
        }
        for (command, done) in self.commands.iter_mut().zip(&self.executed) {
            if *done {
                command.redo(store);
            }
        }
        self.status = CommandStatus::Executed;
        CommandResult::executed(format!("Redo {}", self.description), self.affected_entities())
    }

    fn can_undo(&self) -> bool {
        self.status == CommandStatus::Executed
    }

    fn can_redo(&self) -> bool {
        self.status == CommandStatus::Undone
    }
}

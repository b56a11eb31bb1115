use chrono::{Duration, NaiveDate};
use uuid::Uuid;
use kairos_core::AvailabilitySlot;
use crate::commands::{
    BatchCommand, CreateSlotCommand, DeleteSlotCommand, MoveSlotCommand, ResizeSlotCommand,
    UndoableCommand, UpdateSlotCommand,
};
use crate::models::{Change, ChangeType};

/// Builds commands from raw changes
pub struct CommandFactory;

impl CommandFactory {
    /// Turn a change back into the command that would have produced it.
    pub fn from_change(change: &Change) -> Result<Box<dyn UndoableCommand>, CommandError> {
        let command: Box<dyn UndoableCommand> = match change.change_type {
            ChangeType::Create => {
                let slot = require(change.entity.as_ref(), change, "entity")?;
                Box::new(CreateSlotCommand::new(slot.clone()))
            }
            ChangeType::Update => {
                let previous = require(change.previous_entity.as_ref(), change, "previousEntity")?;
                let updated = require(change.entity.as_ref(), change, "entity")?;
                Box::new(UpdateSlotCommand::new(previous.clone(), updated.clone()))
            }
            ChangeType::Delete => {
                // The full snapshot is needed to re-create the slot on undo
                let previous = require(change.previous_entity.as_ref(), change, "previousEntity")?;
                Box::new(DeleteSlotCommand::new(previous.clone()))
            }
            ChangeType::Move => {
                let previous = require(change.previous_entity.as_ref(), change, "previousEntity")?;
                let moved = require(change.entity.as_ref(), change, "entity")?;
                Box::new(MoveSlotCommand::new(previous.clone(), moved.start_time, moved.end_time))
            }
            ChangeType::Resize => {
                let previous = require(change.previous_entity.as_ref(), change, "previousEntity")?;
                let resized = require(change.entity.as_ref(), change, "entity")?;
                Box::new(ResizeSlotCommand::new(previous.clone(), resized.start_time, resized.end_time))
            }
        };
        Ok(command)
    }

    /// Bundle several changes into one undo step.
    pub fn batch(changes: &[Change], description: impl Into<String>) -> Result<BatchCommand, CommandError> {
        if changes.is_empty() {
            return Err(CommandError::EmptyBatch);
        }
        let commands = changes
            .iter()
            .map(Self::from_change)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(BatchCommand::new(description, commands))
    }

    /// Copy every slot starting in the week of `from_week_start` into the week of
    /// `to_week_start`. Copies are fresh, unbooked slots.
    pub fn copy_week(
        slots: &[AvailabilitySlot],
        from_week_start: NaiveDate,
        to_week_start: NaiveDate,
    ) -> Result<BatchCommand, CommandError> {
        let week_end = from_week_start + Duration::days(7);
        let offset = to_week_start - from_week_start;

        let copies: Vec<Box<dyn UndoableCommand>> = slots
            .iter()
            .filter(|slot| {
                let day = slot.start_time.date_naive();
                day >= from_week_start && day < week_end
            })
            .map(|slot| {
                let copy = AvailabilitySlot {
                    id: Uuid::new_v4(),
                    is_booked: false,
                    booking_id: None,
                    ..slot.shifted_by(offset)
                };
                Box::new(CreateSlotCommand::new(copy)) as Box<dyn UndoableCommand>
            })
            .collect();

        if copies.is_empty() {
            return Err(CommandError::EmptyBatch);
        }

        let description = format!(
            "Copy {} slots from week {} to week {}",
            copies.len(),
            from_week_start.format("%Y-%m-%d"),
            to_week_start.format("%Y-%m-%d")
        );
        Ok(BatchCommand::new(description, copies))
    }
}

fn require<'a, T>(value: Option<&'a T>, change: &Change, field: &'static str) -> Result<&'a T, CommandError> {
    value.ok_or(CommandError::MissingField {
        change_type: change.change_type.as_str(),
        field,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("{change_type} change is missing {field}")]
    MissingField {
        change_type: &'static str,
        field: &'static str,
    },

    #[error("Nothing to do: batch has no commands")]
    EmptyBatch,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use crate::pending::PendingChanges;

    fn slot(day: u32, hour: u32) -> AvailabilitySlot {
        let start = Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap();
        AvailabilitySlot::new("provider-1", start, start + Duration::hours(1))
    }

    #[test]
    fn test_from_change_maps_each_type() {
        let a = slot(2, 9);
        let later = a.with_times(a.start_time + Duration::hours(1), a.end_time + Duration::hours(1));
        let longer = a.with_times(a.start_time, a.end_time + Duration::hours(1));

        let cases = vec![
            (Change::create(slot(2, 12)), "Create slot"),
            (Change::update(a.clone(), later.clone()), "Update slot"),
            (Change::moved(a.clone(), later), "Move slot"),
            (Change::resized(a.clone(), longer), "Resize slot"),
            (Change::delete(a.clone()), "Delete slot"),
        ];

        for (change, prefix) in cases {
            let mut store = PendingChanges::new(vec![a.clone()]);
            let mut command = CommandFactory::from_change(&change).unwrap();
            assert!(command.description().starts_with(prefix), "{}", command.description());
            assert!(command.execute(&mut store).success);
            assert_eq!(store.changes()[0].change_type, change.change_type);
        }
    }

    #[test]
    fn test_from_change_requires_snapshot_for_delete() {
        let mut change = Change::delete(slot(2, 9));
        change.previous_entity = None;

        let err = CommandFactory::from_change(&change).unwrap_err();
        assert!(matches!(err, CommandError::MissingField { field: "previousEntity", .. }));
    }

    #[test]
    fn test_copy_week() {
        let monday = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();
        let next_monday = NaiveDate::from_ymd_opt(2026, 3, 9).unwrap();

        let mut booked = slot(3, 10);
        booked.is_booked = true;
        let slots = vec![slot(2, 9), booked, slot(9, 9)];

        let mut batch = CommandFactory::copy_week(&slots, monday, next_monday).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.description(), "Copy 2 slots from week 2026-03-02 to week 2026-03-09");

        let mut store = PendingChanges::new(slots.clone());
        assert!(batch.execute(&mut store).success);

        let state = store.current_state();
        assert_eq!(state.len(), 5);
        let copies = &state[3..];
        assert_eq!(copies[0].start_time, slots[0].start_time + Duration::days(7));
        assert!(copies.iter().all(|s| !s.is_booked && s.booking_id.is_none()));
    }

    #[test]
    fn test_copy_empty_week_fails() {
        let monday = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
        let result = CommandFactory::copy_week(&[slot(2, 9)], monday, monday + Duration::days(7));
        assert!(matches!(result, Err(CommandError::EmptyBatch)));
    }
}

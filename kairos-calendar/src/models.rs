use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};
use kairos_core::AvailabilitySlot;

/// Kind of edit a pending change represents
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Create,
    Update,
    Delete,
    Move,
    Resize,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Delete => "delete",
            ChangeType::Move => "move",
            ChangeType::Resize => "resize",
        }
    }

    /// Update, move and resize all replace an existing slot in place.
    pub fn is_replacement(&self) -> bool {
        matches!(self, ChangeType::Update | ChangeType::Move | ChangeType::Resize)
    }
}

/// One proposed mutation of a slot, staged locally and not yet persisted.
///
/// Build changes through the constructors: a `create` carries `entity` only,
/// a `delete` carries `entity_id` only, replacements carry both.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    #[serde(default)]
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    pub entity: Option<AvailabilitySlot>,
    #[serde(default)]
    pub previous_entity: Option<AvailabilitySlot>,
    pub timestamp: DateTime<Utc>,
}

impl Change {
    fn new(
        change_type: ChangeType,
        entity_id: Option<Uuid>,
        entity: Option<AvailabilitySlot>,
        previous_entity: Option<AvailabilitySlot>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            change_type,
            entity_id,
            entity,
            previous_entity,
            timestamp: Utc::now(),
        }
    }

    pub fn create(slot: AvailabilitySlot) -> Self {
        Self::new(ChangeType::Create, None, Some(slot), None)
    }

    pub fn update(previous: AvailabilitySlot, updated: AvailabilitySlot) -> Self {
        Self::replacement(ChangeType::Update, previous, updated)
    }

    pub fn moved(previous: AvailabilitySlot, updated: AvailabilitySlot) -> Self {
        Self::replacement(ChangeType::Move, previous, updated)
    }

    pub fn resized(previous: AvailabilitySlot, updated: AvailabilitySlot) -> Self {
        Self::replacement(ChangeType::Resize, previous, updated)
    }

    pub fn delete(previous: AvailabilitySlot) -> Self {
        Self::new(ChangeType::Delete, Some(previous.id), None, Some(previous))
    }

    fn replacement(change_type: ChangeType, previous: AvailabilitySlot, updated: AvailabilitySlot) -> Self {
        Self::new(change_type, Some(previous.id), Some(updated), Some(previous))
    }

    /// Checks the field invariant for changes that did not come from the constructors.
    pub fn is_well_formed(&self) -> bool {
        match self.change_type {
            ChangeType::Create => self.entity.is_some() && self.entity_id.is_none(),
            ChangeType::Delete => self.entity_id.is_some() && self.entity.is_none(),
            ChangeType::Update | ChangeType::Move | ChangeType::Resize => {
                self.entity.is_some() && self.entity_id.is_some()
            }
        }
    }

    /// The slot this change touches.
    pub fn target_id(&self) -> Option<Uuid> {
        self.entity_id.or_else(|| self.entity.as_ref().map(|e| e.id))
    }

    /// The change that reverses this one, if enough state was captured to build it.
    pub fn inverse(&self) -> Option<Change> {
        match self.change_type {
            ChangeType::Create => self.entity.clone().map(Change::delete),
            ChangeType::Delete => self.previous_entity.clone().map(Change::create),
            ChangeType::Update | ChangeType::Move | ChangeType::Resize => {
                let previous = self.previous_entity.clone()?;
                let current = self.entity.clone()?;
                Some(Self::replacement(self.change_type, current, previous))
            }
        }
    }
}

/// A change the backend rejected during a save.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FailedChange {
    pub change_id: Uuid,
    pub change_type: ChangeType,
    pub entity_id: Option<Uuid>,
    pub entity: Option<AvailabilitySlot>,
    pub error: String,
}

impl FailedChange {
    pub fn new(change: &Change, error: impl Into<String>) -> Self {
        Self {
            change_id: change.id,
            change_type: change.change_type,
            entity_id: change.target_id(),
            entity: change.entity.clone().or_else(|| change.previous_entity.clone()),
            error: error.into(),
        }
    }
}

/// Outcome of pushing a change set to the backend. Partial success is normal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SaveResult {
    pub success: bool,
    pub created: Vec<AvailabilitySlot>,
    pub updated: Vec<AvailabilitySlot>,
    pub deleted: Vec<Uuid>,
    pub failed: Vec<FailedChange>,
    pub message: String,
}

impl SaveResult {
    pub fn empty() -> Self {
        Self {
            success: true,
            message: "No changes to save".to_string(),
            ..Default::default()
        }
    }

    pub fn saved_count(&self) -> usize {
        self.created.len() + self.updated.len() + self.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn slot() -> AvailabilitySlot {
        let start = Utc::now();
        AvailabilitySlot::new("provider-1", start, start + Duration::minutes(30))
    }

    #[test]
    fn test_constructors_respect_field_invariant() {
        let a = slot();
        let b = a.with_times(a.start_time, a.end_time + Duration::minutes(30));

        let create = Change::create(a.clone());
        assert!(create.is_well_formed());
        assert!(create.entity_id.is_none());

        let delete = Change::delete(a.clone());
        assert!(delete.is_well_formed());
        assert!(delete.entity.is_none());
        assert_eq!(delete.entity_id, Some(a.id));

        let resize = Change::resized(a.clone(), b);
        assert!(resize.is_well_formed());
        assert_eq!(resize.target_id(), Some(a.id));

        let malformed = Change { entity: Some(a), ..delete };
        assert!(!malformed.is_well_formed());
    }

    #[test]
    fn test_inverse_swaps_states() {
        let a = slot();
        let moved = a.with_times(a.start_time + Duration::hours(2), a.end_time + Duration::hours(2));

        let forward = Change::moved(a.clone(), moved.clone());
        let inverse = forward.inverse().unwrap();
        assert_eq!(inverse.change_type, ChangeType::Move);
        assert_eq!(inverse.entity, Some(a.clone()));
        assert_eq!(inverse.previous_entity, Some(moved));
        assert_ne!(inverse.id, forward.id);

        let undo_delete = Change::delete(a.clone()).inverse().unwrap();
        assert_eq!(undo_delete.change_type, ChangeType::Create);
        assert_eq!(undo_delete.entity, Some(a));
    }

    #[test]
    fn test_wire_format() {
        let change = Change::create(slot());
        let json = serde_json::to_value(&change).unwrap();
        assert_eq!(json["type"], "create");
        assert!(json["entity"]["startTime"].is_string());

        let parsed: Change = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, change);
    }
}

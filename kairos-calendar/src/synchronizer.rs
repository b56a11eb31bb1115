use std::sync::Arc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;
use kairos_core::repository::AvailabilityRepository;
use kairos_core::AvailabilitySlot;
use crate::models::{Change, ChangeType, FailedChange, SaveResult};

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("A save is already in progress")]
    SaveInProgress,
}

/// Pushes a pending change set to the availability repository.
///
/// Every change becomes its own repository call and all calls run
/// concurrently; one failure never aborts the others.
pub struct ChangesSynchronizer {
    repo: Arc<dyn AvailabilityRepository>,
    in_flight: Mutex<()>,
}

impl ChangesSynchronizer {
    pub fn new(repo: Arc<dyn AvailabilityRepository>) -> Self {
        Self {
            repo,
            in_flight: Mutex::new(()),
        }
    }

    /// Save `changes`. A second call while one is running is rejected with
    /// [`SyncError::SaveInProgress`].
    pub async fn save_changes(&self, changes: &[Change]) -> Result<SaveResult, SyncError> {
        if changes.is_empty() {
            return Ok(SaveResult::empty());
        }

        let _guard = self.in_flight.try_lock().map_err(|_| SyncError::SaveInProgress)?;

        let mut creates = Vec::new();
        let mut updates = Vec::new();
        let mut deletes = Vec::new();
        for change in changes {
            match change.change_type {
                ChangeType::Create => creates.push(change),
                ChangeType::Update | ChangeType::Move | ChangeType::Resize => updates.push(change),
                ChangeType::Delete => deletes.push(change),
            }
        }

        let (created, updated, deleted) = tokio::join!(
            join_all(creates.into_iter().map(|c| self.create_one(c))),
            join_all(updates.into_iter().map(|c| self.update_one(c))),
            join_all(deletes.into_iter().map(|c| self.delete_one(c))),
        );

        let mut result = SaveResult::default();
        for outcome in created {
            match outcome {
                Ok(slot) => result.created.push(slot),
                Err(failure) => result.failed.push(failure),
            }
        }
        for outcome in updated {
            match outcome {
                Ok(slot) => result.updated.push(slot),
                Err(failure) => result.failed.push(failure),
            }
        }
        for outcome in deleted {
            match outcome {
                Ok(id) => result.deleted.push(id),
                Err(failure) => result.failed.push(failure),
            }
        }

        result.success = result.failed.is_empty();
        result.message = summarize(&result);

        if result.success {
            info!("{}", result.message);
        } else {
            warn!("{}", result.message);
        }

        Ok(result)
    }

    async fn create_one(&self, change: &Change) -> Result<AvailabilitySlot, FailedChange> {
        let slot = well_formed(change)?.entity.as_ref().ok_or_else(|| FailedChange::new(change, "missing entity"))?;
        self.repo
            .create_slot(slot)
            .await
            .map_err(|e| FailedChange::new(change, e.to_string()))
    }

    async fn update_one(&self, change: &Change) -> Result<AvailabilitySlot, FailedChange> {
        let slot = well_formed(change)?.entity.as_ref().ok_or_else(|| FailedChange::new(change, "missing entity"))?;
        self.repo
            .update_slot(slot)
            .await
            .map_err(|e| FailedChange::new(change, e.to_string()))
    }

    async fn delete_one(&self, change: &Change) -> Result<Uuid, FailedChange> {
        let id = well_formed(change)?.entity_id.ok_or_else(|| FailedChange::new(change, "missing entity id"))?;
        self.repo
            .delete_slot(id)
            .await
            .map(|_| id)
            .map_err(|e| FailedChange::new(change, e.to_string()))
    }
}

fn well_formed(change: &Change) -> Result<&Change, FailedChange> {
    if change.is_well_formed() {
        Ok(change)
    } else {
        Err(FailedChange::new(change, format!("malformed {} change", change.change_type.as_str())))
    }
}

fn summarize(result: &SaveResult) -> String {
    let saved = format!(
        "created {}, updated {}, deleted {}",
        result.created.len(),
        result.updated.len(),
        result.deleted.len()
    );
    if result.failed.is_empty() {
        format!("Saved {} changes ({})", result.saved_count(), saved)
    } else {
        format!(
            "Saved {} of {} changes ({}); {} failed",
            result.saved_count(),
            result.saved_count() + result.failed.len(),
            saved,
            result.failed.len()
        )
    }
}

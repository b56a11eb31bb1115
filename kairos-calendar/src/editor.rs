use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use kairos_core::AvailabilitySlot;
use crate::commands::{CommandResult, UndoableCommand};
use crate::history::{CommandHistory, HistoryConfig};
use crate::models::SaveResult;
use crate::state::CalendarState;
use crate::synchronizer::{ChangesSynchronizer, SyncError};

/// One provider's editing session: the pending store, its history, and the
/// synchronizer that persists it.
pub struct CalendarEditor {
    state: CalendarState,
    history: CommandHistory,
    synchronizer: Arc<ChangesSynchronizer>,
}

impl CalendarEditor {
    pub fn new(
        original_state: Vec<AvailabilitySlot>,
        synchronizer: Arc<ChangesSynchronizer>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            state: CalendarState::new(original_state),
            history: CommandHistory::new(config),
            synchronizer,
        }
    }

    pub fn state(&self) -> &CalendarState {
        &self.state
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn apply(&mut self, command: Box<dyn UndoableCommand>) -> CommandResult {
        let history = &mut self.history;
        self.state.mutate(|store| history.execute(command, store))
    }

    pub fn undo(&mut self) -> bool {
        let history = &mut self.history;
        self.state.mutate(|store| history.undo(store))
    }

    pub fn redo(&mut self) -> bool {
        let history = &mut self.history;
        self.state.mutate(|store| history.redo(store))
    }

    /// Push every pending change to the repository.
    ///
    /// A fully successful save promotes the pending state and clears history.
    /// After a partial failure the saved changes are committed and only the
    /// failed ones stay pending, so a retry never resends applied work.
    /// History is kept either way; undoing a committed edit stages its inverse.
    pub async fn save(&mut self) -> Result<SaveResult, SyncError> {
        let changes = self.state.store().changes().to_vec();
        let result = self.synchronizer.save_changes(&changes).await?;

        if result.success {
            self.state.save_changes();
            self.history.clear_history();
            info!("Saved {} pending changes", changes.len());
        } else {
            let failed: HashSet<Uuid> = result.failed.iter().map(|f| f.change_id).collect();
            self.state.commit_succeeded(&failed);
            debug!("Committed {} changes, keeping {} failed", result.saved_count(), failed.len());
        }
        Ok(result)
    }

    pub fn discard(&mut self) {
        self.state.discard_changes();
        self.history.clear_history();
    }

    /// Start over from a freshly loaded slot list.
    pub fn reload(&mut self, original_state: Vec<AvailabilitySlot>) {
        self.state.initialize(original_state);
        self.history.clear_history();
    }
}

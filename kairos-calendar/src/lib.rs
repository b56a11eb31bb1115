pub mod models;
pub mod pending;
pub mod state;
pub mod commands;
pub mod factory;
pub mod history;
pub mod synchronizer;
pub mod editor;

pub use models::{Change, ChangeType, FailedChange, SaveResult};
pub use pending::{PendingChanges, PendingChangesState};
pub use state::CalendarState;
pub use commands::{
    BatchCommand, CommandResult, CreateSlotCommand, DeleteSlotCommand, MoveSlotCommand,
    ResizeSlotCommand, UndoableCommand, UpdateSlotCommand,
};
pub use factory::{CommandError, CommandFactory};
pub use history::{CommandHistory, HistoryConfig};
pub use synchronizer::{ChangesSynchronizer, SyncError};
pub use editor::CalendarEditor;

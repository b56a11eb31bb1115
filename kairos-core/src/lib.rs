pub mod slot;
pub mod booking;
pub mod repository;
pub mod notification;
pub mod code_store;
pub mod cancellation;

pub use slot::AvailabilitySlot;
pub use booking::{Booking, BookingStatus};
pub use cancellation::{CancellationError, CancellationPolicy, CancellationService, SweeperHandle};
pub use code_store::{CancellationCode, CodeCheck, CodeKey, CodeStore, InMemoryCodeStore};
pub use notification::{LogNotifier, Notifier};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

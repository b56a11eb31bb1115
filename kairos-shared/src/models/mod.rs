pub mod events;

pub use events::{BookingCancelledEvent, CancellationRequestedEvent, ServerEvent, SlotsSyncedEvent};

use async_trait::async_trait;
use uuid::Uuid;
use crate::{AvailabilitySlot, Booking, BookingStatus, CoreResult};

/// Repository trait for availability slot access
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    async fn list_slots(&self, provider_id: &str) -> CoreResult<Vec<AvailabilitySlot>>;

    async fn get_slot(&self, id: Uuid) -> CoreResult<Option<AvailabilitySlot>>;

    /// Persist a new slot, returning the normalized entity.
    async fn create_slot(&self, slot: &AvailabilitySlot) -> CoreResult<AvailabilitySlot>;

    /// Replace an existing slot. `NotFound` when the id is unknown.
    async fn update_slot(&self, slot: &AvailabilitySlot) -> CoreResult<AvailabilitySlot>;

    async fn delete_slot(&self, id: Uuid) -> CoreResult<()>;

    async fn set_booked(&self, id: Uuid, is_booked: bool, booking_id: Option<Uuid>) -> CoreResult<()>;
}

/// Repository trait for booking access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Uuid>;

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> CoreResult<Booking>;
}

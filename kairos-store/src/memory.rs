use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;
use kairos_core::repository::{AvailabilityRepository, BookingRepository};
use kairos_core::{AvailabilitySlot, Booking, BookingStatus, CoreError, CoreResult};

/// Slots kept in process memory. Used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryAvailabilityRepository {
    slots: RwLock<HashMap<Uuid, AvailabilitySlot>>,
}

impl InMemoryAvailabilityRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_slots(slots: impl IntoIterator<Item = AvailabilitySlot>) -> Self {
        Self {
            slots: RwLock::new(slots.into_iter().map(|s| (s.id, s)).collect()),
        }
    }
}

#[async_trait]
impl AvailabilityRepository for InMemoryAvailabilityRepository {
    async fn list_slots(&self, provider_id: &str) -> CoreResult<Vec<AvailabilitySlot>> {
        let slots = self.slots.read().await;
        let mut found: Vec<_> = slots.values().filter(|s| s.provider_id == provider_id).cloned().collect();
        found.sort_by_key(|s| s.start_time);
        Ok(found)
    }

    async fn get_slot(&self, id: Uuid) -> CoreResult<Option<AvailabilitySlot>> {
        Ok(self.slots.read().await.get(&id).cloned())
    }

    async fn create_slot(&self, slot: &AvailabilitySlot) -> CoreResult<AvailabilitySlot> {
        slot.validate().map_err(CoreError::ValidationError)?;

        let mut slots = self.slots.write().await;
        if slots.contains_key(&slot.id) {
            return Err(CoreError::ValidationError(format!("Slot {} already exists", slot.id)));
        }
        slots.insert(slot.id, slot.clone());
        Ok(slot.clone())
    }

    async fn update_slot(&self, slot: &AvailabilitySlot) -> CoreResult<AvailabilitySlot> {
        slot.validate().map_err(CoreError::ValidationError)?;

        let mut slots = self.slots.write().await;
        match slots.get_mut(&slot.id) {
            Some(existing) => {
                *existing = slot.clone();
                Ok(slot.clone())
            }
            None => Err(CoreError::NotFound(format!("Slot {}", slot.id))),
        }
    }

    async fn delete_slot(&self, id: Uuid) -> CoreResult<()> {
        self.slots
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| CoreError::NotFound(format!("Slot {}", id)))
    }

    async fn set_booked(&self, id: Uuid, is_booked: bool, booking_id: Option<Uuid>) -> CoreResult<()> {
        let mut slots = self.slots.write().await;
        let slot = slots
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Slot {}", id)))?;
        slot.is_booked = is_booked;
        slot.booking_id = booking_id;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBookingRepository {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingRepository for InMemoryBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Uuid> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(CoreError::ValidationError(format!("Booking {} already exists", booking.id)));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(booking.id)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> CoreResult<Booking> {
        let mut bookings = self.bookings.write().await;
        let booking = bookings
            .get_mut(&id)
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", id)))?;
        booking.update_status(status);
        Ok(booking.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn slot(provider: &str, offset_hours: i64) -> AvailabilitySlot {
        let start = Utc::now() + Duration::hours(offset_hours);
        AvailabilitySlot::new(provider, start, start + Duration::hours(1))
    }

    #[tokio::test]
    async fn test_slot_crud() {
        let repo = InMemoryAvailabilityRepository::new();
        let late = slot("provider-1", 5);
        let early = slot("provider-1", 1);
        repo.create_slot(&late).await.unwrap();
        repo.create_slot(&early).await.unwrap();
        repo.create_slot(&slot("provider-2", 1)).await.unwrap();

        let listed = repo.list_slots("provider-1").await.unwrap();
        assert_eq!(listed, vec![early.clone(), late.clone()]);

        let longer = early.with_times(early.start_time, early.end_time + Duration::minutes(30));
        repo.update_slot(&longer).await.unwrap();
        assert_eq!(repo.get_slot(early.id).await.unwrap(), Some(longer));

        repo.delete_slot(late.id).await.unwrap();
        assert!(repo.get_slot(late.id).await.unwrap().is_none());
        assert!(matches!(repo.delete_slot(late.id).await, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_and_duplicate() {
        let repo = InMemoryAvailabilityRepository::new();
        let a = slot("provider-1", 1);
        repo.create_slot(&a).await.unwrap();
        assert!(matches!(repo.create_slot(&a).await, Err(CoreError::ValidationError(_))));

        let mut inverted = slot("provider-1", 3);
        inverted.end_time = inverted.start_time - Duration::hours(1);
        assert!(matches!(repo.create_slot(&inverted).await, Err(CoreError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_update_unknown_slot() {
        let repo = InMemoryAvailabilityRepository::new();
        let result = repo.update_slot(&slot("provider-1", 1)).await;
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_set_booked() {
        let a = slot("provider-1", 1);
        let repo = InMemoryAvailabilityRepository::with_slots(vec![a.clone()]);
        let booking_id = Uuid::new_v4();

        repo.set_booked(a.id, true, Some(booking_id)).await.unwrap();
        let booked = repo.get_slot(a.id).await.unwrap().unwrap();
        assert!(booked.is_booked);
        assert_eq!(booked.booking_id, Some(booking_id));

        repo.set_booked(a.id, false, None).await.unwrap();
        assert!(!repo.get_slot(a.id).await.unwrap().unwrap().is_booked);
    }

    #[tokio::test]
    async fn test_booking_status_update() {
        let repo = InMemoryBookingRepository::new();
        let now = Utc::now();
        let booking = Booking::new(
            "provider-1".to_string(),
            None,
            "Ada".to_string(),
            "ada@example.com".to_string(),
            now,
            now + Duration::hours(1),
        );
        let id = repo.create_booking(&booking).await.unwrap();

        let cancelled = repo.update_booking_status(id, BookingStatus::Cancelled).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());

        let missing = repo.update_booking_status(Uuid::new_v4(), BookingStatus::Cancelled).await;
        assert!(matches!(missing, Err(CoreError::NotFound(_))));
    }
}

use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CancellationRequestedEvent {
    pub booking_id: Uuid,
    pub expires_at: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub provider_id: String,
    pub availability_id: Option<Uuid>,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SlotsSyncedEvent {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub timestamp: i64,
}

/// Everything the server broadcasts to in-process listeners.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerEvent {
    CancellationRequested(CancellationRequestedEvent),
    BookingCancelled(BookingCancelledEvent),
    SlotsSynced(SlotsSyncedEvent),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::CancellationRequested(_) => "cancellation.requested",
            ServerEvent::BookingCancelled(_) => "booking.cancelled",
            ServerEvent::SlotsSynced(_) => "availability.synced",
        }
    }
}

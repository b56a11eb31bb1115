//! Guest self-service cancellation guarded by an emailed verification code.
//!
//! A guest asks for a code for `(booking, email)`, receives a 6-digit code and
//! has a limited number of attempts before it expires. Successful verification
//! cancels the booking and reopens its availability slot.

use std::sync::Arc;
use chrono::{DateTime, Duration, Utc};
use kairos_shared::models::{BookingCancelledEvent, CancellationRequestedEvent, ServerEvent};
use kairos_shared::Masked;
use rand::Rng;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::code_store::{CancellationCode, CodeCheck, CodeKey, CodeStore};
use crate::notification::Notifier;
use crate::repository::{AvailabilityRepository, BookingRepository};
use crate::{Booking, BookingStatus, CoreError};

pub const DEFAULT_CODE_TTL_MINUTES: i64 = 15;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct CancellationPolicy {
    pub code_ttl: Duration,
    pub max_attempts: u32,
}

impl Default for CancellationPolicy {
    fn default() -> Self {
        Self {
            code_ttl: Duration::minutes(DEFAULT_CODE_TTL_MINUTES),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CancellationError {
    #[error("Booking not found: {0}")]
    BookingNotFound(Uuid),

    #[error("Email does not match the booking")]
    EmailMismatch,

    #[error("Serial key does not match the booking")]
    SerialKeyMismatch,

    #[error("Booking is already cancelled")]
    AlreadyCancelled,

    #[error("Booking is already completed")]
    AlreadyCompleted,

    #[error("No cancellation request found")]
    NoRequest,

    #[error("Verification code has expired")]
    Expired,

    #[error("Too many failed attempts, request a new code")]
    TooManyAttempts,

    #[error("Invalid verification code, {remaining} attempts remaining")]
    InvalidCode { remaining: u32 },

    #[error(transparent)]
    Store(#[from] CoreError),
}

pub type CancellationResult<T> = Result<T, CancellationError>;

pub struct CancellationService {
    codes: Arc<dyn CodeStore>,
    bookings: Arc<dyn BookingRepository>,
    slots: Arc<dyn AvailabilityRepository>,
    notifier: Arc<dyn Notifier>,
    events: Option<broadcast::Sender<ServerEvent>>,
    policy: CancellationPolicy,
}

impl CancellationService {
    pub fn new(
        codes: Arc<dyn CodeStore>,
        bookings: Arc<dyn BookingRepository>,
        slots: Arc<dyn AvailabilityRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            codes,
            bookings,
            slots,
            notifier,
            events: None,
            policy: CancellationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: CancellationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, events: broadcast::Sender<ServerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &CancellationPolicy {
        &self.policy
    }

    /// Issue a fresh code for `(booking_id, guest_email)`, replacing any earlier one.
    /// Returns the code's expiry.
    pub async fn request_cancellation(
        &self,
        booking_id: Uuid,
        guest_email: &str,
        serial_key: Option<&str>,
    ) -> CancellationResult<DateTime<Utc>> {
        let booking = self.load_booking(booking_id).await?;

        if !booking.email_matches(guest_email) {
            return Err(CancellationError::EmailMismatch);
        }

        if let (Some(given), Some(expected)) = (serial_key, booking.serial_key.as_deref()) {
            if given.trim() != expected {
                return Err(CancellationError::SerialKeyMismatch);
            }
        }

        match booking.status {
            BookingStatus::Cancelled => return Err(CancellationError::AlreadyCancelled),
            BookingStatus::Completed => return Err(CancellationError::AlreadyCompleted),
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let code = generate_code();
        let expires_at = Utc::now() + self.policy.code_ttl;

        self.codes
            .put(CancellationCode {
                booking_id,
                guest_email: CodeKey::new(booking_id, guest_email).guest_email,
                code: code.clone(),
                expires_at,
                attempts: 0,
            })
            .await?;

        info!("Cancellation requested for booking {} by {}", booking_id, Masked::new(guest_email));

        if let Err(e) = self.notifier.send_cancellation_code(&booking, &code, expires_at).await {
            warn!("Failed to send cancellation code for booking {}: {}", booking_id, e);
        }

        self.publish(ServerEvent::CancellationRequested(CancellationRequestedEvent {
            booking_id,
            expires_at: expires_at.timestamp(),
            timestamp: Utc::now().timestamp(),
        }));

        Ok(expires_at)
    }

    /// Check a guest-supplied code and cancel the booking when it matches.
    pub async fn verify_cancellation(
        &self,
        booking_id: Uuid,
        guest_email: &str,
        code: &str,
    ) -> CancellationResult<Booking> {
        let key = CodeKey::new(booking_id, guest_email);

        let check = self
            .codes
            .check_and_record_attempt(&key, code.trim(), Utc::now(), self.policy.max_attempts)
            .await?;

        match check {
            CodeCheck::Matched(_) => {}
            CodeCheck::Missing => return Err(CancellationError::NoRequest),
            CodeCheck::Expired => return Err(CancellationError::Expired),
            CodeCheck::Exhausted => return Err(CancellationError::TooManyAttempts),
            CodeCheck::Mismatch { remaining } => {
                debug!("Invalid cancellation code for booking {}, {} attempts left", booking_id, remaining);
                return Err(CancellationError::InvalidCode { remaining });
            }
        }

        // The provider may have closed the booking since the code was issued
        let current = self.load_booking(booking_id).await?;
        match current.status {
            BookingStatus::Cancelled => return Err(CancellationError::AlreadyCancelled),
            BookingStatus::Completed => return Err(CancellationError::AlreadyCompleted),
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let booking = self
            .bookings
            .update_booking_status(booking_id, BookingStatus::Cancelled)
            .await
            .map_err(|e| match e {
                CoreError::NotFound(_) => CancellationError::BookingNotFound(booking_id),
                other => CancellationError::Store(other),
            })?;

        if let Some(slot_id) = booking.availability_id {
            if let Err(e) = self.slots.set_booked(slot_id, false, None).await {
                warn!("Booking {} cancelled but slot {} could not be reopened: {}", booking_id, slot_id, e);
            }
        }

        info!("Booking {} cancelled by guest", booking_id);

        if let Err(e) = self.notifier.send_cancellation_confirmation(&booking).await {
            warn!("Failed to send cancellation confirmation for booking {}: {}", booking_id, e);
        }

        self.publish(ServerEvent::BookingCancelled(BookingCancelledEvent {
            booking_id,
            provider_id: booking.provider_id.clone(),
            availability_id: booking.availability_id,
            timestamp: Utc::now().timestamp(),
        }));

        Ok(booking)
    }

    /// Remove every expired code, whether or not anyone tried to verify it.
    pub async fn sweep_expired(&self) -> CancellationResult<usize> {
        Ok(self.codes.purge_expired(Utc::now()).await?)
    }

    /// Start the periodic sweep. The task lives as long as the returned handle.
    pub fn spawn_sweeper(&self, period: std::time::Duration) -> SweeperHandle {
        let codes = self.codes.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                match codes.purge_expired(Utc::now()).await {
                    Ok(0) => {}
                    Ok(removed) => info!("Swept {} expired cancellation codes", removed),
                    Err(e) => warn!("Cancellation code sweep failed: {}", e),
                }
            }
        });
        SweeperHandle { handle }
    }

    async fn load_booking(&self, booking_id: Uuid) -> CancellationResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or(CancellationError::BookingNotFound(booking_id))
    }

    fn publish(&self, event: ServerEvent) {
        if let Some(tx) = &self.events {
            // No subscribers is fine
            let _ = tx.send(event);
        }
    }
}

/// Owns the background sweep task; stopping or dropping the handle ends it.
pub struct SweeperHandle {
    handle: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000u32).to_string()
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use kairos_shared::Masked;
use tracing::info;
use crate::{Booking, CoreResult};

/// Outbound guest notifications. Callers treat every send as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a cancellation verification code to the guest
    async fn send_cancellation_code(
        &self,
        booking: &Booking,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()>;

    /// Confirm to the guest that the booking was cancelled
    async fn send_cancellation_confirmation(&self, booking: &Booking) -> CoreResult<()>;
}

/// Notifier that only writes to the log. Codes stay masked unless `reveal_codes`
/// is set, which is meant for local development without a mail relay.
pub struct LogNotifier {
    reveal_codes: bool,
}

impl LogNotifier {
    pub fn new(reveal_codes: bool) -> Self {
        Self { reveal_codes }
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(false)
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_cancellation_code(
        &self,
        booking: &Booking,
        code: &str,
        expires_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        if self.reveal_codes {
            info!(
                "Cancellation code for booking {} ({}): {} (expires {})",
                booking.id,
                Masked::new(&booking.guest_email),
                code,
                expires_at
            );
        } else {
            info!(
                "Cancellation code sent for booking {} to {} (expires {})",
                booking.id,
                Masked::new(&booking.guest_email),
                expires_at
            );
        }
        Ok(())
    }

    async fn send_cancellation_confirmation(&self, booking: &Booking) -> CoreResult<()> {
        info!(
            "Cancellation confirmation sent for booking {} to {}",
            booking.id,
            Masked::new(&booking.guest_email)
        );
        Ok(())
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use kairos_core::repository::BookingRepository;
use kairos_core::{Booking, BookingStatus, CoreError, CoreResult};
use crate::{backend, StoreError};

const BOOKING_COLUMNS: &str = "id, provider_id, availability_id, guest_name, guest_email, serial_key, \
                               start_time, end_time, status, cancelled_at, created_at, updated_at";

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    provider_id: String,
    availability_id: Option<Uuid>,
    guest_name: String,
    guest_email: String,
    serial_key: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    status: String,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        let status = BookingStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("booking {} has status '{}'", row.id, row.status)))?;

        Ok(Booking {
            id: row.id,
            provider_id: row.provider_id,
            availability_id: row.availability_id,
            guest_name: row.guest_name,
            guest_email: row.guest_email,
            serial_key: row.serial_key,
            start_time: row.start_time,
            end_time: row.end_time,
            status,
            cancelled_at: row.cancelled_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> CoreResult<Uuid> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, provider_id, availability_id, guest_name, guest_email, serial_key, start_time, end_time, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.provider_id)
        .bind(booking.availability_id)
        .bind(&booking.guest_name)
        .bind(&booking.guest_email)
        .bind(&booking.serial_key)
        .bind(booking.start_time)
        .bind(booking.end_time)
        .bind(booking.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(booking.id)
    }

    async fn get_booking(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(Booking::try_from).transpose().map_err(backend)
    }

    async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> CoreResult<Booking> {
        let sql = format!(
            r#"
            UPDATE bookings
            SET status = $2,
                cancelled_at = CASE WHEN $2 = 'cancelled' THEN NOW() ELSE cancelled_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOKING_COLUMNS
        );
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?
            .ok_or_else(|| CoreError::NotFound(format!("Booking {}", id)))?;

        Booking::try_from(row).map_err(backend)
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;
use kairos_core::repository::AvailabilityRepository;
use kairos_core::{AvailabilitySlot, CoreError, CoreResult};
use crate::backend;

const SLOT_COLUMNS: &str = "id, provider_id, title, start_time, end_time, duration_minutes, \
                            is_booked, is_recurring, recurrence_rule, booking_id";

pub struct StoreAvailabilityRepository {
    pool: PgPool,
}

impl StoreAvailabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SlotRow {
    id: Uuid,
    provider_id: String,
    title: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_minutes: i64,
    is_booked: bool,
    is_recurring: bool,
    recurrence_rule: Option<String>,
    booking_id: Option<Uuid>,
}

impl From<SlotRow> for AvailabilitySlot {
    fn from(row: SlotRow) -> Self {
        AvailabilitySlot {
            id: row.id,
            provider_id: row.provider_id,
            title: row.title,
            start_time: row.start_time,
            end_time: row.end_time,
            duration_minutes: row.duration_minutes,
            is_booked: row.is_booked,
            is_recurring: row.is_recurring,
            recurrence_rule: row.recurrence_rule,
            booking_id: row.booking_id,
        }
    }
}

#[async_trait]
impl AvailabilityRepository for StoreAvailabilityRepository {
    async fn list_slots(&self, provider_id: &str) -> CoreResult<Vec<AvailabilitySlot>> {
        let sql = format!(
            "SELECT {} FROM availability_slots WHERE provider_id = $1 ORDER BY start_time",
            SLOT_COLUMNS
        );
        let rows = sqlx::query_as::<_, SlotRow>(&sql)
            .bind(provider_id)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;

        Ok(rows.into_iter().map(AvailabilitySlot::from).collect())
    }

    async fn get_slot(&self, id: Uuid) -> CoreResult<Option<AvailabilitySlot>> {
        let sql = format!("SELECT {} FROM availability_slots WHERE id = $1", SLOT_COLUMNS);
        let row = sqlx::query_as::<_, SlotRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.map(AvailabilitySlot::from))
    }

    async fn create_slot(&self, slot: &AvailabilitySlot) -> CoreResult<AvailabilitySlot> {
        slot.validate().map_err(CoreError::ValidationError)?;

        let sql = format!(
            r#"
            INSERT INTO availability_slots
                (id, provider_id, title, start_time, end_time, duration_minutes, is_booked, is_recurring, recurrence_rule, booking_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            SLOT_COLUMNS
        );
        let row = sqlx::query_as::<_, SlotRow>(&sql)
            .bind(slot.id)
            .bind(&slot.provider_id)
            .bind(&slot.title)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.duration_minutes)
            .bind(slot.is_booked)
            .bind(slot.is_recurring)
            .bind(&slot.recurrence_rule)
            .bind(slot.booking_id)
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;

        Ok(row.into())
    }

    async fn update_slot(&self, slot: &AvailabilitySlot) -> CoreResult<AvailabilitySlot> {
        slot.validate().map_err(CoreError::ValidationError)?;

        let sql = format!(
            r#"
            UPDATE availability_slots
            SET title = $2, start_time = $3, end_time = $4, duration_minutes = $5,
                is_recurring = $6, recurrence_rule = $7, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            SLOT_COLUMNS
        );
        // Booking state is owned by set_booked and never overwritten here
        let row = sqlx::query_as::<_, SlotRow>(&sql)
            .bind(slot.id)
            .bind(&slot.title)
            .bind(slot.start_time)
            .bind(slot.end_time)
            .bind(slot.duration_minutes)
            .bind(slot.is_recurring)
            .bind(&slot.recurrence_rule)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        row.map(AvailabilitySlot::from)
            .ok_or_else(|| CoreError::NotFound(format!("Slot {}", slot.id)))
    }

    async fn delete_slot(&self, id: Uuid) -> CoreResult<()> {
        let result = sqlx::query("DELETE FROM availability_slots WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Slot {}", id)));
        }
        Ok(())
    }

    async fn set_booked(&self, id: Uuid, is_booked: bool, booking_id: Option<Uuid>) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE availability_slots SET is_booked = $2, booking_id = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_booked)
        .bind(booking_id)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::NotFound(format!("Slot {}", id)));
        }
        Ok(())
    }
}

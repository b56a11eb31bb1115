use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Duration, Utc};

/// Tolerance between `duration_minutes` and the span `end_time - start_time`.
pub const DURATION_TOLERANCE_MINUTES: i64 = 1;

/// A provider availability slot: a bookable span of time, recurring or one-off.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySlot {
    pub id: Uuid,
    pub provider_id: String,
    #[serde(default)]
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_minutes: i64,
    #[serde(default)]
    pub is_booked: bool,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurrence_rule: Option<String>,
    #[serde(default)]
    pub booking_id: Option<Uuid>,
}

impl AvailabilitySlot {
    /// New open slot with a client-generated id.
    pub fn new(provider_id: impl Into<String>, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: provider_id.into(),
            title: None,
            start_time,
            end_time,
            duration_minutes: (end_time - start_time).num_minutes(),
            is_booked: false,
            is_recurring: false,
            recurrence_rule: None,
            booking_id: None,
        }
    }

    pub fn span_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }

    /// Same slot with new bounds; the duration follows the new span.
    pub fn with_times(&self, start_time: DateTime<Utc>, end_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time,
            duration_minutes: (end_time - start_time).num_minutes(),
            ..self.clone()
        }
    }

    pub fn shifted_by(&self, offset: Duration) -> Self {
        Self {
            start_time: self.start_time + offset,
            end_time: self.end_time + offset,
            ..self.clone()
        }
    }

    /// Structural validation shared by every slot command.
    pub fn validate(&self) -> Result<(), String> {
        if self.provider_id.trim().is_empty() {
            return Err("provider id is required".to_string());
        }
        if self.start_time >= self.end_time {
            return Err("start time must be before end time".to_string());
        }
        if (self.duration_minutes - self.span_minutes()).abs() > DURATION_TOLERANCE_MINUTES {
            return Err(format!(
                "duration {} min does not match time span {} min",
                self.duration_minutes,
                self.span_minutes()
            ));
        }
        Ok(())
    }
}

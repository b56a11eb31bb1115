use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use kairos_calendar::{Change, SaveResult};
use kairos_core::AvailabilitySlot;
use kairos_shared::models::{ServerEvent, SlotsSyncedEvent};
use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSlotsQuery {
    pub provider_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSlotRequest {
    /// Client-generated ids are kept so offline edits can refer to the slot.
    pub id: Option<Uuid>,
    pub provider_id: String,
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSlotRequest {
    pub title: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub is_recurring: bool,
    pub recurrence_rule: Option<String>,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/availability", get(list_slots).post(create_slot))
        .route("/availability/changes", post(save_changes))
        .route("/availability/{id}", put(update_slot).delete(delete_slot))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /availability?providerId=
async fn list_slots(
    State(state): State<AppState>,
    Query(query): Query<ListSlotsQuery>,
) -> Result<Json<Vec<AvailabilitySlot>>, AppError> {
    let slots = state
        .slot_repo
        .list_slots(&query.provider_id)
        .await
        .map_err(AppError::core)?;
    Ok(Json(slots))
}

/// POST /availability
async fn create_slot(
    State(state): State<AppState>,
    Json(req): Json<CreateSlotRequest>,
) -> Result<(StatusCode, Json<AvailabilitySlot>), AppError> {
    let mut slot = AvailabilitySlot::new(req.provider_id, req.start_time, req.end_time);
    if let Some(id) = req.id {
        slot.id = id;
    }
    slot.title = req.title;
    slot.is_recurring = req.is_recurring;
    slot.recurrence_rule = req.recurrence_rule;

    let created = state.slot_repo.create_slot(&slot).await.map_err(AppError::core)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// PUT /availability/{id}
async fn update_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<Uuid>,
    Json(req): Json<UpdateSlotRequest>,
) -> Result<Json<AvailabilitySlot>, AppError> {
    let existing = state
        .slot_repo
        .get_slot(slot_id)
        .await
        .map_err(AppError::core)?
        .ok_or_else(|| AppError::NotFoundError(format!("Slot {} not found", slot_id)))?;

    let mut slot = existing.with_times(req.start_time, req.end_time);
    slot.title = req.title;
    slot.is_recurring = req.is_recurring;
    slot.recurrence_rule = req.recurrence_rule;

    let updated = state.slot_repo.update_slot(&slot).await.map_err(AppError::core)?;
    Ok(Json(updated))
}

/// DELETE /availability/{id}
async fn delete_slot(
    State(state): State<AppState>,
    Path(slot_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.slot_repo.delete_slot(slot_id).await.map_err(AppError::core)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /availability/changes
/// Persist a client's pending change set. Partial failures come back in
/// `failed`; only an overlapping save is an error.
async fn save_changes(
    State(state): State<AppState>,
    Json(changes): Json<Vec<Change>>,
) -> Result<Json<SaveResult>, AppError> {
    let result = state
        .synchronizer
        .save_changes(&changes)
        .await
        .map_err(AppError::sync)?;

    if !changes.is_empty() {
        let _ = state.sse_tx.send(ServerEvent::SlotsSynced(SlotsSyncedEvent {
            created: result.created.len(),
            updated: result.updated.len(),
            deleted: result.deleted.len(),
            failed: result.failed.len(),
            timestamp: Utc::now().timestamp(),
        }));
    }

    Ok(Json(result))
}

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;
use kairos_core::Booking;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCancellationRequest {
    pub guest_email: String,
    pub serial_key: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCancellationResponse {
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCancellationRequest {
    pub guest_email: String,
    pub verification_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyCancellationResponse {
    pub message: String,
    pub booking: Booking,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/booking/{id}/cancellation/request", post(request_cancellation))
        .route("/booking/{id}/cancellation/verify", post(verify_cancellation))
}

/// POST /booking/{id}/cancellation/request
/// Email a one-time code to the guest
async fn request_cancellation(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<RequestCancellationRequest>,
) -> Result<Json<RequestCancellationResponse>, AppError> {
    let expires_at = state
        .cancellation
        .request_cancellation(booking_id, &req.guest_email, req.serial_key.as_deref())
        .await
        .map_err(AppError::cancellation)?;

    info!("Cancellation code issued for booking {}", booking_id);
    Ok(Json(RequestCancellationResponse {
        message: "Verification code sent to your email".to_string(),
        expires_at,
    }))
}

/// POST /booking/{id}/cancellation/verify
/// Check the code and cancel the booking
async fn verify_cancellation(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<VerifyCancellationRequest>,
) -> Result<Json<VerifyCancellationResponse>, AppError> {
    let booking = state
        .cancellation
        .verify_cancellation(booking_id, &req.guest_email, &req.verification_code)
        .await
        .map_err(AppError::cancellation)?;

    Ok(Json(VerifyCancellationResponse {
        message: "Booking cancelled successfully".to_string(),
        booking,
    }))
}

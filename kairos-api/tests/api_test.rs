use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;
use uuid::Uuid;
use kairos_api::{app, AppState};
use kairos_calendar::{Change, ChangesSynchronizer};
use kairos_core::repository::{AvailabilityRepository, BookingRepository};
use kairos_core::{AvailabilitySlot, Booking, CancellationService, CoreResult, InMemoryCodeStore, Notifier};
use kairos_shared::models::ServerEvent;
use kairos_store::{InMemoryAvailabilityRepository, InMemoryBookingRepository};

/// Captures the codes that would have been emailed.
#[derive(Default)]
struct Outbox {
    codes: Mutex<Vec<String>>,
}

impl Outbox {
    fn last_code(&self) -> String {
        self.codes.lock().unwrap().last().cloned().unwrap()
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn send_cancellation_code(&self, _booking: &Booking, code: &str, _expires_at: DateTime<Utc>) -> CoreResult<()> {
        self.codes.lock().unwrap().push(code.to_string());
        Ok(())
    }

    async fn send_cancellation_confirmation(&self, _booking: &Booking) -> CoreResult<()> {
        Ok(())
    }
}

struct TestApp {
    router: Router,
    slots: Arc<InMemoryAvailabilityRepository>,
    outbox: Arc<Outbox>,
    events: broadcast::Receiver<ServerEvent>,
    booking: Booking,
    slot: AvailabilitySlot,
}

async fn setup() -> TestApp {
    let start = Utc::now() + Duration::days(2);
    let mut slot = AvailabilitySlot::new("provider-1", start, start + Duration::hours(1));
    slot.is_booked = true;

    let mut booking = Booking::new(
        "provider-1".to_string(),
        Some(slot.id),
        "Ada Lovelace".to_string(),
        "ada@example.com".to_string(),
        slot.start_time,
        slot.end_time,
    );
    booking.serial_key = Some("SN-42".to_string());
    slot.booking_id = Some(booking.id);

    let slots = Arc::new(InMemoryAvailabilityRepository::with_slots(vec![slot.clone()]));
    let bookings = Arc::new(InMemoryBookingRepository::new());
    bookings.create_booking(&booking).await.unwrap();

    let outbox = Arc::new(Outbox::default());
    let (sse_tx, events) = broadcast::channel(16);

    let cancellation = CancellationService::new(
        Arc::new(InMemoryCodeStore::new()),
        bookings,
        slots.clone(),
        outbox.clone(),
    )
    .with_events(sse_tx.clone());

    let state = AppState {
        slot_repo: slots.clone(),
        cancellation: Arc::new(cancellation),
        synchronizer: Arc::new(ChangesSynchronizer::new(slots.clone())),
        sse_tx,
    };

    TestApp {
        router: app(state),
        slots,
        outbox,
        events,
        booking,
        slot,
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let (status, body) = send(&app.router, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_cancellation_flow() {
    let mut app = setup().await;
    let id = app.booking.id;

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/request", id),
        Some(json!({ "guestEmail": "ADA@example.com", "serialKey": "SN-42" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].as_str().unwrap().contains("sent"));
    assert!(body["expiresAt"].is_string());

    let code = app.outbox.last_code();
    assert_eq!(code.len(), 6);

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/verify", id),
        Some(json!({ "guestEmail": "ada@example.com", "verificationCode": code })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booking"]["status"], "cancelled");
    assert!(body["booking"].get("serialKey").is_none());

    let slot = app.slots.get_slot(app.slot.id).await.unwrap().unwrap();
    assert!(!slot.is_booked);
    assert!(slot.booking_id.is_none());

    let names: Vec<_> = std::iter::from_fn(|| app.events.try_recv().ok()).map(|e| e.name()).collect();
    assert_eq!(names, vec!["cancellation.requested", "booking.cancelled"]);

    // The code is single use
    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/verify", id),
        Some(json!({ "guestEmail": "ada@example.com", "verificationCode": code })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cancellation_request_errors() {
    let app = setup().await;

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/request", Uuid::new_v4()),
        Some(json!({ "guestEmail": "ada@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/request", app.booking.id),
        Some(json!({ "guestEmail": "someone@example.com" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/request", app.booking.id),
        Some(json!({ "guestEmail": "ada@example.com", "serialKey": "SN-0" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_code_reports_remaining_attempts() {
    let app = setup().await;
    let id = app.booking.id;

    send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/request", id),
        Some(json!({ "guestEmail": "ada@example.com" })),
    )
    .await;
    let wrong = if app.outbox.last_code() == "000000" { "111111" } else { "000000" };

    let (status, body) = send(
        &app.router,
        Method::POST,
        &format!("/booking/{}/cancellation/verify", id),
        Some(json!({ "guestEmail": "ada@example.com", "verificationCode": wrong })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("2 attempts remaining"));
}

#[tokio::test]
async fn test_slot_crud_routes() {
    let app = setup().await;
    let start = Utc::now() + Duration::days(3);

    let (status, created) = send(
        &app.router,
        Method::POST,
        "/availability",
        Some(json!({
            "providerId": "provider-1",
            "title": "Consultation",
            "startTime": start,
            "endTime": start + Duration::minutes(30),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["durationMinutes"], 30);
    let id = created["id"].as_str().unwrap().to_string();

    let (status, updated) = send(
        &app.router,
        Method::PUT,
        &format!("/availability/{}", id),
        Some(json!({
            "title": "Long consultation",
            "startTime": start,
            "endTime": start + Duration::minutes(90),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["durationMinutes"], 90);

    let (status, listed) = send(&app.router, Method::GET, "/availability?providerId=provider-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 2);

    let (status, _) = send(&app.router, Method::DELETE, &format!("/availability/{}", id), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app.router, Method::DELETE, &format!("/availability/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_slot_is_rejected() {
    let app = setup().await;
    let start = Utc::now();

    let (status, body) = send(
        &app.router,
        Method::POST,
        "/availability",
        Some(json!({
            "providerId": "provider-1",
            "startTime": start,
            "endTime": start - Duration::hours(1),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_save_changes_reports_partial_failure() {
    let mut app = setup().await;
    let start = Utc::now() + Duration::days(4);
    let fresh = AvailabilitySlot::new("provider-1", start, start + Duration::hours(1));
    let ghost = AvailabilitySlot::new("provider-1", start, start + Duration::hours(1));

    let changes = vec![Change::create(fresh.clone()), Change::delete(ghost)];
    let (status, body) = send(
        &app.router,
        Method::POST,
        "/availability/changes",
        Some(serde_json::to_value(&changes).unwrap()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["created"].as_array().unwrap().len(), 1);
    assert_eq!(body["failed"].as_array().unwrap().len(), 1);
    assert!(app.slots.get_slot(fresh.id).await.unwrap().is_some());

    match app.events.try_recv().unwrap() {
        ServerEvent::SlotsSynced(event) => {
            assert_eq!(event.created, 1);
            assert_eq!(event.failed, 1);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

// HTTP tests for the marketplace API
// Each test drives the full router over the in-memory store

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::actor::ACTOR_HEADER;
use crate::app::create_router;
use crate::test_support::TestHarness;

// ============================================================================
// Test Helpers
// ============================================================================

fn create_test_server(h: &TestHarness) -> TestServer {
    TestServer::new(create_router(h.state.clone())).unwrap()
}

fn actor_header(user_id: Uuid) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static(ACTOR_HEADER),
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    )
}

fn booking_payload(service_id: Uuid) -> Value {
    json!({
        "service_id": service_id,
        "booking_date": "2025-03-05T10:00:00Z",
        "notes": "Ring twice",
        "address": "12 Harbour Road"
    })
}

async fn post_booking(server: &TestServer, client: Uuid, service_id: Uuid) -> Value {
    let (name, value) = actor_header(client);
    let response = server
        .post("/api/bookings")
        .add_header(name, value)
        .json(&booking_payload(service_id))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    response.json()
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let h = TestHarness::new();
    let server = create_test_server(&h);

    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({ "status": "ok" }));
}

// ============================================================================
// Bookings
// ============================================================================

#[tokio::test]
async fn test_create_booking_returns_created_with_payment() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let server = create_test_server(&h);

    let body = post_booking(&server, client, service.id).await;

    assert_eq!(body["status"], "pending");
    assert_eq!(body["client_id"], client.to_string());
    assert_eq!(body["provider_id"], service.provider_id.to_string());
    assert_eq!(body["address"], "12 Harbour Road");
    assert_eq!(body["payment"]["status"], "pending");
    assert!(body["id"].as_str().is_some());
}

#[tokio::test]
async fn test_missing_actor_header_is_unauthorized() {
    let h = TestHarness::new();
    let service = h.service();
    let server = create_test_server(&h);

    let response = server.post("/api/bookings").json(&booking_payload(service.id)).await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "UNAUTHENTICATED");
    assert!(body["timestamp"].as_str().is_some());
}

#[tokio::test]
async fn test_unknown_booking_is_not_found() {
    let h = TestHarness::new();
    let client = h.user("Client");
    let server = create_test_server(&h);

    let (name, value) = actor_header(client);
    let response = server
        .get(&format!("/api/bookings/{}", Uuid::new_v4()))
        .add_header(name, value)
        .await;

    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "NOT_FOUND");
    assert!(body["message"].as_str().unwrap().contains("Booking"));
}

#[tokio::test]
async fn test_booking_lifecycle_over_http() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let server = create_test_server(&h);

    let booking = post_booking(&server, client, service.id).await;
    let booking_id = booking["id"].as_str().unwrap().to_string();

    // only the provider may accept
    let (name, value) = actor_header(client);
    let response = server
        .post(&format!("/api/bookings/{}/accept", booking_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error_code"], "FORBIDDEN");

    let (name, value) = actor_header(service.provider_id);
    let response = server
        .post(&format!("/api/bookings/{}/accept", booking_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "accepted");

    // accepting twice is an illegal transition
    let (name, value) = actor_header(service.provider_id);
    let response = server
        .post(&format!("/api/bookings/{}/accept", booking_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error_code"], "INVALID_STATE");

    let (name, value) = actor_header(client);
    let response = server
        .patch(&format!("/api/bookings/{}/status", booking_id))
        .add_header(name, value)
        .json(&json!({ "status": "cancelled", "reason": "travelling" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let cancelled: Value = response.json();
    assert_eq!(cancelled["status"], "cancelled");
    assert_eq!(cancelled["cancellation_reason"], "travelling");

    let (name, value) = actor_header(service.provider_id);
    let response = server
        .get("/api/bookings")
        .add_query_param("role", "provider")
        .add_query_param("status", "cancelled")
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let listed: Vec<Value> = response.json();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], booking_id.as_str());
}

#[tokio::test]
async fn test_invalid_payload_reports_validation_details() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let server = create_test_server(&h);

    let mut payload = booking_payload(service.id);
    payload["end_date"] = json!("2025-03-05T09:00:00Z");

    let (name, value) = actor_header(client);
    let response = server.post("/api/bookings").add_header(name, value).json(&payload).await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error_code"], "VALIDATION_ERROR");
    assert!(body["details"]["reason"].as_str().is_some());
}

// ============================================================================
// Groups and waitlist
// ============================================================================

#[tokio::test]
async fn test_full_group_rejects_join_with_conflict() {
    let h = TestHarness::new();
    let service = h.service();
    h.group_settings(&service, 1, 2, rust_decimal_macros::dec!(10));
    let organizer = h.user("Organizer");
    let member = h.user("Member");
    let late = h.user("Late");
    let server = create_test_server(&h);

    let (name, value) = actor_header(organizer);
    let response = server
        .post("/api/groups")
        .add_header(name, value)
        .json(&json!({
            "service_id": service.id,
            "name": "Sunset sail",
            "max_participants": 2,
            "booking_date": "2025-03-08T17:00:00Z"
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let group: Value = response.json();
    assert_eq!(group["status"], "open");
    assert_eq!(group["participant_count"], 1);
    let group_id = group["id"].as_str().unwrap().to_string();

    let (name, value) = actor_header(member);
    let response = server
        .post(&format!("/api/groups/{}/join", group_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["status"], "confirmed");

    let (name, value) = actor_header(late);
    let response = server
        .post(&format!("/api/groups/{}/join", group_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error_code"], "CONFLICT");

    // outsiders see the count but not the members
    let (name, value) = actor_header(late);
    let response = server.get(&format!("/api/groups/{}", group_id)).add_header(name, value).await;
    let seen: Value = response.json();
    assert_eq!(seen["participant_count"], 2);
    assert!(seen.get("members").is_none());
}

#[tokio::test]
async fn test_waitlist_join_and_duplicate() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let server = create_test_server(&h);

    let payload = json!({
        "service_id": service.id,
        "preferred_date": "2025-03-07T00:00:00Z",
        "priority": 5
    });

    let (name, value) = actor_header(client);
    let response = server.post("/api/waitlist").add_header(name, value).json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let entry: Value = response.json();
    assert_eq!(entry["status"], "active");
    assert_eq!(entry["preferred_date"], "2025-03-07");

    let (name, value) = actor_header(client);
    let response = server.post("/api/waitlist").add_header(name, value).json(&payload).await;
    assert_eq!(response.status_code(), StatusCode::CONFLICT);

    let (name, value) = actor_header(service.provider_id);
    let response = server
        .get(&format!("/api/services/{}/waitlist", service.id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Vec<Value>>().len(), 1);
}

// ============================================================================
// Inbox
// ============================================================================

#[tokio::test]
async fn test_inbox_lists_and_marks_read() {
    let h = TestHarness::new();
    let service = h.service();
    let client = h.user("Client");
    let server = create_test_server(&h);

    post_booking(&server, client, service.id).await;

    let (name, value) = actor_header(service.provider_id);
    let response = server.get("/api/notifications").add_header(name, value).await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let inbox: Vec<Value> = response.json();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0]["kind"], "booking_requested");
    assert_eq!(inbox[0]["read"], false);
    let notification_id = inbox[0]["id"].as_str().unwrap().to_string();

    // someone else's notification is invisible
    let (name, value) = actor_header(client);
    let response = server
        .post(&format!("/api/notifications/{}/read", notification_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let (name, value) = actor_header(service.provider_id);
    let response = server
        .post(&format!("/api/notifications/{}/read", notification_id))
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>()["read"], true);

    let (name, value) = actor_header(service.provider_id);
    let response = server
        .get("/api/notifications")
        .add_query_param("unread_only", "true")
        .add_header(name, value)
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(response.json::<Vec<Value>>().is_empty());
}

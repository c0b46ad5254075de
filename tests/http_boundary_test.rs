// HTTP boundary: command dispatch, session identity and redeem links

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{at, date, time, Harness};
use nail_booking_core::models::{BookingStatus, ConfirmationType, Role};
use nail_booking_core::services::{IdentityResolver, StaticIdentityResolver};
use nail_booking_core::utils::messages;
use nail_booking_core::{booking_router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

fn app(h: &Harness, identity: &StaticIdentityResolver) -> Router {
    booking_router(AppState::new(h.service.clone(), Arc::new(identity.clone())))
}

async fn send(app: Router, request: Request<Body>) -> Value {
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn command(session: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/booking")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(id) = session {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", id));
    }
    builder.body(body.into()).unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_session_actor_books_slot() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let identity = StaticIdentityResolver::new();
    let (customer, actor) = h.customer("ana@example.com", "Ana").await;
    identity.insert("s-ana", actor).await;
    let slot = h.slot(date(2025, 3, 12), time(9, 0), time(9, 30)).await;

    let body = json!({"action": "bookSlot", "id": slot.id, "note": "french tips"}).to_string();
    let envelope = send(app(&h, &identity), command(Some("s-ana"), body)).await;

    assert_eq!(envelope["status"], true);
    assert_eq!(envelope["message"], messages::BOOKED);
    assert_eq!(envelope["content"]["id"], slot.id);
    assert_eq!(h.status_of(slot.id).await, BookingStatus::Pending);
    assert_eq!(
        h.store.booking(slot.id).await.unwrap().customer_id,
        Some(customer.id)
    );
}

#[tokio::test]
async fn test_malformed_command_is_a_failure_envelope() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let identity = StaticIdentityResolver::new();

    let envelope = send(app(&h, &identity), command(None, "{not json")).await;
    assert_eq!(envelope["status"], false);
    assert!(!envelope["message"].as_str().unwrap().is_empty());

    let unknown = json!({"action": "teleportBooking", "id": 1}).to_string();
    let envelope = send(app(&h, &identity), command(None, unknown)).await;
    assert_eq!(envelope["status"], false);
}

#[tokio::test]
async fn test_guest_denied_admin_command() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let identity = StaticIdentityResolver::new();
    let slot = h.slot(date(2025, 3, 12), time(9, 0), time(9, 30)).await;

    let body = json!({"action": "deleteBooking", "id": slot.id}).to_string();
    let envelope = send(app(&h, &identity), command(None, body)).await;

    assert_eq!(
        envelope,
        json!({"status": false, "message": messages::PERMISSION_DENIED, "content": {}})
    );
    assert!(h.store.booking(slot.id).await.is_some());
}

#[tokio::test]
async fn test_promoted_guest_is_remembered_for_session() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let identity = StaticIdentityResolver::new();
    let slot = h.slot(date(2025, 3, 12), time(9, 0), time(9, 30)).await;

    let body = json!({
        "action": "bookSlot",
        "id": slot.id,
        "guest": {"email": "walkin@example.com", "name": "Lia"}
    })
    .to_string();
    let envelope = send(app(&h, &identity), command(Some("s-guest"), body)).await;
    assert_eq!(envelope["status"], true);

    let remembered = identity.resolve("s-guest").await.unwrap();
    assert_eq!(remembered.role, Role::Anonymous);
    assert_eq!(remembered.email.as_deref(), Some("walkin@example.com"));

    // The same session now reads its own booking
    let body = json!({"action": "getBooking", "id": slot.id}).to_string();
    let envelope = send(app(&h, &identity), command(Some("s-guest"), body)).await;
    assert_eq!(envelope["status"], true);
    assert_eq!(envelope["content"]["status"], "PENDING");
}

#[tokio::test]
async fn test_accept_link_redeems_once() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let identity = StaticIdentityResolver::new();
    let (_, actor) = h.customer("ana@example.com", "Ana").await;
    let slot = h.slot(date(2025, 3, 12), time(9, 0), time(9, 30)).await;
    h.service.book_slot(&actor, slot.id, None, None).await.unwrap();

    let code = h
        .store
        .confirmations()
        .await
        .into_iter()
        .find(|token| token.confirmation_type == ConfirmationType::AcceptBooking)
        .unwrap()
        .code;
    let uri = format!("/booking/redeem/accept/{}", code);

    let first = send(app(&h, &identity), get(&uri)).await;
    assert_eq!(first["status"], true);
    assert_eq!(first["message"], messages::ACCEPTED);
    assert_eq!(h.status_of(slot.id).await, BookingStatus::Booked);

    let second = send(app(&h, &identity), get(&uri)).await;
    assert_eq!(second["status"], false);
    assert_eq!(second["message"], messages::INVALID_CONFIRMATION);
}

#[tokio::test]
async fn test_unknown_redeem_kind_is_a_failure_envelope() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let identity = StaticIdentityResolver::new();

    let envelope = send(app(&h, &identity), get("/booking/redeem/teleport/abc")).await;
    assert_eq!(envelope["status"], false);
    assert_eq!(envelope["content"], json!({}));
}

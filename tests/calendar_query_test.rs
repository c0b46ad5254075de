// Calendar projection, per-viewer visibility and loyalty coupon reads

mod common;

use common::{at, date, time, Harness};
use nail_booking_core::models::{Actor, BookingStatus};
use nail_booking_core::services::booking::BookingFilter;
use nail_booking_core::BookingError;
use serde_json::{json, Value};

fn statuses(day: &Value) -> Vec<&str> {
    day.as_array()
        .unwrap()
        .iter()
        .map(|view| view["status"].as_str().unwrap())
        .collect()
}

#[tokio::test]
async fn test_guest_sees_only_future_open_slots() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let (customer, _) = h.customer("ana@example.com", "Ana").await;

    h.slot(date(2025, 3, 5), time(9, 0), time(9, 30)).await;
    let open = h.slot(date(2025, 3, 12), time(10, 0), time(10, 30)).await;
    h.booking_with(date(2025, 3, 12), time(9, 0), BookingStatus::Booked, Some(customer.id))
        .await;
    h.booking_with(date(2025, 3, 13), time(9, 0), BookingStatus::Paused, None)
        .await;

    let reply = h
        .service
        .get_calendar(&Actor::guest(), 2025, 3)
        .await
        .unwrap();
    let days = reply.content.as_object().unwrap();
    assert_eq!(days.len(), 1);

    let day = days["20250312"].as_array().unwrap();
    assert_eq!(day.len(), 1);
    assert_eq!(day[0]["id"], open.id);
    assert_eq!(day[0]["editable"], false);
    // Guests never see customer details
    assert!(day[0].get("customer").is_none());
}

#[tokio::test]
async fn test_customer_sees_own_bookings_with_flags() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let (customer, actor) = h.customer("ana@example.com", "Ana").await;
    let (other, _) = h.customer("bea@example.com", "Bea").await;

    let mine = h
        .booking_with(date(2025, 3, 10), time(9, 0), BookingStatus::Booked, Some(customer.id))
        .await;
    h.booking_with(date(2025, 3, 10), time(11, 0), BookingStatus::Booked, Some(other.id))
        .await;

    let reply = h.service.get_calendar(&actor, 2025, 3).await.unwrap();
    let day = reply.content["20250310"].as_array().unwrap().clone();
    assert_eq!(day.len(), 1);

    let view = &day[0];
    assert_eq!(view["id"], mine.id);
    assert_eq!(view["confirmable"], true);
    assert_eq!(view["erasable"], true);
    assert_eq!(view["acceptable"], false);
    assert_eq!(view["customer"]["email"], "ana@example.com");
    assert_eq!(view["customer"]["id"], customer.id);
}

#[tokio::test]
async fn test_day_order_follows_status_priority() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let (customer, _) = h.customer("ana@example.com", "Ana").await;

    h.booking_with(date(2025, 3, 12), time(8, 0), BookingStatus::Cancelled, Some(customer.id))
        .await;
    h.booking_with(date(2025, 3, 12), time(9, 0), BookingStatus::Booked, Some(customer.id))
        .await;
    h.slot(date(2025, 3, 12), time(10, 0), time(10, 30)).await;

    let reply = h.service.get_calendar(&h.admin, 2025, 3).await.unwrap();
    assert_eq!(
        statuses(&reply.content["20250312"]),
        vec!["FREE", "BOOKED", "CANCELLED"]
    );

    let listed = h
        .service
        .list_bookings(
            &h.admin,
            BookingFilter {
                year: 2025,
                month: Some(3),
                day: Some(12),
            },
        )
        .await
        .unwrap();
    assert_eq!(statuses(&listed.content), vec!["FREE", "BOOKED", "CANCELLED"]);
}

#[tokio::test]
async fn test_calendar_rejects_invalid_month() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let err = h
        .service
        .get_calendar(&h.admin, 2025, 13)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Validation { .. }));
}

#[tokio::test]
async fn test_listing_is_admin_only() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let (_, actor) = h.customer("ana@example.com", "Ana").await;
    let filter = BookingFilter {
        year: 2025,
        month: None,
        day: None,
    };
    let err = h.service.list_bookings(&actor, filter).await.unwrap_err();
    assert_eq!(err, BookingError::PermissionDenied);
}

#[tokio::test]
async fn test_other_customers_booking_reads_as_missing() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let (_, actor) = h.customer("ana@example.com", "Ana").await;
    let (other, _) = h.customer("bea@example.com", "Bea").await;
    let hidden = h
        .booking_with(date(2025, 3, 12), time(9, 0), BookingStatus::Paused, Some(other.id))
        .await;

    let err = h.service.get_booking(&actor, hidden.id).await.unwrap_err();
    assert_eq!(err, BookingError::booking_not_found());

    let admin_view = h.service.get_booking(&h.admin, hidden.id).await.unwrap();
    assert_eq!(admin_view.content["status"], "PAUSED");
    assert_eq!(admin_view.content["other"], true);
}

#[tokio::test]
async fn test_internal_note_only_in_full_view() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let slot = h.slot(date(2025, 3, 12), time(9, 0), time(9, 30)).await;

    h.service
        .upsert_booking_note(&h.admin, slot.id, "  allergic to acetone ".into())
        .await
        .unwrap();

    let plain = h.service.get_booking(&h.admin, slot.id).await.unwrap();
    assert!(plain.content.get("internalNote").is_none());

    let full = h
        .service
        .get_all_booking_data(&h.admin, slot.id)
        .await
        .unwrap();
    assert_eq!(full.content["internalNote"], "allergic to acetone");
}

#[tokio::test]
async fn test_coupon_reads() {
    let h = Harness::new(at(2025, 3, 9, 10, 0)).await;
    let (customer, actor) = h.customer("ana@example.com", "Ana").await;
    let (other, _) = h.customer("bea@example.com", "Bea").await;

    let own = h.service.get_coupon(&actor, None).await.unwrap();
    assert_eq!(own.content, json!({"discount": 25, "count": 0, "tier": "min"}));

    let err = h
        .service
        .get_coupon(&actor, Some(other.id))
        .await
        .unwrap_err();
    assert_eq!(err, BookingError::PermissionDenied);

    let by_admin = h
        .service
        .get_coupon(&h.admin, Some(customer.id))
        .await
        .unwrap();
    assert_eq!(by_admin.content["count"], 0);
    // Created once, read twice
    assert_eq!(h.store.coupons().await.len(), 1);

    let err = h.service.get_coupon(&Actor::guest(), None).await.unwrap_err();
    assert_eq!(err, BookingError::PermissionDenied);
}

// Common test utilities shared across the integration tests
// Everything runs against the in-memory store with a pinned clock

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use nail_booking_core::app_config::BookingSettings;
use nail_booking_core::db::InMemoryBookingStore;
use nail_booking_core::models::{
    Actor, Booking, BookingStatus, MailType, NewBooking, NewUser, OutboundMail, Role, User,
};
use nail_booking_core::services::{BookingService, ChangeBroadcaster, LocalBroadcaster};
use nail_booking_core::utils::FixedClock;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::Receiver;

pub const BUSINESS_EMAIL: &str = "salon@example.com";

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn at(y: i32, m: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
    date(y, m, d).and_time(time(h, mi))
}

/// Next reload notice from the publishing task
pub async fn next_event(events: &mut Receiver<(String, Value)>) -> (String, Value) {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("no reload notice published")
        .expect("reload channel closed")
}

/// Assert the publishing task stays quiet
pub async fn assert_no_event(events: &mut Receiver<(String, Value)>) {
    let next = tokio::time::timeout(Duration::from_millis(50), events.recv()).await;
    assert!(next.is_err(), "unexpected reload notice: {:?}", next);
}

/// A booking service over a fresh in-memory store
pub struct Harness {
    pub store: Arc<InMemoryBookingStore>,
    pub service: Arc<BookingService<InMemoryBookingStore>>,
    pub clock: FixedClock,
    pub events: LocalBroadcaster,
    pub business: User,
    pub admin: Actor,
}

impl Harness {
    /// Harness whose clock reads `now`; the business inbox belongs to the admin
    pub async fn new(now: NaiveDateTime) -> Self {
        let store = Arc::new(InMemoryBookingStore::new());
        let business = store
            .seed_user(NewUser {
                email: BUSINESS_EMAIL.into(),
                role: Role::Admin,
                name: Some("Salon".into()),
                surname: None,
                phone: None,
            })
            .await;
        let admin = Actor::from(&business);

        let clock = FixedClock::new(now);
        let events = LocalBroadcaster::new(64);
        let settings = BookingSettings {
            business_email: BUSINESS_EMAIL.into(),
            ..BookingSettings::default()
        };
        let service = Arc::new(BookingService::new(
            store.clone(),
            ChangeBroadcaster::new(Arc::new(events.clone())),
            Arc::new(clock.clone()),
            settings,
        ));

        Self {
            store,
            service,
            clock,
            events,
            business,
            admin,
        }
    }

    pub async fn customer(&self, email: &str, name: &str) -> (User, Actor) {
        let user = self
            .store
            .seed_user(NewUser {
                email: email.into(),
                role: Role::Registered,
                name: Some(name.into()),
                surname: None,
                phone: None,
            })
            .await;
        let actor = Actor::from(&user);
        (user, actor)
    }

    pub async fn slot(&self, day: NaiveDate, start: NaiveTime, end: NaiveTime) -> Booking {
        self.store.seed_booking(NewBooking::slot(day, start, end)).await
    }

    pub async fn booking_with(
        &self,
        day: NaiveDate,
        start: NaiveTime,
        status: BookingStatus,
        customer_id: Option<i32>,
    ) -> Booking {
        self.store
            .seed_booking(NewBooking {
                date: day,
                start_time: start,
                end_time: start + chrono::Duration::minutes(30),
                status,
                customer_id,
                note: None,
                updated_by: None,
            })
            .await
    }

    pub async fn status_of(&self, booking_id: i32) -> BookingStatus {
        self.store.booking(booking_id).await.unwrap().status
    }

    pub async fn mails_of(&self, mail_type: MailType) -> Vec<OutboundMail> {
        self.store
            .mails()
            .await
            .into_iter()
            .filter(|mail| mail.mail_type == mail_type)
            .collect()
    }
}

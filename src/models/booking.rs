// Booking Database Model
// Slot lifecycle status, calendar ordering and per-viewer capability flags

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;

use super::user::{Actor, User};
use crate::schema::booking;

/// Booking lifecycle status
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Free,      // Open slot, no customer
    Pending,   // Claimed by a customer, waiting for the salon
    Booked,    // Accepted by the salon
    Confirmed, // Confirmed by the customer
    Completed, // Appointment took place
    Cancelled,
    Paused, // Removed from public availability
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 7] = [
        BookingStatus::Free,
        BookingStatus::Pending,
        BookingStatus::Booked,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::Paused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Free => "FREE",
            BookingStatus::Pending => "PENDING",
            BookingStatus::Booked => "BOOKED",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Paused => "PAUSED",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "FREE" => Ok(BookingStatus::Free),
            "PENDING" => Ok(BookingStatus::Pending),
            "BOOKED" => Ok(BookingStatus::Booked),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "PAUSED" => Ok(BookingStatus::Paused),
            _ => Err(format!("Invalid booking status: {}", s)),
        }
    }

    /// Position within a calendar day, most actionable first
    pub fn priority(&self) -> u8 {
        match self {
            BookingStatus::Free => 1,
            BookingStatus::Pending => 2,
            BookingStatus::Booked => 3,
            BookingStatus::Confirmed => 4,
            BookingStatus::Completed => 5,
            BookingStatus::Cancelled => 6,
            BookingStatus::Paused => 7,
        }
    }

    /// Statuses that only make sense with an assigned customer
    pub fn requires_customer(&self) -> bool {
        !matches!(
            self,
            BookingStatus::Free | BookingStatus::Paused | BookingStatus::Cancelled
        )
    }
}

text_column_enum!(BookingStatus);

/// Booking database model - queryable from database
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable, PartialEq,
)]
#[diesel(table_name = booking)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Booking {
    pub id: i32,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub customer_id: Option<i32>,
    pub note: Option<String>,
    pub updated_by: Option<i32>,
    pub updated_at: DateTime<Utc>,
}

/// New booking for insertion
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = booking)]
pub struct NewBooking {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub status: BookingStatus,
    pub customer_id: Option<i32>,
    pub note: Option<String>,
    pub updated_by: Option<i32>,
}

impl NewBooking {
    /// An open slot created by the salon
    pub fn slot(date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self {
            date,
            start_time,
            end_time,
            status: BookingStatus::Free,
            customer_id: None,
            note: None,
            updated_by: None,
        }
    }
}

/// Derived per-viewer flags, recomputed on every read
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    pub editable: bool,
    pub acceptable: bool,
    pub confirmable: bool,
    pub disposable: bool,
    pub erasable: bool,
    pub other: bool,
}

impl Booking {
    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn ends_at(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    /// Calendar grouping key (`%Y%m%d`)
    pub fn day_key(&self) -> String {
        self.date.format("%Y%m%d").to_string()
    }

    pub fn year(&self) -> i32 {
        self.date.year()
    }

    pub fn month(&self) -> u32 {
        self.date.month()
    }

    /// Whether a slot is still ahead of `now` (same day counts until it starts)
    fn is_upcoming(&self, now: NaiveDateTime) -> bool {
        self.date > now.date() || (self.date == now.date() && self.start_time >= now.time())
    }

    pub fn is_editable(&self, viewer: &Actor, now: NaiveDateTime) -> bool {
        if viewer.is_admin() {
            return true;
        }
        self.is_upcoming(now)
            && !matches!(
                self.status,
                BookingStatus::Cancelled | BookingStatus::Confirmed | BookingStatus::Free
            )
            && viewer.owns(self.customer_id)
    }

    pub fn is_acceptable(&self, viewer: &Actor) -> bool {
        self.status == BookingStatus::Pending && viewer.is_admin()
    }

    /// Customers may confirm only once the grace window before the start has opened
    pub fn is_confirmable(&self, viewer: &Actor, now: NaiveDateTime, grace: Duration) -> bool {
        if viewer.is_admin() {
            return self.status == BookingStatus::Booked;
        }
        viewer.owns(self.customer_id)
            && self.status == BookingStatus::Booked
            && self.starts_at() - grace <= now
    }

    pub fn is_disposable(&self, viewer: &Actor) -> bool {
        viewer.is_admin()
            && matches!(self.status, BookingStatus::Free | BookingStatus::Cancelled)
    }

    pub fn is_erasable(&self, viewer: &Actor) -> bool {
        matches!(
            self.status,
            BookingStatus::Pending | BookingStatus::Booked | BookingStatus::Confirmed
        ) && (viewer.is_admin() || viewer.owns(self.customer_id))
    }

    pub fn is_other(&self, viewer: &Actor) -> bool {
        viewer.is_admin() && self.customer_id.is_some() && !viewer.owns(self.customer_id)
    }

    pub fn capabilities(&self, viewer: &Actor, now: NaiveDateTime, grace: Duration) -> Capabilities {
        Capabilities {
            editable: self.is_editable(viewer, now),
            acceptable: self.is_acceptable(viewer),
            confirmable: self.is_confirmable(viewer, now, grace),
            disposable: self.is_disposable(viewer),
            erasable: self.is_erasable(viewer),
            other: self.is_other(viewer),
        }
    }

    /// Calendar visibility per viewer role
    pub fn is_visible_to(&self, viewer: &Actor, today: NaiveDate) -> bool {
        if viewer.is_admin() {
            return true;
        }
        let open_slot = self.date >= today
            && self.status == BookingStatus::Free
            && self.customer_id.is_none();
        open_slot || viewer.owns(self.customer_id)
    }

    /// Single-booking visibility: paused slots stay hidden unless owned
    pub fn is_readable_by(&self, viewer: &Actor) -> bool {
        viewer.is_admin()
            || viewer.owns(self.customer_id)
            || self.customer_id.is_none()
            || self.status != BookingStatus::Paused
    }

    /// The booking fields compared by notification diffs
    pub fn projection(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("id".into(), json!(self.id));
        map.insert("date".into(), json!(self.date.format("%Y-%m-%d").to_string()));
        map.insert("start".into(), json!(self.start_time.format("%H:%M").to_string()));
        map.insert("end".into(), json!(self.end_time.format("%H:%M").to_string()));
        map.insert("status".into(), json!(self.status.as_str()));
        map.insert("note".into(), json!(self.note));
        map
    }

    /// Booking projection merged with the given user's fields
    pub fn projection_with(&self, user: Option<&User>) -> Map<String, Value> {
        let mut map = self.projection();
        if let Some(user) = user {
            map.extend(user.projection());
        }
        map
    }
}

/// Lightweight change notice fanned out to connected clients
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ReloadEvent {
    pub id: i32,
    pub year: i32,
    pub month: u32,
}

impl From<&Booking> for ReloadEvent {
    fn from(booking: &Booking) -> Self {
        Self {
            id: booking.id,
            year: booking.year(),
            month: booking.month(),
        }
    }
}

/// Calendar order: date, then status priority, then start time
pub fn calendar_order(a: &Booking, b: &Booking) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.status.priority().cmp(&b.status.priority()))
        .then_with(|| a.start_time.cmp(&b.start_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;

    fn slot(status: BookingStatus, customer_id: Option<i32>) -> Booking {
        Booking {
            id: 1,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            status,
            customer_id,
            note: None,
            updated_by: None,
            updated_at: Utc::now(),
        }
    }

    fn actor(id: i32, role: Role) -> Actor {
        Actor {
            id: Some(id),
            role,
            email: None,
            name: None,
            surname: None,
        }
    }

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_status_strings_round_trip() {
        for status in BookingStatus::ALL {
            assert_eq!(BookingStatus::from_string(status.as_str()), Ok(status));
        }
        assert!(BookingStatus::from_string("ARCHIVED").is_err());
    }

    #[test]
    fn test_confirmable_respects_grace_window_for_customers() {
        let booking = slot(BookingStatus::Booked, Some(7));
        let owner = actor(7, Role::Registered);
        let grace = Duration::days(1);

        assert!(!booking.is_confirmable(&owner, at(8, 12, 0), grace));
        assert!(booking.is_confirmable(&owner, at(9, 9, 0), grace));
        assert!(booking.is_confirmable(&owner, at(10, 8, 0), grace));
        assert!(booking.is_confirmable(&actor(1, Role::Admin), at(1, 0, 0), grace));
        assert!(!booking.is_confirmable(&actor(8, Role::Registered), at(10, 8, 0), grace));
    }

    #[test]
    fn test_editable_for_owner_until_start() {
        let booking = slot(BookingStatus::Booked, Some(7));
        let owner = actor(7, Role::Registered);

        assert!(booking.is_editable(&owner, at(10, 9, 0)));
        assert!(!booking.is_editable(&owner, at(10, 9, 1)));
        assert!(!slot(BookingStatus::Confirmed, Some(7)).is_editable(&owner, at(9, 9, 0)));
        assert!(slot(BookingStatus::Cancelled, None).is_editable(&actor(1, Role::Admin), at(11, 0, 0)));
    }

    #[test]
    fn test_admin_only_flags() {
        let admin = actor(1, Role::Admin);
        let owner = actor(7, Role::Registered);

        assert!(slot(BookingStatus::Pending, Some(7)).is_acceptable(&admin));
        assert!(!slot(BookingStatus::Pending, Some(7)).is_acceptable(&owner));
        assert!(slot(BookingStatus::Free, None).is_disposable(&admin));
        assert!(slot(BookingStatus::Cancelled, None).is_disposable(&admin));
        assert!(!slot(BookingStatus::Booked, Some(7)).is_disposable(&admin));
        assert!(slot(BookingStatus::Booked, Some(7)).is_other(&admin));
        assert!(!slot(BookingStatus::Free, None).is_other(&admin));
        assert!(!slot(BookingStatus::Booked, Some(1)).is_other(&admin));
    }

    #[test]
    fn test_erasable_for_admin_or_owner() {
        let booking = slot(BookingStatus::Confirmed, Some(7));
        assert!(booking.is_erasable(&actor(7, Role::Registered)));
        assert!(booking.is_erasable(&actor(1, Role::Admin)));
        assert!(!booking.is_erasable(&actor(8, Role::Registered)));
        assert!(!slot(BookingStatus::Completed, Some(7)).is_erasable(&actor(7, Role::Registered)));
    }

    #[test]
    fn test_calendar_order_uses_status_priority_before_start() {
        let mut cancelled = slot(BookingStatus::Cancelled, None);
        cancelled.start_time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        let free = slot(BookingStatus::Free, None);
        let mut booked = slot(BookingStatus::Booked, Some(3));
        booked.start_time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();

        let mut day = vec![cancelled, free, booked];
        day.sort_by(calendar_order);
        let statuses: Vec<_> = day.iter().map(|b| b.status).collect();
        assert_eq!(
            statuses,
            vec![BookingStatus::Free, BookingStatus::Booked, BookingStatus::Cancelled]
        );
    }

    #[test]
    fn test_guest_sees_only_future_open_slots() {
        let guest = Actor::guest();
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        assert!(slot(BookingStatus::Free, None).is_visible_to(&guest, today));
        assert!(!slot(BookingStatus::Booked, Some(3)).is_visible_to(&guest, today));
        let late = NaiveDate::from_ymd_opt(2025, 3, 11).unwrap();
        assert!(!slot(BookingStatus::Free, None).is_visible_to(&guest, late));
        assert!(slot(BookingStatus::Completed, Some(3)).is_visible_to(&actor(3, Role::Registered), late));
    }

    #[test]
    fn test_projection_fields() {
        let mut booking = slot(BookingStatus::Booked, Some(7));
        booking.note = Some("french".into());
        let projection = booking.projection();

        assert_eq!(projection["date"], json!("2025-03-10"));
        assert_eq!(projection["start"], json!("09:00"));
        assert_eq!(projection["status"], json!("BOOKED"));
        assert_eq!(projection["note"], json!("french"));
        assert!(!projection.contains_key("customer_id"));
    }
}

// Boundary commands
// The closed set of booking operations a caller can request, tagged by `action`

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{Actor, BookingStatus, Envelope};
use crate::utils::validation::hour_minute;

/// Contact details a guest leaves when booking without an account
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct GuestDetails {
    #[validate(email)]
    pub email: String,
    #[validate(length(max = 100))]
    pub name: Option<String>,
    #[validate(length(max = 100))]
    pub surname: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

/// Partial update of a booking; absent fields stay as they are
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BookingEdit {
    pub date: Option<NaiveDate>,
    #[serde(default, with = "hour_minute::option")]
    pub start: Option<NaiveTime>,
    #[serde(default, with = "hour_minute::option")]
    pub end: Option<NaiveTime>,
    pub status: Option<BookingStatus>,
    pub note: Option<String>,
    #[serde(rename = "internalNote")]
    pub internal_note: Option<String>,
}

impl BookingEdit {
    /// Fields only an admin may change
    pub fn touches_schedule(&self) -> bool {
        self.date.is_some() || self.start.is_some() || self.end.is_some() || self.status.is_some()
    }

    /// Whether anything on the booking row itself changes
    pub fn touches_booking(&self) -> bool {
        self.touches_schedule() || self.note.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct BookingFilter {
    #[validate(range(min = 2000, max = 9999))]
    pub year: i32,
    #[validate(range(min = 1, max = 12))]
    pub month: Option<u32>,
    #[validate(range(min = 1, max = 31))]
    pub day: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum BookingCommand {
    BookSlot {
        id: i32,
        note: Option<String>,
        guest: Option<GuestDetails>,
    },
    AcceptBooking {
        id: i32,
    },
    ConfirmBooking {
        id: i32,
    },
    CancelBooking {
        id: i32,
    },
    EditBooking {
        id: i32,
        date: Option<NaiveDate>,
        #[serde(default, with = "hour_minute::option")]
        start: Option<NaiveTime>,
        #[serde(default, with = "hour_minute::option")]
        end: Option<NaiveTime>,
        status: Option<BookingStatus>,
        note: Option<String>,
        #[serde(rename = "internalNote")]
        internal_note: Option<String>,
    },
    DeleteBooking {
        id: i32,
    },
    CreateSlot {
        date: NaiveDate,
        #[serde(with = "hour_minute")]
        start: NaiveTime,
        #[serde(with = "hour_minute")]
        end: NaiveTime,
    },
    RequestBooking {
        date: NaiveDate,
        #[serde(with = "hour_minute")]
        start: NaiveTime,
        #[serde(with = "hour_minute")]
        end: NaiveTime,
        note: Option<String>,
    },
    GetCalendar {
        year: i32,
        month: u32,
    },
    GetBooking {
        id: i32,
    },
    GetAllBookingData {
        id: i32,
    },
    ListBookings {
        year: i32,
        month: Option<u32>,
        day: Option<u32>,
    },
    UpsertBookingNote {
        id: i32,
        note: String,
    },
    UpsertUserNote {
        #[serde(rename = "userId")]
        user_id: i32,
        note: String,
    },
    GetCoupon {
        #[serde(rename = "userId")]
        user_id: Option<i32>,
    },
    AnonymizeCustomer {
        #[serde(rename = "userId")]
        user_id: i32,
    },
}

impl BookingCommand {
    /// Operation name used in logs and the error sink
    pub fn name(&self) -> &'static str {
        match self {
            BookingCommand::BookSlot { .. } => "bookSlot",
            BookingCommand::AcceptBooking { .. } => "acceptBooking",
            BookingCommand::ConfirmBooking { .. } => "confirmBooking",
            BookingCommand::CancelBooking { .. } => "cancelBooking",
            BookingCommand::EditBooking { .. } => "editBooking",
            BookingCommand::DeleteBooking { .. } => "deleteBooking",
            BookingCommand::CreateSlot { .. } => "createSlot",
            BookingCommand::RequestBooking { .. } => "requestBooking",
            BookingCommand::GetCalendar { .. } => "getCalendar",
            BookingCommand::GetBooking { .. } => "getBooking",
            BookingCommand::GetAllBookingData { .. } => "getAllBookingData",
            BookingCommand::ListBookings { .. } => "listBookings",
            BookingCommand::UpsertBookingNote { .. } => "upsertBookingNote",
            BookingCommand::UpsertUserNote { .. } => "upsertUserNote",
            BookingCommand::GetCoupon { .. } => "getCoupon",
            BookingCommand::AnonymizeCustomer { .. } => "anonymizeCustomer",
        }
    }
}

/// Which single-use link is being redeemed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RedeemKind {
    Accept,
    Confirm,
    NewBooking,
    RequestNewBooking,
}

impl RedeemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedeemKind::Accept => "redeemAccept",
            RedeemKind::Confirm => "redeemConfirm",
            RedeemKind::NewBooking => "redeemNewBooking",
            RedeemKind::RequestNewBooking => "redeemRequestNewBooking",
        }
    }
}

/// Envelope for the caller plus the identity to remember for their session
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOutcome {
    pub envelope: Envelope,
    /// Set when a guest was promoted while booking
    pub promoted: Option<Actor>,
}

impl From<Envelope> for CommandOutcome {
    fn from(envelope: Envelope) -> Self {
        Self {
            envelope,
            promoted: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_book_slot() {
        let command: BookingCommand = serde_json::from_value(json!({
            "action": "bookSlot",
            "id": 3,
            "note": "french tips",
            "guest": {"email": "guest@example.com", "name": "Mia"}
        }))
        .unwrap();

        match command {
            BookingCommand::BookSlot { id, note, guest } => {
                assert_eq!(id, 3);
                assert_eq!(note.as_deref(), Some("french tips"));
                assert_eq!(guest.unwrap().email, "guest@example.com");
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_decode_create_slot_times() {
        let command: BookingCommand = serde_json::from_value(json!({
            "action": "createSlot",
            "date": "2025-03-10",
            "start": "09:00",
            "end": "09:30"
        }))
        .unwrap();

        assert_eq!(
            command,
            BookingCommand::CreateSlot {
                date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            }
        );
        assert_eq!(command.name(), "createSlot");
    }

    #[test]
    fn test_decode_edit_with_internal_note() {
        let command: BookingCommand = serde_json::from_value(json!({
            "action": "editBooking",
            "id": 8,
            "status": "PAUSED",
            "internalNote": "allergic to acetone"
        }))
        .unwrap();

        match command {
            BookingCommand::EditBooking {
                status,
                internal_note,
                start,
                ..
            } => {
                assert_eq!(status, Some(BookingStatus::Paused));
                assert_eq!(internal_note.as_deref(), Some("allergic to acetone"));
                assert_eq!(start, None);
            },
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result = serde_json::from_value::<BookingCommand>(json!({"action": "dropTables"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_guest_email_validation() {
        let guest = GuestDetails {
            email: "not-an-email".into(),
            name: None,
            surname: None,
            phone: None,
        };
        assert!(guest.validate().is_err());
    }

    #[test]
    fn test_edit_scope() {
        let edit = BookingEdit {
            note: Some("x".into()),
            ..Default::default()
        };
        assert!(edit.touches_booking());
        assert!(!edit.touches_schedule());
        assert!(!BookingEdit::default().touches_booking());
    }
}

// Internal notes (staff only) and the durable error sink

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use crate::schema::{booking_notes, errors, user_notes};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = booking_notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct BookingNote {
    pub id: i32,
    pub booking_id: i32,
    pub note: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = booking_notes)]
pub struct NewBookingNote {
    pub booking_id: i32,
    pub note: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = user_notes)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct UserNote {
    pub id: i32,
    pub user_id: i32,
    pub note: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = user_notes)]
pub struct NewUserNote {
    pub user_id: i32,
    pub note: String,
}

/// A system error captured for later inspection
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = errors)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ErrorRecord {
    pub id: i32,
    pub source: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = errors)]
pub struct NewErrorRecord {
    pub source: String,
    pub message: String,
}

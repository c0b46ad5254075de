// Outbound Mail Database Model
// Durable queue rows consumed by the external delivery worker

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::mails;

/// Template selector for the mail composer
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MailType {
    RequestBooking,
    BookBooking,
    ConfirmBooking,
    Update,
    Cancel,
    Rules,
    GenerateNewBooking,
    ConfirmEmail,
    JoinAccount,
    RequestNewBooking,
    ForgotPassword,
}

impl MailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailType::RequestBooking => "REQUEST_BOOKING",
            MailType::BookBooking => "BOOK_BOOKING",
            MailType::ConfirmBooking => "CONFIRM_BOOKING",
            MailType::Update => "UPDATE",
            MailType::Cancel => "CANCEL",
            MailType::Rules => "RULES",
            MailType::GenerateNewBooking => "GENERATE_NEW_BOOKING",
            MailType::ConfirmEmail => "CONFIRM_EMAIL",
            MailType::JoinAccount => "JOIN_ACCOUNT",
            MailType::RequestNewBooking => "REQUEST_NEW_BOOKING",
            MailType::ForgotPassword => "FORGOT_PASSWORD",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "REQUEST_BOOKING" => Ok(MailType::RequestBooking),
            "BOOK_BOOKING" => Ok(MailType::BookBooking),
            "CONFIRM_BOOKING" => Ok(MailType::ConfirmBooking),
            "UPDATE" => Ok(MailType::Update),
            "CANCEL" => Ok(MailType::Cancel),
            "RULES" => Ok(MailType::Rules),
            "GENERATE_NEW_BOOKING" => Ok(MailType::GenerateNewBooking),
            "CONFIRM_EMAIL" => Ok(MailType::ConfirmEmail),
            "JOIN_ACCOUNT" => Ok(MailType::JoinAccount),
            "REQUEST_NEW_BOOKING" => Ok(MailType::RequestNewBooking),
            "FORGOT_PASSWORD" => Ok(MailType::ForgotPassword),
            _ => Err(format!("Invalid mail type: {}", s)),
        }
    }
}

text_column_enum!(MailType);

/// Delivery state, advanced only by the delivery worker
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    diesel::expression::AsExpression,
    diesel::deserialize::FromSqlRow,
)]
#[diesel(sql_type = diesel::sql_types::Text)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MailStatus {
    ToSend,
    Complete,
    Error,
}

impl MailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MailStatus::ToSend => "TO_SEND",
            MailStatus::Complete => "COMPLETE",
            MailStatus::Error => "ERROR",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "TO_SEND" => Ok(MailStatus::ToSend),
            "COMPLETE" => Ok(MailStatus::Complete),
            "ERROR" => Ok(MailStatus::Error),
            _ => Err(format!("Invalid mail status: {}", s)),
        }
    }
}

text_column_enum!(MailStatus);

/// Outbound mail database model
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, PartialEq)]
#[diesel(table_name = mails)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OutboundMail {
    pub id: i32,
    pub receiver: String,
    pub subject: String,
    pub params: Value,
    pub mail_type: MailType,
    pub status: MailStatus,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// New mail for insertion, always queued as TO_SEND
#[derive(Debug, Clone, Insertable, PartialEq)]
#[diesel(table_name = mails)]
pub struct NewOutboundMail {
    pub receiver: String,
    pub subject: String,
    pub params: Value,
    pub mail_type: MailType,
    pub status: MailStatus,
    pub attempts: i32,
}

impl NewOutboundMail {
    pub fn queued(receiver: String, subject: String, params: Value, mail_type: MailType) -> Self {
        Self {
            receiver,
            subject,
            params,
            mail_type,
            status: MailStatus::ToSend,
            attempts: 0,
        }
    }
}

impl OutboundMail {
    /// Still owed to the delivery worker
    pub fn is_deliverable(&self, max_attempts: i32) -> bool {
        matches!(self.status, MailStatus::ToSend | MailStatus::Error) && self.attempts <= max_attempts
    }
}

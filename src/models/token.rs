// Token Database Models
// Single-use confirmation codes bound to a booking, and action codes carrying a deferred intent

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{actions, confirmations};

/// Out-of-band step attached to a claimed slot
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
pub enum ConfirmationType {
    AcceptBooking,
    ConfirmBooking,
}

impl ConfirmationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationType::AcceptBooking => "ACCEPT_BOOKING",
            ConfirmationType::ConfirmBooking => "CONFIRM_BOOKING",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "ACCEPT_BOOKING" => Ok(ConfirmationType::AcceptBooking),
            "CONFIRM_BOOKING" => Ok(ConfirmationType::ConfirmBooking),
            _ => Err(format!("Invalid confirmation type: {}", s)),
        }
    }
}

text_column_enum!(ConfirmationType);

/// Deferred intent redeemed through a mailed link
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
pub enum ActionType {
    NewBooking,        // Recreate a slot freed by a customer cancellation
    ConfirmEmail,      // Account collaborator: verify an address
    JoinAccount,       // Account collaborator: merge an anonymous account
    RequestNewBooking, // Customer asks for a slot outside the calendar
    ForgotPassword,    // Account collaborator: reset link
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::NewBooking => "NEW_BOOKING",
            ActionType::ConfirmEmail => "CONFIRM_EMAIL",
            ActionType::JoinAccount => "JOIN_ACCOUNT",
            ActionType::RequestNewBooking => "REQUEST_NEW_BOOKING",
            ActionType::ForgotPassword => "FORGOT_PASSWORD",
        }
    }

    pub fn from_string(s: &str) -> Result<Self, String> {
        match s {
            "NEW_BOOKING" => Ok(ActionType::NewBooking),
            "CONFIRM_EMAIL" => Ok(ActionType::ConfirmEmail),
            "JOIN_ACCOUNT" => Ok(ActionType::JoinAccount),
            "REQUEST_NEW_BOOKING" => Ok(ActionType::RequestNewBooking),
            "FORGOT_PASSWORD" => Ok(ActionType::ForgotPassword),
            _ => Err(format!("Invalid action type: {}", s)),
        }
    }

    /// Action types mailed to the address stored in their params
    pub fn mails_params_email(&self) -> bool {
        matches!(
            self,
            ActionType::ConfirmEmail | ActionType::JoinAccount | ActionType::ForgotPassword
        )
    }
}

text_column_enum!(ActionType);

/// Generate an unguessable single-use code (122 random bits)
pub fn generate_code() -> String {
    Uuid::new_v4().to_string()
}

/// Confirmation token database model
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable, PartialEq,
)]
#[diesel(table_name = confirmations)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Confirmation {
    pub id: i32,
    pub confirmation_type: ConfirmationType,
    pub booking_id: i32,
    pub mail_id: Option<i32>,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = confirmations)]
pub struct NewConfirmation {
    pub confirmation_type: ConfirmationType,
    pub booking_id: i32,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl NewConfirmation {
    pub fn new(
        confirmation_type: ConfirmationType,
        booking_id: i32,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            confirmation_type,
            booking_id,
            code: generate_code(),
            created_at,
        }
    }
}

/// Action token database model
#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, QueryableByName, Selectable, Identifiable, PartialEq,
)]
#[diesel(table_name = actions)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct Action {
    pub id: i32,
    pub action_type: ActionType,
    pub params: Value,
    pub mail_id: Option<i32>,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = actions)]
pub struct NewAction {
    pub action_type: ActionType,
    pub params: Value,
    pub code: String,
    pub created_at: DateTime<Utc>,
}

impl NewAction {
    pub fn new(action_type: ActionType, params: Value, created_at: DateTime<Utc>) -> Self {
        Self {
            action_type,
            params,
            code: generate_code(),
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_unique_uuids() {
        let first = generate_code();
        let second = generate_code();
        assert_ne!(first, second);
        assert!(Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_action_type_strings() {
        for action_type in [
            ActionType::NewBooking,
            ActionType::ConfirmEmail,
            ActionType::JoinAccount,
            ActionType::RequestNewBooking,
            ActionType::ForgotPassword,
        ] {
            assert_eq!(ActionType::from_string(action_type.as_str()), Ok(action_type));
        }
        assert!(ActionType::ForgotPassword.mails_params_email());
        assert!(!ActionType::NewBooking.mails_params_email());
    }
}

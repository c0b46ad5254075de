// Booking error taxonomy: validation, precondition, not-found, permission and system errors
use thiserror::Error;

use super::messages;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookingError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{0}")]
    Precondition(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type BookingResult<T> = Result<T, BookingError>;

impl BookingError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        BookingError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn precondition(message: &str) -> Self {
        BookingError::Precondition(message.to_string())
    }

    pub fn booking_not_found() -> Self {
        BookingError::NotFound(messages::NO_BOOKING.to_string())
    }

    pub fn invalid_code() -> Self {
        BookingError::NotFound(messages::INVALID_CONFIRMATION.to_string())
    }

    /// Storage and unexpected failures, which go to the error sink
    pub fn is_system(&self) -> bool {
        matches!(self, BookingError::Storage(_) | BookingError::Internal(_))
    }

    /// Message shown to the caller; system errors stay opaque unless `verbose`
    pub fn public_message(&self, verbose: bool) -> String {
        if self.is_system() && !verbose {
            messages::GENERIC_ERROR.to_string()
        } else {
            self.to_string()
        }
    }
}

// Conversion from various error types
impl From<diesel::result::Error> for BookingError {
    fn from(error: diesel::result::Error) -> Self {
        match error {
            diesel::result::Error::NotFound => BookingError::booking_not_found(),
            _ => BookingError::Storage(error.to_string()),
        }
    }
}

impl From<bb8::RunError<diesel_async::pooled_connection::PoolError>> for BookingError {
    fn from(error: bb8::RunError<diesel_async::pooled_connection::PoolError>) -> Self {
        BookingError::Storage(format!("Database connection failed: {}", error))
    }
}

impl From<serde_json::Error> for BookingError {
    fn from(error: serde_json::Error) -> Self {
        BookingError::Internal(format!("Serialization failed: {}", error))
    }
}

impl From<redis::RedisError> for BookingError {
    fn from(error: redis::RedisError) -> Self {
        BookingError::Storage(format!("Session store error: {}", error))
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, reason) = errors
            .field_errors()
            .into_iter()
            .next()
            .map(|(field, errs)| {
                let reason = errs
                    .first()
                    .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| "invalid value".to_string());
                (field.to_string(), reason)
            })
            .unwrap_or_else(|| ("input".to_string(), errors.to_string()));
        BookingError::Validation { field, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_errors_are_opaque_outside_development() {
        let error = BookingError::Storage("connection reset by peer".into());
        assert!(error.is_system());
        assert_eq!(error.public_message(false), messages::GENERIC_ERROR);
        assert!(error.public_message(true).contains("connection reset"));
    }

    #[test]
    fn test_client_errors_keep_their_message() {
        let error = BookingError::precondition(messages::NOT_PENDING);
        assert!(!error.is_system());
        assert_eq!(error.public_message(false), messages::NOT_PENDING);

        let error = BookingError::validation("start", "must be before end");
        assert_eq!(error.public_message(false), "Invalid start: must be before end");
    }

    #[test]
    fn test_diesel_not_found_maps_to_booking_not_found() {
        let error: BookingError = diesel::result::Error::NotFound.into();
        assert_eq!(error, BookingError::booking_not_found());
    }
}

// Uniform response envelope returned by every boundary operation

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::utils::{BookingError, BookingResult};

/// What a successful operation reports before it is wrapped
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub message: &'static str,
    pub content: Value,
}

impl Reply {
    pub fn new(message: &'static str, content: Value) -> Self {
        Self { message, content }
    }

    /// A reply with empty content
    pub fn message(message: &'static str) -> Self {
        Self::new(message, json!({}))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub status: bool,
    pub message: String,
    pub content: Value,
}

impl Envelope {
    pub fn success(message: impl Into<String>, content: Value) -> Self {
        Self {
            status: true,
            message: message.into(),
            content,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: message.into(),
            content: json!({}),
        }
    }

    pub fn from_error(error: &BookingError, verbose: bool) -> Self {
        Self::failure(error.public_message(verbose))
    }

    pub fn from_result(result: &BookingResult<Reply>, verbose: bool) -> Self {
        match result {
            Ok(reply) => Self::success(reply.message, reply.content.clone()),
            Err(error) => Self::from_error(error, verbose),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::messages;

    #[test]
    fn test_failure_has_empty_content() {
        let envelope = Envelope::failure("nope");
        assert!(!envelope.status);
        assert_eq!(envelope.content, json!({}));
    }

    #[test]
    fn test_from_error_hides_storage_details() {
        let error = BookingError::Storage("relation \"booking\" does not exist".into());
        let envelope = Envelope::from_error(&error, false);
        assert_eq!(envelope.message, messages::GENERIC_ERROR);

        let envelope = Envelope::from_error(&BookingError::PermissionDenied, false);
        assert_eq!(envelope.message, messages::PERMISSION_DENIED);
    }

    #[test]
    fn test_from_result_keeps_precondition_message() {
        let result: BookingResult<Reply> =
            Err(BookingError::precondition(messages::ALREADY_CANCELLED));
        let envelope = Envelope::from_result(&result, false);
        assert!(!envelope.status);
        assert_eq!(envelope.message, messages::ALREADY_CANCELLED);

        let envelope = Envelope::from_result(&Ok(Reply::message(messages::DELETED)), false);
        assert!(envelope.status);
        assert_eq!(envelope.content, json!({}));
    }

    #[test]
    fn test_serialized_shape() {
        let envelope = Envelope::success("ok", json!({"id": 3}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value, json!({"status": true, "message": "ok", "content": {"id": 3}}));
    }
}

// Validation utilities for booking input

use chrono::{NaiveDate, NaiveTime};

use super::{messages, service_error::BookingError};

/// Trim an optional free-text field
///
/// # Returns
/// * `None` - If the field is None or empty after trimming
/// * `Some(String)` - The trimmed string if not empty
pub fn trim_optional_field(field: Option<&str>) -> Option<String> {
    field.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Slots are half-open intervals, so `start` must be strictly before `end`
pub fn validate_time_range(start: NaiveTime, end: NaiveTime) -> Result<(), BookingError> {
    if start < end {
        Ok(())
    } else {
        Err(BookingError::validation("start", messages::INVALID_TIME_RANGE))
    }
}

pub fn validate_month(year: i32, month: u32) -> Result<NaiveDate, BookingError> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| BookingError::validation("month", format!("{}-{} is not a month", year, month)))
}

/// Parse `HH:MM` or `HH:MM:SS`
pub fn parse_time(field: &str, value: &str) -> Result<NaiveTime, BookingError> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| BookingError::validation(field, format!("'{}' is not a time", value)))
}

pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, BookingError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| BookingError::validation(field, format!("'{}' is not a date", value)))
}

/// Serde adapter for clock times written as `HH:MM`
pub mod hour_minute {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_time("time", &raw).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(time) => serializer.serialize_str(&time.format("%H:%M").to_string()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .map(|raw| super::super::parse_time("time", &raw).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}

// Utility modules for the booking core

pub mod clock;
pub mod messages;
pub mod service_error;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use service_error::{BookingError, BookingResult};
pub use validation::{parse_date, parse_time, trim_optional_field, validate_time_range};

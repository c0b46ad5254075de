// User-facing messages

// Failures
pub const GENERIC_ERROR: &str = "Something went wrong, please try again later";
pub const NO_BOOKING: &str = "Booking not found";
pub const NO_USER: &str = "Account not found";
pub const PERMISSION_DENIED: &str = "Permission denied";
pub const INVALID_CONFIRMATION: &str = "Invalid confirmation code";
pub const ALREADY_CONFIRMED: &str = "Booking already confirmed";
pub const ALREADY_BOOKED: &str = "Booking already booked";
pub const ALREADY_CANCELLED: &str = "Booking already cancelled";
pub const ALREADY_COMPLETED: &str = "Booking already completed";
pub const NOT_PENDING: &str = "Booking is not pending";
pub const NOT_BOOKED: &str = "Booking is not booked";
pub const SLOT_UNAVAILABLE: &str = "Slot is not available";
pub const INVALID_TIME_RANGE: &str = "Invalid time range";
pub const CUSTOMER_REQUIRED: &str = "Status requires an assigned customer";
pub const INVALID_PAUSE: &str = "Only free or cancelled slots can be paused";
pub const PAUSED_SLOT: &str = "A paused slot can only be freed";
pub const NOT_EDITABLE: &str = "Booking can no longer be edited";
pub const CONFIRM_TOO_EARLY: &str = "Confirmation is not open yet";
pub const EMAIL_REGISTERED: &str = "Email already registered, please log in";
pub const UNSUPPORTED_ACTION: &str = "Unsupported account action";

// Successes
pub const BOOKED: &str = "Booking request sent";
pub const ACCEPTED: &str = "Booking accepted";
pub const CONFIRMED: &str = "Booking confirmed";
pub const CANCELLED: &str = "Booking cancelled";
pub const EDITED: &str = "Booking updated";
pub const DELETED: &str = "Booking deleted";
pub const SLOT_CREATED: &str = "Slot created";
pub const REQUEST_SENT: &str = "New booking request sent";
pub const REQUEST_ACCEPTED: &str = "Requested booking created";
pub const NOTE_SAVED: &str = "Note saved";
pub const COMPLETED: &str = "Due bookings completed";
pub const MAILS_GENERATED: &str = "Queued mails generated";
pub const ANONYMIZED: &str = "Customer removed from bookings";
pub const TOKENS_PURGED: &str = "Stale tokens purged";
pub const OK: &str = "";

// Mail subjects
pub const MAIL_BOOKING: &str = "Your booking at the salon";
pub const MAIL_BOOKING_REQUEST: &str = "Booking request from {{name}}";
pub const MAIL_UPDATE: &str = "Booking update for {{name}}";
pub const MAIL_CANCEL: &str = "Booking cancelled for {{name}}";
pub const MAIL_CONFIRM: &str = "Please confirm your appointment";
pub const MAIL_RULES: &str = "Salon rules";
pub const MAIL_GENERATE_NEW_BOOKING: &str = "Freed slot to recreate";
pub const MAIL_NEW_BOOKING_REQUEST: &str = "New booking request from {{name}}";
pub const MAIL_CONFIRM_EMAIL: &str = "Confirm your email";
pub const MAIL_JOIN_ACCOUNT: &str = "Join your accounts";
pub const MAIL_FORGOT_PASSWORD: &str = "Password recovery";
pub const MAIL_TIME: &str = " on {{date}} at {{start}}";

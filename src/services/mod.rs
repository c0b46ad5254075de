// Services module for the booking core
// Business logic layer between the HTTP handlers and the booking store

pub mod background_tasks;
pub mod booking;
pub mod broadcast;
pub mod coupon;
pub mod identity;
pub mod notification;

// Re-export commonly used services
pub use background_tasks::{initialize_background_tasks, BackgroundTaskManager, SweepReport};
pub use booking::{BookingCommand, BookingService, CommandOutcome, RedeemKind};
pub use broadcast::{
    Broadcaster, ChangeBroadcaster, LocalBroadcaster, RedisBroadcaster, BOOKING_EVENTS_GROUP,
};
pub use coupon::CouponLedger;
pub use identity::{IdentityResolver, RedisSessionResolver, StaticIdentityResolver};
pub use notification::{MailComposer, NotificationEngine};

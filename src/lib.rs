// Library exports for the nail salon booking core
// The binary in main.rs wires these to Postgres, Redis and axum

pub mod app;
pub mod app_config;
pub mod db;
pub mod handlers;
pub mod migrations;
pub mod models;
pub mod schema;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use app::{booking_router, build_router, AppState};
pub use app_config::{AppConfig, BookingSettings, CONFIG};
pub use db::{BookingStore, BookingTx, DieselPool, InMemoryBookingStore, PgBookingStore, RedisPool};
pub use models::{Actor, Envelope, Role};
pub use services::{BookingCommand, BookingService, CommandOutcome, RedeemKind};
pub use utils::{BookingError, BookingResult};

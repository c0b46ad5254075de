// HTTP handlers for the booking core

pub mod booking;
pub mod health;

use crate::app::AppState;
use crate::db::BookingStore;
use axum::{
    routing::{get, post},
    Router,
};

pub use health::HealthState;

// Booking routes
pub fn booking_routes<S: BookingStore>() -> Router<AppState<S>> {
    Router::new()
        .route("/booking", post(booking::handle_command::<S>))
        .route("/booking/redeem/{kind}/{code}", get(booking::redeem::<S>))
}

// Health routes
pub fn health_routes() -> Router<HealthState> {
    Router::new().route("/health", get(health::health_check))
}

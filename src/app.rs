// Application state and router assembly
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::db::BookingStore;
use crate::handlers::{booking_routes, health_routes, HealthState};
use crate::services::{BookingService, IdentityResolver};

// Application state shared across booking handlers
pub struct AppState<S: BookingStore> {
    pub booking: Arc<BookingService<S>>,
    pub identity: Arc<dyn IdentityResolver>,
}

// Manual impl: the store itself need not be Clone
impl<S: BookingStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            booking: self.booking.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<S: BookingStore> AppState<S> {
    pub fn new(booking: Arc<BookingService<S>>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self { booking, identity }
    }
}

/// Booking routes with request tracing
pub fn booking_router<S: BookingStore>(state: AppState<S>) -> Router {
    booking_routes::<S>()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// The full service router, health check included
pub fn build_router<S: BookingStore>(state: AppState<S>, health: HealthState) -> Router {
    booking_routes::<S>()
        .with_state(state)
        .merge(health_routes().with_state(health))
        .layer(TraceLayer::new_for_http())
}

// Health check for the storage and broadcast backends

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::db::{check_diesel_health, DieselPool, RedisPool};
use crate::migrations::diesel::check_migration_status;

#[derive(Clone)]
pub struct HealthState {
    pub diesel_pool: DieselPool,
    pub redis_pool: RedisPool,
    pub database_url: String,
    pub max_connections: u32,
}

/// GET /health
pub async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    let mut overall_healthy = true;
    let timestamp = chrono::Utc::now().to_rfc3339();

    let postgres_health = match check_diesel_health(&state.diesel_pool).await {
        Ok(()) => json!({
            "status": "healthy",
            "max_connections": state.max_connections,
            "error": null
        }),
        Err(e) => {
            overall_healthy = false;
            json!({
                "status": "unhealthy",
                "max_connections": state.max_connections,
                "error": e.to_string()
            })
        },
    };

    let migrations = match check_migration_status(&state.database_url).await {
        Ok(status) => json!({
            "up_to_date": status.is_up_to_date(),
            "applied": status.applied_count,
            "pending": status.pending_count
        }),
        Err(e) => json!({ "error": e.to_string() }),
    };

    let redis = state.redis_pool.health_check().await;
    if !redis.is_healthy {
        overall_healthy = false;
    }
    let redis_health = json!({
        "status": if redis.is_healthy { "healthy" } else { "unhealthy" },
        "latency_ms": redis.latency_ms,
        "error": redis.error
    });

    let response = json!({
        "status": if overall_healthy { "healthy" } else { "degraded" },
        "service": "nail-booking-core",
        "timestamp": timestamp,
        "components": {
            "postgresql": postgres_health,
            "migrations": migrations,
            "redis": redis_health
        }
    });

    if overall_healthy {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nail_booking_core::app::{build_router, AppState};
use nail_booking_core::app_config::{self, AppConfig};
use nail_booking_core::db::{
    create_diesel_pool, DieselDatabaseConfig, PgBookingStore, RedisConfig,
    RedisPool,
};
use nail_booking_core::handlers::HealthState;
use nail_booking_core::migrations::{self, MigrationConfig};
use nail_booking_core::services::{
    initialize_background_tasks, BookingService, ChangeBroadcaster, RedisBroadcaster,
    RedisSessionResolver,
};
use nail_booking_core::utils::SystemClock;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nail_booking_core=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Surface configuration errors before the global is forced
    AppConfig::from_env().context("Failed to load configuration")?;
    let config = app_config::config();
    info!(
        "Starting nail booking core ({}) on {}",
        config.environment, config.bind_address
    );

    // Database
    let db_config = DieselDatabaseConfig::from(config);
    let max_connections = db_config.max_connections;
    let diesel_pool = create_diesel_pool(db_config)
        .await
        .map_err(|e| anyhow::anyhow!("Database initialization failed: {}", e))?;

    if migrations::should_run_migrations(config) {
        migrations::run_all_migrations(MigrationConfig::from(config))
            .await
            .map_err(|e| anyhow::anyhow!("{}", e))?;
    }

    // Redis: broadcast transport and session directory
    let redis_config = RedisConfig::from(config);
    redis_config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid Redis configuration: {}", e))?;
    let redis_pool = RedisPool::new(redis_config)
        .await
        .context("Redis initialization failed")?;

    // Services
    let store = Arc::new(PgBookingStore::new(diesel_pool.clone()));
    let broadcaster = ChangeBroadcaster::new(Arc::new(RedisBroadcaster::new(redis_pool.clone())));
    let booking = Arc::new(BookingService::new(
        store,
        broadcaster,
        Arc::new(SystemClock),
        config.booking_settings(),
    ));
    let identity = Arc::new(RedisSessionResolver::new(
        redis_pool.clone(),
        config.session_ttl_seconds,
    ));

    let _sweeps = initialize_background_tasks(
        booking.clone(),
        Duration::from_secs(config.sweep_interval_seconds),
    );

    let health = HealthState {
        diesel_pool,
        redis_pool,
        database_url: config.database_url.clone(),
        max_connections,
    };
    let app = build_router(AppState::new(booking, identity), health);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on {}", config.bind_address);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

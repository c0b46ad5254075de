// Migration orchestrator for the booking core
// Embedded in the application binary so deployments need no migration tooling

pub mod diesel;

use std::error::Error;
use tracing::{error, info};

/// Configuration for migration execution
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub database_url: String,
    pub environment: String,
}

impl From<&crate::app_config::AppConfig> for MigrationConfig {
    fn from(config: &crate::app_config::AppConfig) -> Self {
        Self {
            database_url: config.database_url.clone(),
            environment: config.environment.to_string(),
        }
    }
}

/// Apply every pending schema migration
pub async fn run_all_migrations(config: MigrationConfig) -> Result<(), Box<dyn Error + Send + Sync>> {
    info!(
        "[MIGRATIONS] Starting migration process for environment: {}",
        config.environment
    );

    match diesel::run_migrations(&config.database_url).await {
        Ok(0) => info!("[MIGRATIONS] Diesel migrations up to date"),
        Ok(applied_count) => info!("[MIGRATIONS] Applied {} Diesel migrations", applied_count),
        Err(e) => {
            error!("[MIGRATIONS] Diesel migration failed: {}", e);
            return Err(format!("Diesel migration failed: {}", e).into());
        },
    }

    Ok(())
}

/// Check if migrations should run based on configuration
pub fn should_run_migrations(config: &crate::app_config::AppConfig) -> bool {
    !config.disable_embedded_migrations
}

// Diesel migration runner for PostgreSQL
// diesel_migrations requires sync connections, so the harness runs on a blocking thread

use crate::db::diesel_pool::MIGRATIONS;
use diesel::Connection;
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use std::error::Error;
use tracing::{debug, info};

/// Run all pending Diesel migrations
/// Returns the number of migrations applied
pub async fn run_migrations(database_url: &str) -> Result<usize, Box<dyn Error + Send + Sync>> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || -> Result<usize, Box<dyn Error + Send + Sync>> {
        let mut conn = PgConnection::establish(&database_url)
            .map_err(|e| format!("Failed to establish sync connection: {}", e))?;

        let pending_count = conn
            .pending_migrations(MIGRATIONS)
            .map_err(|e| format!("Failed to check pending migrations: {}", e))?
            .len();
        if pending_count == 0 {
            debug!("[DIESEL] No pending migrations found");
            return Ok(0);
        }
        info!("[DIESEL] Found {} pending migrations", pending_count);

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| format!("Failed to run migrations: {}", e))?;
        for migration in &applied {
            debug!("[DIESEL] Applied migration: {}", migration);
        }
        Ok(applied.len())
    })
    .await
    .map_err(|e| format!("Migration task panicked: {}", e))?
}

/// Migration status information
#[derive(Debug)]
pub struct MigrationStatus {
    pub applied_count: usize,
    pub pending_count: usize,
}

impl MigrationStatus {
    pub fn is_up_to_date(&self) -> bool {
        self.pending_count == 0
    }
}

/// Check migration status without applying
pub async fn check_migration_status(
    database_url: &str,
) -> Result<MigrationStatus, Box<dyn Error + Send + Sync>> {
    let database_url = database_url.to_string();

    tokio::task::spawn_blocking(move || -> Result<MigrationStatus, Box<dyn Error + Send + Sync>> {
        let mut conn = PgConnection::establish(&database_url)
            .map_err(|e| format!("Failed to establish sync connection: {}", e))?;
        let applied = conn
            .applied_migrations()
            .map_err(|e| format!("Failed to get applied migrations: {}", e))?;
        let pending = conn
            .pending_migrations(MIGRATIONS)
            .map_err(|e| format!("Failed to get pending migrations: {}", e))?;
        Ok(MigrationStatus {
            applied_count: applied.len(),
            pending_count: pending.len(),
        })
    })
    .await
    .map_err(|e| format!("Status check task panicked: {}", e))?
}

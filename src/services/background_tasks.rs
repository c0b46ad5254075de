// Background task scheduler for the booking core
// Periodic sweeps that complete due bookings and queue token mails.
// Token retention is left to the external maintenance job.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::db::BookingStore;
use crate::services::booking::BookingService;

/// Counts reported by one sweep tick
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub completed: u64,
    pub queued: u64,
}

/// Background task manager for booking maintenance
pub struct BackgroundTaskManager<S: BookingStore> {
    service: Arc<BookingService<S>>,
    sweep_interval: Duration,
}

impl<S: BookingStore> BackgroundTaskManager<S> {
    pub fn new(service: Arc<BookingService<S>>, sweep_interval: Duration) -> Self {
        Self {
            service,
            sweep_interval,
        }
    }

    /// One sweep: completion first so a finished visit never gets a reminder.
    ///
    /// Errors go through the usual error reporting and are swallowed; the next tick retries.
    pub async fn run_sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();

        match self.service.complete_due_bookings().await {
            Ok(reply) => report.completed = reply.content["completed"].as_u64().unwrap_or(0),
            Err(e) => {
                self.service.respond("completeDueBookings", Err(e)).await;
            },
        }

        match self.service.generate_queued_mails().await {
            Ok(reply) => report.queued = reply.content["queued"].as_u64().unwrap_or(0),
            Err(e) => {
                self.service.respond("generateQueuedMails", Err(e)).await;
            },
        }

        report
    }

    /// Start all background tasks
    pub fn start_all_tasks(self) -> JoinHandle<()> {
        info!(
            "Starting booking sweeps every {}s",
            self.sweep_interval.as_secs()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.sweep_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let report = self.run_sweep_once().await;
                if report != SweepReport::default() {
                    info!(
                        "Sweep completed {} booking(s) and queued {} mail(s)",
                        report.completed, report.queued
                    );
                }
            }
        })
    }
}

/// Initialize background tasks (call this in main.rs)
pub fn initialize_background_tasks<S: BookingStore>(
    service: Arc<BookingService<S>>,
    sweep_interval: Duration,
) -> JoinHandle<()> {
    BackgroundTaskManager::new(service, sweep_interval).start_all_tasks()
}

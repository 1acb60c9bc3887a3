use std::time::Duration;

use tracing::{info, warn};

use mochiport_api::services::reminders::ReminderService;

/// Background task that flags reminders whose due date has passed.
///
/// Runs on an interval for the lifetime of the process.
pub async fn run_sweep_loop(reminders: ReminderService, period: Duration) {
    let mut interval = tokio::time::interval(period);

    loop {
        interval.tick().await;

        match reminders.sweep_overdue().await {
            Ok(count) => {
                if count > 0 {
                    info!("Sweep: {} reminders are now overdue", count);
                }
            }
            Err(e) => {
                warn!("Sweep error: {}", e);
            }
        }
    }
}

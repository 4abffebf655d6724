//! Daily Job Costing refresh.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::services::costing::CostingService;

/// Next time strictly after `now` at which the clock reads `hour`:00 UTC.
pub fn next_run_after(now: DateTime<Utc>, hour: u32) -> DateTime<Utc> {
    let at = NaiveTime::from_hms_opt(hour.min(23), 0, 0).unwrap_or(NaiveTime::MIN);
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// Spawns the refresh loop. Each run is independent; a failed run is logged
/// and the loop waits for the next day.
pub fn spawn_job_costing_refresh(costing: CostingService, hour: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = next_run_after(now, hour);
            let wait = (next - now).to_std().unwrap_or_default();
            info!(next_run = %next, "job costing refresh scheduled");
            tokio::time::sleep(wait).await;

            match costing.refresh_all_job_costings().await {
                Ok(summary) => info!(
                    refreshed = summary.refreshed,
                    failed = summary.failed,
                    "nightly job costing refresh finished"
                ),
                Err(e) => error!(error = %e, "nightly job costing refresh failed"),
            }
        }
    })
}

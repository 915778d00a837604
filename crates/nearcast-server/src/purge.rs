use std::time::Duration;

use tracing::{info, warn};

use nearcast_api::AppState;
use nearcast_db::lifecycle::PurgeReport;

/// Background task that hard-deletes expired messages and crowds.
pub async fn run_purge_loop(state: AppState, interval_secs: u64, batch_size: usize) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        interval.tick().await;

        match purge_once(&state, batch_size).await {
            Ok(report) => log_report(&report),
            Err(e) => warn!("Purge error: {}", e),
        }
    }
}

/// One purge pass at the state's current time.
pub async fn purge_once(state: &AppState, batch_size: usize) -> anyhow::Result<PurgeReport> {
    let state = state.clone();
    let now = state.clock.now();
    let report = tokio::task::spawn_blocking(move || state.db.purge_expired(now, batch_size)).await??;
    Ok(report)
}

pub fn log_report(report: &PurgeReport) {
    if !report.is_empty() {
        info!(
            "Purge: removed {} messages, {} boosts, {} crowds, {} memberships",
            report.messages, report.boosts, report.crowds, report.memberships
        );
    }
}

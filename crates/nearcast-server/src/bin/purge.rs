//! One-shot purge of expired messages and crowds, for running from cron
//! instead of (or alongside) the server's background loop.

use tracing::{error, info};

use nearcast_api::AppStateInner;
use nearcast_db::Database;
use nearcast_server::config::Config;
use nearcast_server::purge;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nearcast=info".into()),
        )
        .init();

    let config = Config::from_env()?;
    let db = Database::open(&config.db_path)?;
    let state = AppStateInner::new(db);

    match purge::purge_once(&state, config.purge_batch_size).await {
        Ok(report) => {
            if report.is_empty() {
                info!("Purge: nothing expired");
            }
            purge::log_report(&report);
            Ok(())
        }
        Err(e) => {
            error!("Purge failed: {}", e);
            Err(e)
        }
    }
}

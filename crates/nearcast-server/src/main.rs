use tracing::{info, warn};

use nearcast_api::{AppState, AppStateInner};
use nearcast_db::Database;
use nearcast_server::config::Config;
use nearcast_server::{DEV_ORIGINS, app, purge};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "nearcast=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.cors_defaulted {
        warn!(
            "NEARCAST_CORS_ORIGIN not set, allowing local dev origins only: {}",
            DEV_ORIGINS.join(", ")
        );
    }

    let db = Database::open(&config.db_path)?;
    let state: AppState = AppStateInner::new(db);

    // Background purge of expired messages and crowds
    tokio::spawn(purge::run_purge_loop(
        state.clone(),
        config.purge_interval_secs,
        config.purge_batch_size,
    ));

    let app = app(state, &config);

    let addr = config.listen_addr()?;
    info!("Nearcast server listening on {}", addr);
    info!(
        "Purging every {}s in batches of {}",
        config.purge_interval_secs, config.purge_batch_size
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}

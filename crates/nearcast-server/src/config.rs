//! Runtime configuration from `NEARCAST_*` environment variables.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use axum::http::HeaderValue;

#[derive(Debug, Clone, PartialEq)]
pub enum CorsOrigins {
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub cors_origins: CorsOrigins,
    /// Whether `cors_origins` fell back to the local dev list.
    pub cors_defaulted: bool,
    pub purge_interval_secs: u64,
    pub purge_batch_size: usize,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let db_path = lookup("NEARCAST_DB_PATH").unwrap_or_else(|| "nearcast.db".into());
        let host = lookup("NEARCAST_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port = parse_or(&lookup, "NEARCAST_PORT", 8080u16)?;

        let purge_interval_secs = parse_or(&lookup, "NEARCAST_PURGE_INTERVAL_SECS", 300u64)?;
        if purge_interval_secs == 0 {
            bail!("NEARCAST_PURGE_INTERVAL_SECS must be positive");
        }
        let purge_batch_size = parse_or(&lookup, "NEARCAST_PURGE_BATCH_SIZE", 500usize)?;
        if purge_batch_size == 0 {
            bail!("NEARCAST_PURGE_BATCH_SIZE must be positive");
        }

        let (cors_origins, cors_defaulted) = match lookup("NEARCAST_CORS_ORIGIN") {
            Some(raw) => (parse_origins(&raw)?, false),
            None => (CorsOrigins::List(crate::dev_origins()), true),
        };

        Ok(Self {
            db_path: db_path.into(),
            host,
            port,
            cors_origins,
            cors_defaulted,
            purge_interval_secs,
            purge_batch_size,
        })
    }

    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has invalid value {raw:?}")),
        None => Ok(default),
    }
}

fn parse_origins(raw: &str) -> anyhow::Result<CorsOrigins> {
    let entries: Vec<&str> = raw.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    if entries.contains(&"*") {
        return Ok(CorsOrigins::Any);
    }
    if entries.is_empty() {
        bail!("NEARCAST_CORS_ORIGIN is set but empty");
    }

    let origins = entries
        .into_iter()
        .map(|o| HeaderValue::from_str(o).with_context(|| format!("invalid CORS origin {o:?}")))
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(CorsOrigins::List(origins))
}

pub mod config;
pub mod purge;

use axum::Router;
use axum::http::{HeaderValue, Method, header::CONTENT_TYPE};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use nearcast_api::AppState;

use crate::config::{Config, CorsOrigins};

/// The API router with CORS and request tracing applied.
pub fn app(state: AppState, config: &Config) -> Router {
    nearcast_api::router(state)
        .layer(cors_layer(&config.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &CorsOrigins) -> CorsLayer {
    let allow_origin = match origins {
        CorsOrigins::Any => AllowOrigin::any(),
        CorsOrigins::List(list) => AllowOrigin::list(list.iter().cloned()),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(false)
}

/// Local dev frontends allowed when no origin is configured.
pub const DEV_ORIGINS: &[&str] = &[
    "http://localhost:3000",
    "http://localhost:5173",
    "http://localhost:8081",
];

pub(crate) fn dev_origins() -> Vec<HeaderValue> {
    DEV_ORIGINS.iter().copied().map(HeaderValue::from_static).collect()
}

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, Duration, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use nearcast_api::{AppStateInner, Clock, router};
use nearcast_db::Database;

pub const START: i64 = 1_800_000_000;

/// Router over a throwaway database with a clock the test can move forward.
pub struct TestApp {
    router: Router,
    offset_secs: Arc<AtomicI64>,
    path: PathBuf,
}

impl TestApp {
    pub fn new() -> Self {
        let path = std::env::temp_dir().join(format!("nearcast_api_{}.db", Uuid::new_v4()));
        let db = Database::open(&path).unwrap();

        let offset_secs = Arc::new(AtomicI64::new(0));
        let offset = offset_secs.clone();
        let clock = Clock::from_fn(move || {
            DateTime::from_timestamp(START + offset.load(Ordering::SeqCst), 0).unwrap()
        });

        let state = Arc::new(AppStateInner { db, clock });
        Self {
            router: router(state),
            offset_secs,
            path,
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset_secs.fetch_add(by.num_seconds(), Ordering::SeqCst);
    }

    pub async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_vec(&v).unwrap())
            }
            None => Body::empty(),
        };

        let resp = self.router.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body)).await
    }

    /// Post a message and return its id.
    pub async fn post_message(&self, body: Value) -> Uuid {
        let (status, value) = self.post("/messages", body).await;
        assert_eq!(status, StatusCode::CREATED, "{value}");
        value["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn create_crowd(&self, name: &str, is_open: bool, owner: Uuid) -> Uuid {
        let (status, value) = self
            .post("/crowds", json!({ "name": name, "isOpen": is_open, "userId": owner }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{value}");
        value["id"].as_str().unwrap().parse().unwrap()
    }

    pub async fn feed(&self, lat: f64, lon: f64, extra: &str) -> Vec<Value> {
        let (status, value) = self
            .get(&format!("/messages/feed?latitude={lat}&longitude={lon}{extra}"))
            .await;
        assert_eq!(status, StatusCode::OK, "{value}");
        value.as_array().unwrap().clone()
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", self.path.display(), suffix));
        }
    }
}

pub fn message(text: &str, lat: f64, lon: f64, radius: i64, minutes: i64, user: Uuid) -> Value {
    json!({
        "text": text,
        "latitude": lat,
        "longitude": lon,
        "radiusMeters": radius,
        "activeMinutes": minutes,
        "userId": user,
    })
}

pub fn ids(feed: &[Value]) -> Vec<Uuid> {
    feed.iter().map(|m| m["id"].as_str().unwrap().parse().unwrap()).collect()
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::SortBy;

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateMessageRequest {
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: i64,
    pub active_minutes: i64,
    pub user_id: Uuid,
    #[serde(default)]
    pub crowd_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreatedResponse {
    pub id: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedQuery {
    pub latitude: f64,
    pub longitude: f64,
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub sort_by: SortBy,
    pub crowd_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One entry of the feed. The owner's identity is deliberately absent; the
/// requester only learns whether the message is theirs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedMessage {
    pub id: Uuid,
    pub text: String,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: u32,
    pub active_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub boost_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crowd_id: Option<Uuid>,
    /// Effective distance in meters.
    pub distance: f64,
    pub is_owner: bool,
    pub is_boosted: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BoostRequest {
    pub user_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

// -- Crowds --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CreateCrowdRequest {
    pub name: String,
    #[serde(default = "default_open")]
    pub is_open: bool,
    pub user_id: Uuid,
}

fn default_open() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdsQuery {
    pub user_id: Uuid,
}

/// Body of join and leave.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MembershipRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrowdSummary {
    pub id: Uuid,
    pub name: String,
    pub is_open: bool,
    pub is_owner: bool,
    pub member_count: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub can_invite: bool,
}

// -- Misc --

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine-readable code, e.g. `crowd_expired`.
    pub error: String,
    pub message: String,
}

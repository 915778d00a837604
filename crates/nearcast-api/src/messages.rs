use axum::{
    Json,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;

use nearcast_db::models::{FeedCandidate, MessageRow, NewMessage};
use nearcast_feed::{BoostPoint, Candidate, FeedRequest, Ranked, rank};
use nearcast_types::api::{CreateMessageRequest, CreatedResponse, FeedMessage, FeedQuery};
use nearcast_types::models::{CrowdOperation, FeedScope};

use crate::error::ApiError;
use crate::state::{AppState, run_db};
use crate::validate;

pub async fn create_message(
    State(state): State<AppState>,
    payload: Result<Json<CreateMessageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    validate::text(&req.text)?;
    let new = NewMessage {
        origin: validate::coordinate(req.latitude, req.longitude)?,
        radius_meters: validate::radius_meters(req.radius_meters)?,
        active_minutes: validate::active_minutes(req.active_minutes)?,
        text: req.text,
        owner_id: req.user_id,
        crowd_id: req.crowd_id,
    };

    let now = state.clock.now();
    let row = run_db(&state, move |db| db.insert_message(&new, now)).await?;

    debug!(message_id = %row.id, crowd_id = ?row.crowd_id, "Message created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: row.id })))
}

/// Messages visible from the observer's position, ranked by effective
/// distance or by expiry.
pub async fn get_feed(
    State(state): State<AppState>,
    query: Result<Query<FeedQuery>, QueryRejection>,
) -> Result<Json<Vec<FeedMessage>>, ApiError> {
    let Query(query) = query?;

    let observer = validate::coordinate(query.latitude, query.longitude)?;
    let (limit, offset) = validate::page(query.limit, query.offset)?;
    let scope = FeedScope::from_crowd_id(query.crowd_id);
    let now = state.clock.now();

    let user_id = query.user_id;
    let candidates = run_db(&state, move |db| {
        db.authorize(CrowdOperation::ViewFeed, scope.crowd_id(), user_id, now)?;
        db.feed_candidates(scope, now)
    })
    .await?;

    let request = FeedRequest {
        observer,
        observer_id: user_id,
        sort_by: query.sort_by,
        scope,
        limit,
        offset,
        now,
    };
    let ranked = rank(candidates.into_iter().map(to_candidate).collect(), &request);

    Ok(Json(ranked.into_iter().map(to_feed_message).collect()))
}

fn to_candidate(candidate: FeedCandidate) -> Candidate<MessageRow> {
    let FeedCandidate { message, boosts } = candidate;
    Candidate {
        owner_id: message.owner_id,
        origin: message.origin,
        radius_meters: message.radius_meters,
        expires_at: message.expires_at,
        crowd_id: message.crowd_id,
        boosts: boosts
            .into_iter()
            .map(|b| BoostPoint {
                observer_id: b.user_id,
                location: b.location,
            })
            .collect(),
        item: message,
    }
}

fn to_feed_message(ranked: Ranked<MessageRow>) -> FeedMessage {
    let Ranked {
        item: row,
        distance,
        is_owner,
        is_boosted,
    } = ranked;

    FeedMessage {
        id: row.id,
        text: row.text,
        latitude: row.origin.latitude,
        longitude: row.origin.longitude,
        radius_meters: row.radius_meters,
        active_minutes: row.active_minutes,
        created_at: row.created_at,
        expires_at: row.expires_at,
        boost_count: row.boost_count,
        crowd_id: row.crowd_id,
        distance,
        is_owner,
        is_boosted,
    }
}

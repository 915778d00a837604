use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use tracing::debug;
use uuid::Uuid;

use nearcast_db::models::CrowdMembershipRow;
use nearcast_types::api::{
    CreateCrowdRequest, CreatedResponse, CrowdSummary, CrowdsQuery, MembershipRequest, StatusResponse,
};

use crate::error::ApiError;
use crate::state::{AppState, run_db};
use crate::validate;

pub async fn create_crowd(
    State(state): State<AppState>,
    payload: Result<Json<CreateCrowdRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    validate::crowd_name(&req.name)?;

    let now = state.clock.now();
    let crowd = run_db(&state, move |db| db.create_crowd(&req.name, req.is_open, req.user_id, now)).await?;

    debug!(crowd_id = %crowd.id, is_open = crowd.is_open, "Crowd created");
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: crowd.id })))
}

/// Live crowds the caller belongs to.
pub async fn list_crowds(
    State(state): State<AppState>,
    query: Result<Query<CrowdsQuery>, QueryRejection>,
) -> Result<Json<Vec<CrowdSummary>>, ApiError> {
    let Query(query) = query?;
    let user_id = query.user_id;
    let now = state.clock.now();

    let rows = run_db(&state, move |db| db.crowds_for_user(user_id, now)).await?;

    let crowds = rows
        .into_iter()
        .map(|CrowdMembershipRow { crowd, member_count }| {
            let is_owner = crowd.owner_id == user_id;
            CrowdSummary {
                id: crowd.id,
                name: crowd.name,
                is_open: crowd.is_open,
                is_owner,
                member_count,
                created_at: crowd.created_at,
                expires_at: crowd.expires_at,
                can_invite: crowd.is_open || is_owner,
            }
        })
        .collect();

    Ok(Json(crowds))
}

pub async fn join_crowd(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<MembershipRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Path(crowd_id) = path?;
    let Json(req) = payload?;
    let now = state.clock.now();

    run_db(&state, move |db| db.join_crowd(crowd_id, req.user_id, now)).await?;

    debug!(%crowd_id, "Crowd joined");
    Ok(Json(StatusResponse::ok()))
}

/// Leaving is idempotent: a non-member, or an unknown crowd, still gets ok.
pub async fn leave_crowd(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<MembershipRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Path(crowd_id) = path?;
    let Json(req) = payload?;

    let removed = run_db(&state, move |db| db.leave_crowd(crowd_id, req.user_id)).await?;

    debug!(%crowd_id, removed, "Crowd left");
    Ok(Json(StatusResponse::ok()))
}

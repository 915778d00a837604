use axum::{
    Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
};
use tracing::debug;
use uuid::Uuid;

use nearcast_types::api::{BoostRequest, StatusResponse};

use crate::error::ApiError;
use crate::state::{AppState, run_db};
use crate::validate;

/// Extend a message's reach to the booster's current location.
pub async fn boost_message(
    State(state): State<AppState>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Result<Json<BoostRequest>, JsonRejection>,
) -> Result<Json<StatusResponse>, ApiError> {
    let Path(message_id) = path?;
    let Json(req) = payload?;

    let location = validate::coordinate(req.latitude, req.longitude)?;
    let now = state.clock.now();
    let user_id = req.user_id;

    run_db(&state, move |db| db.boost_message(message_id, user_id, location, now)).await?;

    debug!(%message_id, "Message boosted");
    Ok(Json(StatusResponse::ok()))
}

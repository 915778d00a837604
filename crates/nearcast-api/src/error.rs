use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{debug, error};

use nearcast_db::{DbError, Entity};
use nearcast_types::api::ErrorResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Db(e) => match e {
                DbError::NotFound(_) => StatusCode::NOT_FOUND,
                DbError::Expired(_) => StatusCode::GONE,
                DbError::Forbidden | DbError::Closed => StatusCode::FORBIDDEN,
                DbError::SelfBoostRejected => StatusCode::BAD_REQUEST,
                DbError::AlreadyBoosted | DbError::AlreadyMember => StatusCode::CONFLICT,
                DbError::LockPoisoned | DbError::Sqlite(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable code clients switch on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Db(e) => match e {
                DbError::NotFound(Entity::Message) => "message_not_found",
                DbError::NotFound(Entity::Crowd) => "crowd_not_found",
                DbError::Expired(Entity::Message) => "message_expired",
                DbError::Expired(Entity::Crowd) => "crowd_expired",
                DbError::Forbidden => "forbidden",
                DbError::Closed => "crowd_closed",
                DbError::SelfBoostRejected => "self_boost_rejected",
                DbError::AlreadyBoosted => "already_boosted",
                DbError::AlreadyMember => "already_member",
                DbError::LockPoisoned | DbError::Sqlite(_) => "internal_error",
            },
            Self::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Storage details stay in the logs.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "internal error".to_string()
        } else {
            debug!("Request rejected: {}", self);
            self.to_string()
        };

        let body = ErrorResponse {
            error: self.code().to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

use std::fmt;

use thiserror::Error;

/// What a `NotFound` / `Expired` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Message,
    Crowd,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message => write!(f, "message"),
            Self::Crowd => write!(f, "crowd"),
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(Entity),

    #[error("{0} expired")]
    Expired(Entity),

    #[error("not a member of this crowd")]
    Forbidden,

    #[error("crowd is closed")]
    Closed,

    #[error("cannot boost your own message")]
    SelfBoostRejected,

    #[error("message already boosted")]
    AlreadyBoosted,

    #[error("already a member of this crowd")]
    AlreadyMember,

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

impl DbError {
    /// Rejections the caller caused, as opposed to storage failures.
    pub fn is_domain(&self) -> bool {
        !matches!(self, Self::LockPoisoned | Self::Sqlite(_))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

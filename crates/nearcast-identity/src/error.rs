use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("identity store holds malformed data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("identity store lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, IdentityError>;

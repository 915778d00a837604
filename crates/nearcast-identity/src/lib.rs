//! Client-side anonymous identity.
//!
//! A device holds one global token, rotated once everything it has posted
//! or boosted has expired, plus an independent token per joined crowd. The
//! local ownership/boost records are tied to the global token and are wiped
//! when it rotates.

pub mod error;
pub mod identity;
pub mod records;
pub mod store;

pub use error::{IdentityError, Result};
pub use identity::{IdentityManager, IdentityState};
pub use records::LocalRecord;
pub use store::{FileStore, KeyValueStore, MemoryStore};

//! Nearcast feed engine
//!
//! Pure geometry and ranking: no storage, no clocks. Callers hand in the
//! candidate set and `now`, and get back the visible page.

pub mod geo;
pub mod relevance;

pub use geo::haversine_meters;
pub use relevance::{BoostPoint, Candidate, FeedRequest, Ranked, effective_distance, rank};

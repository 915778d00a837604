use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How long a crowd stays alive after creation.
pub const CROWD_LIFETIME_HOURS: i64 = 24;

/// A point on the earth's surface, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Latitude in [-90, 90] and longitude in [-180, 180], both finite.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// Feed ordering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Ascending effective distance.
    #[default]
    Nearest,
    /// Ascending expiry; distance still gates inclusion.
    Soonest,
}

/// Which feed a query reads from. Messages posted without a crowd live in the
/// global feed and never show up in a crowd feed, and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedScope {
    Global,
    Crowd(Uuid),
}

impl FeedScope {
    pub fn from_crowd_id(crowd_id: Option<Uuid>) -> Self {
        crowd_id.map_or(Self::Global, Self::Crowd)
    }

    pub fn crowd_id(&self) -> Option<Uuid> {
        match self {
            Self::Global => None,
            Self::Crowd(id) => Some(*id),
        }
    }

    pub fn matches(&self, crowd_id: Option<Uuid>) -> bool {
        self.crowd_id() == crowd_id
    }
}

/// Crowd-scoped actions that go through the membership gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrowdOperation {
    Post,
    ViewFeed,
    Boost,
}

impl fmt::Display for CrowdOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Post => write!(f, "post"),
            Self::ViewFeed => write!(f, "view_feed"),
            Self::Boost => write!(f, "boost"),
        }
    }
}

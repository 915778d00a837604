use chrono::{DateTime, Utc};
use uuid::Uuid;

use nearcast_types::models::{Coordinate, FeedScope, SortBy};

use crate::geo::haversine_meters;

/// A vantage point added by someone boosting a message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostPoint {
    pub observer_id: Uuid,
    pub location: Coordinate,
}

/// A message as the engine sees it. `item` is whatever payload the caller
/// wants carried through to the result.
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    pub item: T,
    pub owner_id: Uuid,
    pub origin: Coordinate,
    pub radius_meters: u32,
    pub expires_at: DateTime<Utc>,
    pub crowd_id: Option<Uuid>,
    pub boosts: Vec<BoostPoint>,
}

#[derive(Debug, Clone)]
pub struct FeedRequest {
    pub observer: Coordinate,
    pub observer_id: Option<Uuid>,
    pub sort_by: SortBy,
    pub scope: FeedScope,
    pub limit: usize,
    pub offset: usize,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Ranked<T> {
    pub item: T,
    /// Effective distance in meters.
    pub distance: f64,
    pub is_owner: bool,
    pub is_boosted: bool,
}

/// Minimum distance from `observer` to the origin or any boost location.
/// Adding boosts can only lower it.
pub fn effective_distance(observer: Coordinate, origin: Coordinate, boosts: &[BoostPoint]) -> f64 {
    boosts
        .iter()
        .map(|b| haversine_meters(observer, b.location))
        .fold(haversine_meters(observer, origin), f64::min)
}

/// Filter, order and page a candidate set.
///
/// A candidate survives iff it is unexpired at `req.now`, belongs to
/// `req.scope`, and its effective distance is within its radius. Ordering is
/// stable, so ties keep the order the candidates came in.
pub fn rank<T>(candidates: Vec<Candidate<T>>, req: &FeedRequest) -> Vec<Ranked<T>> {
    let mut visible: Vec<(Ranked<T>, DateTime<Utc>)> = candidates
        .into_iter()
        .filter(|c| c.expires_at > req.now && req.scope.matches(c.crowd_id))
        .filter_map(|c| {
            let distance = effective_distance(req.observer, c.origin, &c.boosts);
            if distance > f64::from(c.radius_meters) {
                return None;
            }

            let (is_owner, is_boosted) = match req.observer_id {
                Some(observer_id) => (
                    c.owner_id == observer_id,
                    c.boosts.iter().any(|b| b.observer_id == observer_id),
                ),
                None => (false, false),
            };

            Some((
                Ranked {
                    item: c.item,
                    distance,
                    is_owner,
                    is_boosted,
                },
                c.expires_at,
            ))
        })
        .collect();

    match req.sort_by {
        SortBy::Nearest => visible.sort_by(|a, b| a.0.distance.total_cmp(&b.0.distance)),
        SortBy::Soonest => visible.sort_by_key(|(_, expires_at)| *expires_at),
    }

    visible
        .into_iter()
        .skip(req.offset)
        .take(req.limit)
        .map(|(ranked, _)| ranked)
        .collect()
}

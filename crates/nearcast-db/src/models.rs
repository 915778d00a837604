//! Row types. Timestamps are stored as Unix milliseconds and ids as TEXT
//! UUIDs; the helpers at the bottom convert at the column boundary.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use nearcast_types::models::Coordinate;

#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub id: Uuid,
    pub text: String,
    pub origin: Coordinate,
    pub radius_meters: u32,
    pub active_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub owner_id: Uuid,
    pub boost_count: u32,
    pub crowd_id: Option<Uuid>,
}

pub(crate) const MESSAGE_COLUMNS: &str = "id, text, latitude, longitude, radius_meters, active_minutes, \
     created_at, expires_at, owner_id, boost_count, crowd_id";

impl MessageRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_col(row, 0)?,
            text: row.get(1)?,
            origin: Coordinate::new(row.get(2)?, row.get(3)?),
            radius_meters: row.get(4)?,
            active_minutes: row.get(5)?,
            created_at: time_col(row, 6)?,
            expires_at: time_col(row, 7)?,
            owner_id: uuid_col(row, 8)?,
            boost_count: row.get(9)?,
            crowd_id: opt_uuid_col(row, 10)?,
        })
    }
}

/// Input for a new message; ids and timestamps are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub text: String,
    pub origin: Coordinate,
    pub radius_meters: u32,
    pub active_minutes: u32,
    pub owner_id: Uuid,
    pub crowd_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoostRow {
    pub message_id: Uuid,
    pub user_id: Uuid,
    pub location: Coordinate,
    pub boosted_at: DateTime<Utc>,
}

impl BoostRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            message_id: uuid_col(row, 0)?,
            user_id: uuid_col(row, 1)?,
            location: Coordinate::new(row.get(2)?, row.get(3)?),
            boosted_at: time_col(row, 4)?,
        })
    }
}

/// A live message together with every boost recorded against it.
#[derive(Debug, Clone)]
pub struct FeedCandidate {
    pub message: MessageRow,
    pub boosts: Vec<BoostRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrowdRow {
    pub id: Uuid,
    pub name: String,
    pub owner_id: Uuid,
    pub is_open: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub(crate) const CROWD_COLUMNS: &str = "id, name, owner_id, is_open, created_at, expires_at";

impl CrowdRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: uuid_col(row, 0)?,
            name: row.get(1)?,
            owner_id: uuid_col(row, 2)?,
            is_open: row.get(3)?,
            created_at: time_col(row, 4)?,
            expires_at: time_col(row, 5)?,
        })
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// A crowd as listed for one of its members.
#[derive(Debug, Clone, PartialEq)]
pub struct CrowdMembershipRow {
    pub crowd: CrowdRow,
    pub member_count: u32,
}

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn time_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Integer, "timestamp out of range".into())
    })
}

fn uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    parse_uuid(idx, &raw)
}

fn opt_uuid_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_uuid(idx, &s)).transpose()
}

fn parse_uuid(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

//! Request validation. Lengths are counted in Unicode scalar values and text
//! is taken as sent, without trimming.

use nearcast_types::models::Coordinate;

use crate::error::ApiError;

pub const MAX_TEXT_CHARS: usize = 500;
pub const MAX_CROWD_NAME_CHARS: usize = 50;
pub const MAX_RADIUS_METERS: i64 = 100_000;
/// One week.
pub const MAX_ACTIVE_MINUTES: i64 = 10_080;
pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

fn invalid(msg: impl Into<String>) -> ApiError {
    ApiError::Validation(msg.into())
}

pub fn text(text: &str) -> Result<(), ApiError> {
    bounded_chars("text", text, MAX_TEXT_CHARS)
}

pub fn crowd_name(name: &str) -> Result<(), ApiError> {
    bounded_chars("name", name, MAX_CROWD_NAME_CHARS)
}

fn bounded_chars(field: &str, value: &str, max: usize) -> Result<(), ApiError> {
    let len = value.chars().count();
    if len == 0 || len > max {
        return Err(invalid(format!("{field} must be 1 to {max} characters")));
    }
    Ok(())
}

pub fn radius_meters(radius: i64) -> Result<u32, ApiError> {
    in_range("radiusMeters", radius, MAX_RADIUS_METERS)
}

pub fn active_minutes(minutes: i64) -> Result<u32, ApiError> {
    in_range("activeMinutes", minutes, MAX_ACTIVE_MINUTES)
}

fn in_range(field: &str, value: i64, max: i64) -> Result<u32, ApiError> {
    if !(1..=max).contains(&value) {
        return Err(invalid(format!("{field} must be between 1 and {max}")));
    }
    u32::try_from(value).map_err(|_| invalid(format!("{field} out of range")))
}

pub fn coordinate(latitude: f64, longitude: f64) -> Result<Coordinate, ApiError> {
    let coord = Coordinate::new(latitude, longitude);
    if !coord.is_valid() {
        return Err(invalid(
            "latitude must be within [-90, 90] and longitude within [-180, 180]",
        ));
    }
    Ok(coord)
}

/// Resolve `limit` and `offset` query parameters to concrete values.
pub fn page(limit: Option<i64>, offset: Option<i64>) -> Result<(usize, usize), ApiError> {
    let limit = match limit {
        None => DEFAULT_PAGE_LIMIT,
        Some(n) if (1..=MAX_PAGE_LIMIT).contains(&n) => n as usize,
        Some(_) => return Err(invalid(format!("limit must be between 1 and {MAX_PAGE_LIMIT}"))),
    };
    let offset = match offset {
        None => 0,
        Some(n) => usize::try_from(n).map_err(|_| invalid("offset must not be negative"))?,
    };
    Ok((limit, offset))
}

//! Database value parsing utilities
//!
//! Provides error-safe parsing and formatting of stored values.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::Error as SqlError;
use uuid::Uuid;

use crate::models::{GroupId, ParseEnumError, TimeSpan};

fn conversion_failure<E>(e: E) -> SqlError
where
    E: std::error::Error + Send + Sync + 'static,
{
    SqlError::FromSqlConversionFailure(0, Type::Text, Box::new(e))
}

/// Parse a UUID from a database string column
pub fn parse_uuid(s: &str) -> Result<Uuid, SqlError> {
    Uuid::parse_str(s).map_err(conversion_failure)
}

/// Parse an optional UUID from a database string column
pub fn parse_uuid_opt(s: Option<String>) -> Result<Option<Uuid>, SqlError> {
    s.map(|s| parse_uuid(&s)).transpose()
}

/// Parse a DateTime from an RFC3339 string
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, SqlError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(conversion_failure)
}

/// Fixed-width RFC3339 so stored timestamps sort lexically
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_date(s: &str) -> Result<NaiveDate, SqlError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(conversion_failure)
}

pub fn format_date(d: &NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

/// Accepts both `HH:MM:SS` and legacy `HH:MM`
pub fn parse_time(s: &str) -> Result<NaiveTime, SqlError> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(conversion_failure)
}

pub fn parse_time_opt(s: Option<String>) -> Result<Option<NaiveTime>, SqlError> {
    s.map(|s| parse_time(&s)).transpose()
}

pub fn format_time(t: &NaiveTime) -> String {
    t.format("%H:%M:%S").to_string()
}

/// Rebuild a span from two stored bounds
pub fn parse_span(start: &str, end: &str) -> Result<TimeSpan, SqlError> {
    Ok(TimeSpan {
        start: parse_time(start)?,
        end: parse_time(end)?,
    })
}

pub fn parse_group_id_opt(s: Option<String>) -> Option<GroupId> {
    s.filter(|s| !s.is_empty()).map(GroupId)
}

/// Parse a stored enum discriminant
pub fn parse_enum<T>(s: &str) -> Result<T, SqlError>
where
    T: FromStr<Err = ParseEnumError>,
{
    s.parse::<T>().map_err(conversion_failure)
}

pub fn parse_enum_opt<T>(s: Option<String>) -> Result<Option<T>, SqlError>
where
    T: FromStr<Err = ParseEnumError>,
{
    s.map(|s| parse_enum(&s)).transpose()
}

/// Parse a JSON column into a value
pub fn parse_json_opt<T>(s: Option<String>) -> Result<Option<T>, SqlError>
where
    T: serde::de::DeserializeOwned,
{
    s.map(|s| serde_json::from_str(&s).map_err(conversion_failure))
        .transpose()
}

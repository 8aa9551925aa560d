//! Booking model - one resource-time reservation row

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ParseEnumError, ResourceId};
use crate::error::{Error, Result};

/// Minutes since midnight
pub fn minute_of_day(t: NaiveTime) -> i64 {
    i64::from(t.num_seconds_from_midnight()) / 60
}

/// Build a time from minutes since midnight, `None` outside the day
pub fn time_from_minutes(minutes: i64) -> Option<NaiveTime> {
    if !(0..24 * 60).contains(&minutes) {
        return None;
    }
    NaiveTime::from_num_seconds_from_midnight_opt((minutes * 60) as u32, 0)
}

/// Half-open time-of-day interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeSpan {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if start >= end {
            return Err(Error::validation(format!(
                "start {} must be before end {}",
                start.format("%H:%M"),
                end.format("%H:%M")
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `HH:MM` (or `HH:MM:SS`) bounds
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        Self::new(parse_time(start)?, parse_time(end)?)
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    /// Touching boundaries do not overlap.
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Returns true if `self` strictly encloses `inner` (no shared boundary).
    pub fn strictly_contains(&self, inner: &TimeSpan) -> bool {
        self.start < inner.start && inner.end < self.end
    }

    /// Move both bounds by `minutes`, `None` if the result leaves the day.
    pub fn shifted(&self, minutes: i64) -> Option<TimeSpan> {
        let start = time_from_minutes(minute_of_day(self.start) + minutes)?;
        let end = time_from_minutes(minute_of_day(self.end) + minutes)?;
        Some(TimeSpan { start, end })
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start.format("%H:%M"), self.end.format("%H:%M"))
    }
}

/// Parse a time-of-day, accepting `HH:MM` and `HH:MM:SS`
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| Error::validation(format!("invalid time '{s}', expected HH:MM")))
}

/// Parse a calendar date in `YYYY-MM-DD`
pub fn parse_date(s: &str) -> Result<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::validation(format!("invalid date '{s}', expected YYYY-MM-DD")))
}

/// Which side of the house a booking belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceCategory {
    Academy,
    Studio,
}

impl ResourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceCategory::Academy => "academy",
            ResourceCategory::Studio => "studio",
        }
    }
}

impl FromStr for ResourceCategory {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "academy" => Ok(ResourceCategory::Academy),
            "studio" => Ok(ResourceCategory::Studio),
            other => Err(ParseEnumError::new("resource category", other)),
        }
    }
}

/// Approval workflow state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    #[serde(alias = "confirmed")]
    Approved,
    ModificationRequested,
    ModificationApproved,
    CancellationRequested,
    DeletionRequested,
    Cancelled,
    Deleted,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 8] = [
        BookingStatus::Pending,
        BookingStatus::Approved,
        BookingStatus::ModificationRequested,
        BookingStatus::ModificationApproved,
        BookingStatus::CancellationRequested,
        BookingStatus::DeletionRequested,
        BookingStatus::Cancelled,
        BookingStatus::Deleted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Approved => "approved",
            BookingStatus::ModificationRequested => "modification_requested",
            BookingStatus::ModificationApproved => "modification_approved",
            BookingStatus::CancellationRequested => "cancellation_requested",
            BookingStatus::DeletionRequested => "deletion_requested",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Deleted => "deleted",
        }
    }

    /// Terminal states keep the row but deactivate it
    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Cancelled | BookingStatus::Deleted)
    }

    /// A manager request awaiting an admin decision
    pub fn is_open_request(&self) -> bool {
        matches!(
            self,
            BookingStatus::ModificationRequested
                | BookingStatus::CancellationRequested
                | BookingStatus::DeletionRequested
        )
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(BookingStatus::Pending),
            "approved" | "confirmed" => Ok(BookingStatus::Approved),
            "modification_requested" => Ok(BookingStatus::ModificationRequested),
            "modification_approved" => Ok(BookingStatus::ModificationApproved),
            "cancellation_requested" => Ok(BookingStatus::CancellationRequested),
            "deletion_requested" => Ok(BookingStatus::DeletionRequested),
            "cancelled" => Ok(BookingStatus::Cancelled),
            "deleted" => Ok(BookingStatus::Deleted),
            other => Err(ParseEnumError::new("booking status", other)),
        }
    }
}

/// Identifier shared by the two legs of a split booking
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

impl GroupId {
    /// Compose from requester, date and a microsecond timestamp plus a random
    /// suffix. Uniqueness is advisory; storage does not enforce it.
    pub fn generate(requester: &str, date: NaiveDate, now: DateTime<Utc>) -> Self {
        let slug: String = requester
            .chars()
            .filter(|c| c.is_alphanumeric())
            .take(16)
            .collect::<String>()
            .to_lowercase();
        let slug = if slug.is_empty() { "req".to_string() } else { slug };
        Self(format!(
            "{}-{}-{}-{:04x}",
            slug,
            date.format("%Y%m%d"),
            now.timestamp_micros(),
            rand::random::<u16>()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Addresses either a single booking row or every leg of a group
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BookingRef {
    Booking(Uuid),
    Group(GroupId),
}

impl fmt::Display for BookingRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookingRef::Booking(id) => write!(f, "booking {id}"),
            BookingRef::Group(gid) => write!(f, "group {gid}"),
        }
    }
}

impl FromStr for BookingRef {
    type Err = Error;

    /// UUIDs address a row, anything else is taken as a group id
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::validation("booking or group id is required"));
        }
        Ok(match Uuid::parse_str(s) {
            Ok(id) => BookingRef::Booking(id),
            Err(_) => BookingRef::Group(GroupId(s.to_string())),
        })
    }
}

/// One stored booking row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub category: ResourceCategory,
    pub date: NaiveDate,
    pub span: TimeSpan,
    pub requester_name: String,
    /// Directory entry matched by name, if any
    pub requester_ref: Option<i64>,
    pub shoot_type: String,
    pub resource_id: ResourceId,
    pub status: BookingStatus,
    pub is_active: bool,
    pub group_id: Option<GroupId>,
    /// 1 or 2 within a group, 1 for plain bookings
    pub sequence_order: u8,
    /// Break carved out of the outer window, carried on both legs
    pub break_window: Option<TimeSpan>,
    pub course_name: Option<String>,
    pub course_code: Option<String>,
    pub notes: Option<String>,
    pub modification_reason: Option<String>,
    pub cancellation_reason: Option<String>,
    pub deletion_reason: Option<String>,
    /// Status to restore when an open request is withdrawn or rejected
    pub prior_status: Option<BookingStatus>,
    /// Who raised the currently open request
    pub requested_by: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<Uuid>,
}

impl Booking {
    pub fn break_enabled(&self) -> bool {
        self.break_window.is_some()
    }

    pub fn break_duration_minutes(&self) -> Option<i64> {
        self.break_window.map(|b| b.duration_minutes())
    }

    /// Key used to fan out and to exclude self from conflict checks
    pub fn reference(&self) -> BookingRef {
        match &self.group_id {
            Some(gid) => BookingRef::Group(gid.clone()),
            None => BookingRef::Booking(self.id),
        }
    }
}

/// Two legs of one logical reservation around a break window.
///
/// Only constructible through [`BookingGroup::from_legs`], which enforces
/// the pairing: shared group id, sequence 1 then 2, and legs that abut the
/// break exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingGroup {
    id: GroupId,
    legs: [Booking; 2],
}

impl BookingGroup {
    pub fn from_legs(first: Booking, second: Booking) -> Result<Self> {
        let id = match (&first.group_id, &second.group_id) {
            (Some(a), Some(b)) if a == b => a.clone(),
            _ => return Err(Error::validation("split legs must share one group id")),
        };
        if first.sequence_order != 1 || second.sequence_order != 2 {
            return Err(Error::validation("split legs must be ordered 1 then 2"));
        }
        let brk = match (first.break_window, second.break_window) {
            (Some(a), Some(b)) if a == b => a,
            _ => return Err(Error::validation("split legs must carry the same break window")),
        };
        if first.span.end != brk.start || second.span.start != brk.end {
            return Err(Error::validation(format!(
                "legs {} and {} do not abut break {}",
                first.span, second.span, brk
            )));
        }
        if first.date != second.date || first.resource_id != second.resource_id {
            return Err(Error::validation("split legs must share date and resource"));
        }
        Ok(Self {
            id,
            legs: [first, second],
        })
    }

    pub fn id(&self) -> &GroupId {
        &self.id
    }

    pub fn legs(&self) -> &[Booking; 2] {
        &self.legs
    }

    pub fn into_legs(self) -> [Booking; 2] {
        self.legs
    }

    pub fn first(&self) -> &Booking {
        &self.legs[0]
    }

    pub fn second(&self) -> &Booking {
        &self.legs[1]
    }

    /// The full window from the first leg's start to the second leg's end
    pub fn outer(&self) -> TimeSpan {
        TimeSpan {
            start: self.legs[0].span.start,
            end: self.legs[1].span.end,
        }
    }

    pub fn break_window(&self) -> TimeSpan {
        TimeSpan {
            start: self.legs[0].span.end,
            end: self.legs[1].span.start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> NaiveTime {
        parse_time(s).unwrap()
    }

    #[test]
    fn test_span_overlap_half_open() {
        let a = TimeSpan::parse("10:00", "12:00").unwrap();
        let b = TimeSpan::parse("11:00", "13:00").unwrap();
        let c = TimeSpan::parse("12:00", "14:00").unwrap();
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c)); // touching, not overlapping
    }

    #[test]
    fn test_span_rejects_inverted() {
        assert!(matches!(
            TimeSpan::parse("12:00", "12:00"),
            Err(Error::Validation(_))
        ));
        assert!(TimeSpan::parse("13:00", "12:00").is_err());
    }

    #[test]
    fn test_span_shift_stays_in_day() {
        let s = TimeSpan::parse("09:00", "10:30").unwrap();
        assert_eq!(s.shifted(60).unwrap(), TimeSpan::parse("10:00", "11:30").unwrap());
        assert!(s.shifted(-10 * 60).is_none());
        assert_eq!(s.duration_minutes(), 90);
    }

    #[test]
    fn test_parse_time_formats() {
        assert_eq!(t("09:00"), t("09:00:00"));
        assert!(parse_time("9am").is_err());
    }

    #[test]
    fn test_status_alias() {
        assert_eq!("confirmed".parse::<BookingStatus>().unwrap(), BookingStatus::Approved);
        let parsed: BookingStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(parsed, BookingStatus::Approved);
        assert!("archived".parse::<BookingStatus>().is_err());
    }

    #[test]
    fn test_booking_ref_parse() {
        let id = Uuid::new_v4();
        assert_eq!(id.to_string().parse::<BookingRef>().unwrap(), BookingRef::Booking(id));
        assert_eq!(
            "kim-20250101-1".parse::<BookingRef>().unwrap(),
            BookingRef::Group(GroupId("kim-20250101-1".into()))
        );
        assert!("  ".parse::<BookingRef>().is_err());
    }

    #[test]
    fn test_group_id_shape() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        let gid = GroupId::generate("Dr. Kim", date, Utc::now());
        assert!(gid.as_str().starts_with("drkim-20250314-"));
    }
}

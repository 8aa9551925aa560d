//! Snapshot capture and field-level comparison

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

use crate::models::{Booking, BookingSnapshot};

/// Capture the whitelisted fields of a booking row
pub fn build_snapshot(booking: &Booking) -> BookingSnapshot {
    BookingSnapshot {
        date: Some(booking.date.format("%Y-%m-%d").to_string()),
        start: Some(booking.span.start.format("%H:%M").to_string()),
        end: Some(booking.span.end.format("%H:%M").to_string()),
        requester_name: Some(booking.requester_name.clone()),
        course_name: booking.course_name.clone(),
        course_code: booking.course_code.clone(),
        shoot_type: Some(booking.shoot_type.clone()),
        resource_id: Some(booking.resource_id.to_string()),
        notes: booking.notes.clone(),
        break_start: booking
            .break_window
            .map(|b| b.start.format("%H:%M").to_string()),
        break_end: booking
            .break_window
            .map(|b| b.end.format("%H:%M").to_string()),
        group_id: booking.group_id.as_ref().map(|g| g.to_string()),
        sequence_order: Some(booking.sequence_order.to_string()),
        status: Some(booking.status.as_str().to_string()),
        is_active: Some(booking.is_active),
    }
}

#[derive(Debug, Clone, Copy)]
enum FieldKind {
    Date,
    Time,
    Id,
    Text,
}

/// User-editable fields compared by [`diff`]. Status and other derived
/// fields are captured in snapshots but never reported as changes.
const TRACKED: &[(&str, &str, FieldKind)] = &[
    ("date", "Date", FieldKind::Date),
    ("start", "Start time", FieldKind::Time),
    ("end", "End time", FieldKind::Time),
    ("requester_name", "Requester", FieldKind::Text),
    ("course_name", "Course name", FieldKind::Text),
    ("course_code", "Course code", FieldKind::Text),
    ("shoot_type", "Shoot type", FieldKind::Text),
    ("resource_id", "Resource", FieldKind::Id),
    ("notes", "Notes", FieldKind::Text),
];

fn field<'s>(snapshot: &'s BookingSnapshot, name: &str) -> Option<&'s str> {
    let value = match name {
        "date" => &snapshot.date,
        "start" => &snapshot.start,
        "end" => &snapshot.end,
        "requester_name" => &snapshot.requester_name,
        "course_name" => &snapshot.course_name,
        "course_code" => &snapshot.course_code,
        "shoot_type" => &snapshot.shoot_type,
        "resource_id" => &snapshot.resource_id,
        "notes" => &snapshot.notes,
        _ => return None,
    };
    value.as_deref()
}

/// Canonical text for comparison; empty means absent
fn normalize(kind: FieldKind, raw: Option<&str>) -> Option<String> {
    let value = raw.map(str::trim).filter(|v| !v.is_empty())?;
    let normalized = match kind {
        FieldKind::Date => normalize_date(value),
        FieldKind::Time => normalize_time(value),
        FieldKind::Id => normalize_id(value),
        FieldKind::Text => None,
    };
    Some(normalized.unwrap_or_else(|| value.to_string()))
}

fn normalize_date(value: &str) -> Option<String> {
    let day = value
        .get(..10)
        .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())?;
    Some(day.format("%Y-%m-%d").to_string())
}

fn normalize_time(value: &str) -> Option<String> {
    let time = ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.time()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(|dt| dt.time())
        })?;
    Some(time.format("%H:%M").to_string())
}

fn normalize_id(value: &str) -> Option<String> {
    let value = value.trim_matches('"');
    if let Ok(n) = value.parse::<i64>() {
        return Some(n.to_string());
    }
    match value.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Some((f as i64).to_string()),
        _ => Some(value.to_string()),
    }
}

/// One changed field, values already normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDiff {
    pub field: &'static str,
    pub label: &'static str,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl fmt::Display for FieldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} changed from {} to {}",
            self.label,
            self.old.as_deref().unwrap_or("(empty)"),
            self.new.as_deref().unwrap_or("(empty)")
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChangeSummary {
    NoChanges,
    Single(FieldDiff),
    Many(Vec<FieldDiff>),
}

impl ChangeSummary {
    pub fn is_empty(&self) -> bool {
        matches!(self, ChangeSummary::NoChanges)
    }

    pub fn len(&self) -> usize {
        match self {
            ChangeSummary::NoChanges => 0,
            ChangeSummary::Single(_) => 1,
            ChangeSummary::Many(diffs) => diffs.len(),
        }
    }
}

impl fmt::Display for ChangeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeSummary::NoChanges => f.write_str("no changes"),
            ChangeSummary::Single(d) => write!(f, "{d}"),
            ChangeSummary::Many(diffs) => {
                let labels: Vec<&str> = diffs.iter().map(|d| d.label).collect();
                write!(f, "{} fields changed: {}", diffs.len(), labels.join(", "))
            }
        }
    }
}

/// Compare the tracked fields of two snapshots after normalization
pub fn diff(old: &BookingSnapshot, new: &BookingSnapshot) -> ChangeSummary {
    let mut changes: Vec<FieldDiff> = TRACKED
        .iter()
        .filter_map(|&(name, label, kind)| {
            let before = normalize(kind, field(old, name));
            let after = normalize(kind, field(new, name));
            (before != after).then_some(FieldDiff {
                field: name,
                label,
                old: before,
                new: after,
            })
        })
        .collect();

    match changes.len() {
        0 => ChangeSummary::NoChanges,
        1 => ChangeSummary::Single(changes.remove(0)),
        _ => ChangeSummary::Many(changes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(start: &str, end: &str) -> BookingSnapshot {
        BookingSnapshot {
            date: Some("2025-05-02".into()),
            start: Some(start.into()),
            end: Some(end.into()),
            requester_name: Some("Kang".into()),
            resource_id: Some("3".into()),
            ..BookingSnapshot::default()
        }
    }

    #[test]
    fn test_formatting_only_is_no_change() {
        let a = snap("09:00", "10:00");
        let mut b = snap("09:00:00", "10:00:00.000");
        b.date = Some("2025-05-02T00:00:00Z".into());
        b.resource_id = Some("3.0".into());
        b.requester_name = Some("  Kang ".into());
        b.notes = Some("   ".into());
        assert_eq!(diff(&a, &b), ChangeSummary::NoChanges);
        assert_eq!(diff(&a, &b).to_string(), "no changes");
    }

    #[test]
    fn test_single_change_sentence() {
        let summary = diff(&snap("09:00", "10:00"), &snap("09:00", "11:00"));
        assert_eq!(summary.len(), 1);
        assert_eq!(summary.to_string(), "End time changed from 10:00 to 11:00");
    }

    #[test]
    fn test_many_changes_listed() {
        let mut b = snap("08:00", "11:00");
        b.notes = Some("bring tripod".into());
        let summary = diff(&snap("09:00", "10:00"), &b);
        assert_eq!(
            summary.to_string(),
            "3 fields changed: Start time, End time, Notes"
        );
    }

    #[test]
    fn test_status_is_not_tracked() {
        let a = snap("09:00", "10:00");
        let mut b = a.clone();
        b.status = Some("approved".into());
        b.is_active = Some(false);
        assert!(diff(&a, &b).is_empty());
    }
}

//! Booking composition: one row, or two legs around a break

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::invariants::{assert_booking_invariants, assert_group_invariants};
use crate::models::{
    Actor, Booking, BookingGroup, BookingRef, BookingStatus, GroupId, ResourceCategory,
    ResourceId, TimeSpan,
};
use crate::storage::BookingRepository;

/// Submitted booking fields, for creation and for edits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingForm {
    pub category: ResourceCategory,
    pub date: NaiveDate,
    /// Outer window; with a break this spans both legs
    pub span: TimeSpan,
    #[serde(default)]
    pub break_window: Option<TimeSpan>,
    pub requester_name: String,
    pub shoot_type: String,
    #[serde(default)]
    pub course_name: Option<String>,
    #[serde(default)]
    pub course_code: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl BookingForm {
    pub fn validate(&self) -> Result<()> {
        if self.requester_name.trim().is_empty() {
            return Err(Error::validation("requester name is required"));
        }
        if self.shoot_type.trim().is_empty() {
            return Err(Error::validation("shoot type is required"));
        }
        if self.span.start >= self.span.end {
            return Err(Error::validation(format!("start must be before end in {}", self.span)));
        }
        if let Some(brk) = self.break_window {
            if brk.start >= brk.end {
                return Err(Error::validation(format!(
                    "break start must be before break end in {brk}"
                )));
            }
            if !self.span.strictly_contains(&brk) {
                return Err(Error::validation(format!(
                    "break {} must lie strictly inside {}",
                    brk, self.span
                )));
            }
        }
        Ok(())
    }

    /// The spans that will actually occupy the resource
    pub fn legs(&self) -> Vec<TimeSpan> {
        match self.break_window {
            Some(brk) => vec![
                TimeSpan {
                    start: self.span.start,
                    end: brk.start,
                },
                TimeSpan {
                    start: brk.end,
                    end: self.span.end,
                },
            ],
            None => vec![self.span],
        }
    }
}

/// A composed reservation, ready to insert or update
#[derive(Debug, Clone, PartialEq)]
pub enum ComposedBooking {
    Single(Booking),
    Split(BookingGroup),
}

impl ComposedBooking {
    pub fn rows(&self) -> &[Booking] {
        match self {
            ComposedBooking::Single(booking) => std::slice::from_ref(booking),
            ComposedBooking::Split(group) => group.legs(),
        }
    }

    pub fn ids(&self) -> Vec<Uuid> {
        self.rows().iter().map(|b| b.id).collect()
    }

    pub fn reference(&self) -> BookingRef {
        match self {
            ComposedBooking::Single(booking) => BookingRef::Booking(booking.id),
            ComposedBooking::Split(group) => BookingRef::Group(group.id().clone()),
        }
    }

    pub fn resource_id(&self) -> ResourceId {
        self.rows()[0].resource_id
    }

    /// Rebuild from stored rows, checking the pairing of split legs
    pub fn from_rows(mut rows: Vec<Booking>) -> Result<Self> {
        match rows.len() {
            1 => Ok(ComposedBooking::Single(rows.remove(0))),
            2 => {
                rows.sort_by_key(|b| b.sequence_order);
                let second = rows.remove(1);
                let first = rows.remove(0);
                Ok(ComposedBooking::Split(BookingGroup::from_legs(first, second)?))
            }
            0 => Err(Error::NotFound("booking has no rows".into())),
            n => Err(Error::validation(format!("group has {n} legs, expected 2"))),
        }
    }
}

pub struct BookingComposer;

impl BookingComposer {
    /// Build the row(s) for a new reservation on an allocated resource
    pub fn compose(
        form: &BookingForm,
        resource_id: ResourceId,
        requester_ref: Option<i64>,
        actor: &Actor,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> Result<ComposedBooking> {
        form.validate()?;

        let base = Booking {
            id: Uuid::new_v4(),
            category: form.category,
            date: form.date,
            span: form.span,
            requester_name: form.requester_name.trim().to_string(),
            requester_ref,
            shoot_type: form.shoot_type.trim().to_string(),
            resource_id,
            status,
            is_active: true,
            group_id: None,
            sequence_order: 1,
            break_window: None,
            course_name: clean(&form.course_name),
            course_code: clean(&form.course_code),
            notes: clean(&form.notes),
            modification_reason: None,
            cancellation_reason: None,
            deletion_reason: None,
            prior_status: None,
            requested_by: None,
            created_by: actor.id,
            created_at: now,
            updated_at: now,
            updated_by: None,
        };

        let Some(brk) = form.break_window else {
            assert_booking_invariants(&base);
            return Ok(ComposedBooking::Single(base));
        };

        let group_id = GroupId::generate(&base.requester_name, form.date, now);
        let (first, second) = split_legs(base, group_id, brk, Uuid::new_v4());
        let group = BookingGroup::from_legs(first, second)?;
        assert_group_invariants(&group);
        Ok(ComposedBooking::Split(group))
    }

    /// Apply an edit to stored rows, keeping ids and shape.
    ///
    /// A split booking stays split and a single stays single. The result is
    /// re-armed to `pending`; `reason` is recorded as the modification reason.
    pub fn recompose(
        current: &ComposedBooking,
        form: &BookingForm,
        resource_id: ResourceId,
        actor: &Actor,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<ComposedBooking> {
        form.validate()?;

        let template = &current.rows()[0];
        let mut base = template.clone();
        base.category = form.category;
        base.date = form.date;
        base.span = form.span;
        base.requester_name = form.requester_name.trim().to_string();
        base.shoot_type = form.shoot_type.trim().to_string();
        base.resource_id = resource_id;
        base.course_name = clean(&form.course_name);
        base.course_code = clean(&form.course_code);
        base.notes = clean(&form.notes);
        base.status = BookingStatus::Pending;
        base.prior_status = None;
        base.requested_by = None;
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            base.modification_reason = Some(reason.to_string());
        }
        base.updated_at = now;
        base.updated_by = Some(actor.id);

        match (current, form.break_window) {
            (ComposedBooking::Single(_), None) => {
                assert_booking_invariants(&base);
                Ok(ComposedBooking::Single(base))
            }
            (ComposedBooking::Split(group), Some(brk)) => {
                let second_id = group.second().id;
                let created = (group.second().created_by, group.second().created_at);
                let (first, mut second) = split_legs(base, group.id().clone(), brk, second_id);
                (second.created_by, second.created_at) = created;
                let group = BookingGroup::from_legs(first, second)?;
                assert_group_invariants(&group);
                Ok(ComposedBooking::Split(group))
            }
            (ComposedBooking::Single(_), Some(_)) => Err(Error::validation(
                "a single booking cannot gain a break; cancel and rebook instead",
            )),
            (ComposedBooking::Split(_), None) => Err(Error::validation(
                "a split booking must keep a break window",
            )),
        }
    }

    /// Write every row of a composed booking
    #[instrument(skip(repo, composed), fields(reference = %composed.reference()))]
    pub fn insert<R: BookingRepository + ?Sized>(repo: &R, composed: &ComposedBooking) -> Result<()> {
        for row in composed.rows() {
            repo.insert_booking(row)?;
        }
        Ok(())
    }

    #[instrument(skip(repo, composed), fields(reference = %composed.reference()))]
    pub fn update<R: BookingRepository + ?Sized>(repo: &R, composed: &ComposedBooking) -> Result<()> {
        for row in composed.rows() {
            repo.update_booking(row)?;
        }
        Ok(())
    }
}

/// Cut `base` into two legs sharing `group_id`, abutting `brk`
fn split_legs(base: Booking, group_id: GroupId, brk: TimeSpan, second_id: Uuid) -> (Booking, Booking) {
    let mut first = base;
    first.group_id = Some(group_id);
    first.break_window = Some(brk);
    first.sequence_order = 1;

    let mut second = first.clone();
    second.id = second_id;
    second.sequence_order = 2;
    second.span = TimeSpan {
        start: brk.end,
        end: first.span.end,
    };
    first.span = TimeSpan {
        start: first.span.start,
        end: brk.start,
    };
    (first, second)
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Advisory break for long bookings; never applied automatically.
///
/// Prefers the canonical midday hour, then the evening hour, when the outer
/// window strictly encloses one. Otherwise a one-hour window centred on the
/// midpoint, aligned down to a half hour.
pub fn suggest_break(outer: &TimeSpan, threshold_minutes: i64) -> Option<TimeSpan> {
    if outer.duration_minutes() <= threshold_minutes {
        return None;
    }
    for (start, end) in [(12, 13), (18, 19)] {
        let canonical = TimeSpan {
            start: NaiveTime::from_hms_opt(start, 0, 0)?,
            end: NaiveTime::from_hms_opt(end, 0, 0)?,
        };
        if outer.strictly_contains(&canonical) {
            return Some(canonical);
        }
    }

    let midpoint = outer.start + Duration::minutes(outer.duration_minutes() / 2);
    let from_midnight = crate::models::minute_of_day(midpoint) - 30;
    let start = crate::models::time_from_minutes(from_midnight - from_midnight.rem_euclid(30))?;
    let window = TimeSpan {
        start,
        end: start + Duration::hours(1),
    };
    outer.strictly_contains(&window).then_some(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;

    fn span(a: &str, b: &str) -> TimeSpan {
        TimeSpan::parse(a, b).unwrap()
    }

    fn form(outer: TimeSpan, brk: Option<TimeSpan>) -> BookingForm {
        BookingForm {
            category: ResourceCategory::Academy,
            date: NaiveDate::from_ymd_opt(2025, 9, 3).unwrap(),
            span: outer,
            break_window: brk,
            requester_name: " Prof. Jang ".into(),
            shoot_type: "Lecture".into(),
            course_name: Some("Optics".into()),
            course_code: Some("  ".into()),
            notes: None,
        }
    }

    fn compose(form: &BookingForm) -> Result<ComposedBooking> {
        let actor = Actor::new("Mina", Role::Manager);
        BookingComposer::compose(form, 4, None, &actor, BookingStatus::Pending, Utc::now())
    }

    #[test]
    fn test_single_booking() {
        let composed = compose(&form(span("10:00", "12:00"), None)).unwrap();
        let ComposedBooking::Single(b) = &composed else {
            panic!("expected single");
        };
        assert_eq!(b.sequence_order, 1);
        assert!(b.group_id.is_none());
        assert_eq!(b.requester_name, "Prof. Jang");
        assert_eq!(b.course_code, None);
        assert_eq!(b.resource_id, 4);
    }

    #[test]
    fn test_split_around_break() {
        let outer = span("09:00", "15:00");
        let composed = compose(&form(outer, Some(span("12:00", "13:00")))).unwrap();
        let ComposedBooking::Split(group) = &composed else {
            panic!("expected split");
        };
        let (first, second) = (group.first(), group.second());
        assert_eq!(first.span, span("09:00", "12:00"));
        assert_eq!(second.span, span("13:00", "15:00"));
        assert_eq!((first.sequence_order, second.sequence_order), (1, 2));
        assert_eq!(first.group_id, second.group_id);
        assert_eq!(first.break_duration_minutes(), Some(60));
        assert_eq!(second.break_duration_minutes(), Some(60));
        assert_eq!(group.outer(), outer);
        assert_ne!(first.id, second.id);
        assert_eq!(composed.reference(), BookingRef::Group(group.id().clone()));
    }

    #[test]
    fn test_break_must_be_strictly_inside() {
        for brk in [span("09:00", "10:00"), span("14:00", "15:00"), span("14:00", "16:00")] {
            let result = compose(&form(span("09:00", "15:00"), Some(brk)));
            assert!(matches!(result, Err(Error::Validation(_))), "accepted {brk}");
        }
    }

    #[test]
    fn test_empty_or_inverted_break_rejected() {
        let noon = crate::models::parse_time("12:00").unwrap();
        let one = crate::models::parse_time("13:00").unwrap();
        // Built field-wise, as a deserialized form would be
        for brk in [
            TimeSpan { start: noon, end: noon },
            TimeSpan { start: one, end: noon },
        ] {
            let f = form(span("09:00", "15:00"), Some(brk));
            assert!(matches!(f.validate(), Err(Error::Validation(_))), "accepted {brk}");
            assert!(matches!(compose(&f), Err(Error::Validation(_))), "composed {brk}");
        }
    }

    #[test]
    fn test_missing_requester_rejected() {
        let mut f = form(span("09:00", "10:00"), None);
        f.requester_name = "   ".into();
        assert!(matches!(compose(&f), Err(Error::Validation(_))));
    }

    #[test]
    fn test_recompose_keeps_ids_and_rearms() {
        let original = compose(&form(span("09:00", "15:00"), Some(span("12:00", "13:00")))).unwrap();
        let admin = Actor::new("Root", Role::Admin);
        let edited = form(span("10:00", "16:00"), Some(span("12:30", "13:00")));

        let updated =
            BookingComposer::recompose(&original, &edited, 5, &admin, Some("room swap"), Utc::now())
                .unwrap();
        assert_eq!(updated.ids(), original.ids());
        assert_eq!(updated.reference(), original.reference());
        for row in updated.rows() {
            assert_eq!(row.status, BookingStatus::Pending);
            assert_eq!(row.resource_id, 5);
            assert_eq!(row.modification_reason.as_deref(), Some("room swap"));
            assert_eq!(row.updated_by, Some(admin.id));
        }
        assert_eq!(updated.rows()[1].span, span("13:00", "16:00"));
    }

    #[test]
    fn test_recompose_preserves_shape() {
        let admin = Actor::new("Root", Role::Admin);
        let single = compose(&form(span("09:00", "15:00"), None)).unwrap();
        let with_break = form(span("09:00", "15:00"), Some(span("12:00", "13:00")));
        assert!(BookingComposer::recompose(&single, &with_break, 4, &admin, None, Utc::now()).is_err());

        let split = compose(&with_break).unwrap();
        let without = form(span("09:00", "15:00"), None);
        assert!(BookingComposer::recompose(&split, &without, 4, &admin, None, Utc::now()).is_err());
    }

    #[test]
    fn test_from_rows_orders_legs() {
        let split = compose(&form(span("09:00", "15:00"), Some(span("12:00", "13:00")))).unwrap();
        let mut rows = split.rows().to_vec();
        rows.reverse();
        assert_eq!(ComposedBooking::from_rows(rows).unwrap(), split);
        assert!(matches!(ComposedBooking::from_rows(Vec::new()), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_suggest_break() {
        assert_eq!(suggest_break(&span("09:00", "12:00"), 240), None);
        assert_eq!(suggest_break(&span("09:00", "15:00"), 240), Some(span("12:00", "13:00")));
        assert_eq!(suggest_break(&span("15:00", "21:00"), 240), Some(span("18:00", "19:00")));
        // 06:00-11:00 midpoint 08:30, window 08:00-09:00
        assert_eq!(suggest_break(&span("06:00", "11:00"), 240), Some(span("08:00", "09:00")));
    }
}

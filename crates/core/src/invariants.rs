//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use uuid::Uuid;

use crate::models::{Booking, BookingGroup};

/// Validate that a booking row is internally consistent
pub fn assert_booking_invariants(booking: &Booking) {
    debug_assert!(
        booking.span.start < booking.span.end,
        "Booking {} has inverted span {:?}",
        booking.id,
        booking.span
    );

    // Terminal rows are kept for audit but never occupy a resource
    debug_assert!(
        !booking.status.is_terminal() || !booking.is_active,
        "Booking {} is {} but still active",
        booking.id,
        booking.status
    );

    debug_assert!(
        booking.group_id.is_some() == booking.break_window.is_some(),
        "Booking {} has group {:?} but break {:?}",
        booking.id,
        booking.group_id,
        booking.break_window
    );

    if let Some(brk) = booking.break_window {
        debug_assert!(
            brk.start < brk.end,
            "Booking {} has inverted break {:?}",
            booking.id,
            brk
        );
    }

    debug_assert!(
        matches!(booking.sequence_order, 1 | 2),
        "Booking {} has sequence order {}",
        booking.id,
        booking.sequence_order
    );

    debug_assert!(
        !booking.requester_name.trim().is_empty(),
        "Booking {} has empty requester",
        booking.id
    );
}

/// Validate that both legs of a split booking agree
pub fn assert_group_invariants(group: &BookingGroup) {
    let [first, second] = group.legs();
    assert_booking_invariants(first);
    assert_booking_invariants(second);

    let outer = group.outer();
    let brk = group.break_window();
    debug_assert!(
        outer.start < brk.start && brk.start < brk.end && brk.end < outer.end,
        "Group {} break {:?} not strictly inside {:?}",
        group.id(),
        brk,
        outer
    );

    debug_assert!(
        first.status == second.status && first.is_active == second.is_active,
        "Group {} legs diverged: {} / {}",
        group.id(),
        first.status,
        second.status
    );
}

/// Validate that an actor id is not nil
pub fn assert_actor_id_valid(actor_id: Uuid, context: &str) {
    debug_assert!(
        actor_id != Uuid::nil(),
        "Nil actor_id in context: {}",
        context
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{BookingStatus, GroupId, ResourceCategory, TimeSpan};
    use chrono::{NaiveDate, Utc};

    fn make_booking() -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            category: ResourceCategory::Academy,
            date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            span: TimeSpan::parse("09:00", "12:00").unwrap(),
            requester_name: "Prof. Oh".to_string(),
            requester_ref: None,
            shoot_type: "Lecture".to_string(),
            resource_id: 1,
            status: BookingStatus::Pending,
            is_active: true,
            group_id: None,
            sequence_order: 1,
            break_window: None,
            course_name: None,
            course_code: None,
            notes: None,
            modification_reason: None,
            cancellation_reason: None,
            deletion_reason: None,
            prior_status: None,
            requested_by: None,
            created_by: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            updated_by: None,
        }
    }

    #[test]
    fn test_valid_booking() {
        assert_booking_invariants(&make_booking());
    }

    #[test]
    fn test_valid_group() {
        let brk = TimeSpan::parse("12:00", "13:00").unwrap();
        let gid = GroupId("oh-20250901-1".into());
        let mut first = make_booking();
        first.group_id = Some(gid.clone());
        first.break_window = Some(brk);
        let mut second = first.clone();
        second.id = Uuid::new_v4();
        second.sequence_order = 2;
        second.span = TimeSpan::parse("13:00", "15:00").unwrap();

        let group = BookingGroup::from_legs(first, second).unwrap();
        assert_group_invariants(&group);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "still active")]
    fn test_cancelled_must_be_inactive() {
        let mut booking = make_booking();
        booking.status = BookingStatus::Cancelled;
        assert_booking_invariants(&booking);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "Nil actor_id")]
    fn test_nil_actor() {
        assert_actor_id_valid(Uuid::nil(), "submit");
    }
}

//! Booking approval workflow
//!
//! Every permitted status change is one row of [`TRANSITIONS`], keyed by
//! (role, current state, action). Anything not listed is rejected.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::models::{Actor, Booking, BookingStatus, ChangeType, ParseEnumError, Role};

/// Actions a caller can request against an existing booking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    // Admin
    Approve,
    Cancel,
    Delete,
    ApproveModification,
    CancelApprove,
    DeleteApprove,
    RejectRequest,

    // Manager
    ModifyRequest,
    CancelRequest,
    DeleteRequest,
    Withdraw,
    Resubmit,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::Approve,
        Action::Cancel,
        Action::Delete,
        Action::ApproveModification,
        Action::CancelApprove,
        Action::DeleteApprove,
        Action::RejectRequest,
        Action::ModifyRequest,
        Action::CancelRequest,
        Action::DeleteRequest,
        Action::Withdraw,
        Action::Resubmit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Approve => "approve",
            Action::Cancel => "cancel",
            Action::Delete => "delete",
            Action::ApproveModification => "approve_modification",
            Action::CancelApprove => "cancel_approve",
            Action::DeleteApprove => "delete_approve",
            Action::RejectRequest => "reject_request",
            Action::ModifyRequest => "modify_request",
            Action::CancelRequest => "cancel_request",
            Action::DeleteRequest => "delete_request",
            Action::Withdraw => "withdraw",
            Action::Resubmit => "resubmit",
        }
    }

    /// Manager requests must say why
    pub fn requires_reason(&self) -> bool {
        matches!(
            self,
            Action::ModifyRequest | Action::CancelRequest | Action::DeleteRequest
        )
    }

    /// Opens a request that a later withdraw/reject can roll back
    fn opens_request(&self) -> bool {
        self.requires_reason()
    }

    pub fn change_type(&self) -> ChangeType {
        match self {
            Action::Approve => ChangeType::Approved,
            Action::Cancel | Action::CancelApprove => ChangeType::Cancelled,
            Action::Delete | Action::DeleteApprove => ChangeType::Deleted,
            Action::ApproveModification => ChangeType::ModificationApproved,
            Action::RejectRequest => ChangeType::RequestRejected,
            Action::ModifyRequest => ChangeType::ModificationRequested,
            Action::CancelRequest => ChangeType::CancellationRequested,
            Action::DeleteRequest => ChangeType::DeletionRequested,
            Action::Withdraw => ChangeType::RequestWithdrawn,
            Action::Resubmit => ChangeType::Resubmitted,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| ParseEnumError::new("action", s))
    }
}

/// Where a permitted transition lands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    To(BookingStatus),
    /// Back to the state recorded when the open request was raised
    PriorState,
}

/// One allowed (role, from-states, action) combination
#[derive(Debug)]
pub struct Rule {
    pub role: Role,
    pub from: &'static [BookingStatus],
    pub action: Action,
    pub to: Target,
}

use BookingStatus as S;

const NON_TERMINAL: &[BookingStatus] = &[
    S::Pending,
    S::Approved,
    S::ModificationRequested,
    S::ModificationApproved,
    S::CancellationRequested,
    S::DeletionRequested,
];
const NOT_YET_APPROVED: &[BookingStatus] = &[
    S::Pending,
    S::ModificationRequested,
    S::ModificationApproved,
    S::CancellationRequested,
    S::DeletionRequested,
];
const GRANTED: &[BookingStatus] = &[S::Approved, S::ModificationApproved];
const OPEN_REQUESTS: &[BookingStatus] = &[
    S::ModificationRequested,
    S::CancellationRequested,
    S::DeletionRequested,
];

/// The complete allow-table
#[rustfmt::skip]
pub const TRANSITIONS: &[Rule] = &[
    // Admin may decide directly from any non-terminal state
    Rule { role: Role::Admin, from: NOT_YET_APPROVED, action: Action::Approve, to: Target::To(S::Approved) },
    Rule { role: Role::Admin, from: NON_TERMINAL, action: Action::Cancel, to: Target::To(S::Cancelled) },
    Rule { role: Role::Admin, from: NON_TERMINAL, action: Action::Delete, to: Target::To(S::Deleted) },
    Rule { role: Role::Admin, from: &[S::ModificationRequested], action: Action::ApproveModification, to: Target::To(S::ModificationApproved) },
    Rule { role: Role::Admin, from: &[S::CancellationRequested], action: Action::CancelApprove, to: Target::To(S::Cancelled) },
    Rule { role: Role::Admin, from: &[S::DeletionRequested], action: Action::DeleteApprove, to: Target::To(S::Deleted) },
    Rule { role: Role::Admin, from: OPEN_REQUESTS, action: Action::RejectRequest, to: Target::PriorState },
    // Manager requests against granted bookings
    Rule { role: Role::Manager, from: GRANTED, action: Action::ModifyRequest, to: Target::To(S::ModificationRequested) },
    Rule { role: Role::Manager, from: GRANTED, action: Action::CancelRequest, to: Target::To(S::CancellationRequested) },
    Rule { role: Role::Manager, from: GRANTED, action: Action::DeleteRequest, to: Target::To(S::DeletionRequested) },
    Rule { role: Role::Manager, from: OPEN_REQUESTS, action: Action::Withdraw, to: Target::PriorState },
    Rule { role: Role::Manager, from: &[S::ModificationApproved], action: Action::Resubmit, to: Target::To(S::Pending) },
];

/// Look up the allow-table
pub fn lookup(role: Role, from: BookingStatus, action: Action) -> Option<Target> {
    TRANSITIONS
        .iter()
        .find(|r| r.role == role && r.action == action && r.from.contains(&from))
        .map(|r| r.to)
}

/// An accepted transition, not yet applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: Action,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub reason: Option<String>,
}

impl Transition {
    pub fn change_type(&self) -> ChangeType {
        self.action.change_type()
    }
}

pub struct StatusStateMachine;

impl StatusStateMachine {
    /// Validate `action` against the booking's current state.
    ///
    /// Never mutates; callers apply the returned [`Transition`] with
    /// [`StatusStateMachine::apply`].
    pub fn request_transition(
        booking: &Booking,
        action: Action,
        actor: &Actor,
        reason: Option<&str>,
    ) -> Result<Transition> {
        if !booking.is_active {
            return Err(Error::denied(format!(
                "booking {} is {} and can no longer change",
                booking.id, booking.status
            )));
        }

        let target = lookup(actor.role, booking.status, action).ok_or_else(|| {
            Error::denied(format!(
                "{} cannot {} a {} booking",
                actor.role, action, booking.status
            ))
        })?;

        let reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        if action.requires_reason() && reason.is_none() {
            return Err(Error::validation(format!("a reason is required to {action}")));
        }

        if action == Action::Withdraw && booking.requested_by != Some(actor.id) {
            return Err(Error::denied("only the requester may withdraw this request"));
        }

        let to = match target {
            Target::To(status) => status,
            Target::PriorState => booking.prior_status.unwrap_or(BookingStatus::Approved),
        };

        Ok(Transition {
            action,
            from: booking.status,
            to,
            reason,
        })
    }

    /// Apply an accepted transition to a booking row
    pub fn apply(transition: &Transition, booking: &mut Booking, actor: &Actor, now: DateTime<Utc>) {
        booking.status = transition.to;
        booking.is_active = !transition.to.is_terminal();

        if let Some(reason) = &transition.reason {
            match transition.action {
                Action::ModifyRequest => booking.modification_reason = Some(reason.clone()),
                Action::CancelRequest | Action::Cancel | Action::CancelApprove => {
                    booking.cancellation_reason = Some(reason.clone())
                }
                Action::DeleteRequest | Action::Delete | Action::DeleteApprove => {
                    booking.deletion_reason = Some(reason.clone())
                }
                _ => {}
            }
        }

        if transition.action.opens_request() {
            booking.prior_status = Some(transition.from);
            booking.requested_by = Some(actor.id);
        } else if transition.from.is_open_request() {
            booking.prior_status = None;
            booking.requested_by = None;
        }

        booking.updated_at = now;
        booking.updated_by = Some(actor.id);
    }

    /// Field edits: admin on any active booking, manager only while pending
    /// or after a modification was granted.
    pub fn can_edit(role: Role, booking: &Booking) -> bool {
        if !booking.is_active || booking.status.is_terminal() {
            return false;
        }
        match role {
            Role::Admin => true,
            Role::Manager => matches!(
                booking.status,
                BookingStatus::Pending | BookingStatus::ModificationApproved
            ),
            Role::Basic => false,
        }
    }

    pub fn ensure_editable(actor: &Actor, booking: &Booking) -> Result<()> {
        if Self::can_edit(actor.role, booking) {
            Ok(())
        } else {
            Err(Error::denied(format!(
                "{} cannot edit a {} booking",
                actor.role, booking.status
            )))
        }
    }

    /// Who may create bookings, and in which state they start
    pub fn initial_status(role: Role) -> Result<BookingStatus> {
        match role {
            Role::Admin => Ok(BookingStatus::Approved),
            Role::Manager => Ok(BookingStatus::Pending),
            Role::Basic => Err(Error::denied("basic users cannot create bookings")),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::NaiveDate;
    use uuid::Uuid;

    use super::*;
    use crate::models::{ResourceCategory, TimeSpan};

    fn booking(status: BookingStatus) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            category: ResourceCategory::Studio,
            date: NaiveDate::from_ymd_opt(2025, 5, 2).unwrap(),
            span: TimeSpan::parse("10:00", "12:00").unwrap(),
            requester_name: "Lee".into(),
            requester_ref: None,
            shoot_type: "Lecture".into(),
            resource_id: 1,
            status,
            is_active: !status.is_terminal(),
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

    /// Written out independently of `TRANSITIONS`
    fn expected_allowed() -> HashSet<(Role, BookingStatus, Action)> {
        use Action as A;
        let mut set = HashSet::new();
        for s in [S::Pending, S::ModificationRequested, S::ModificationApproved, S::CancellationRequested, S::DeletionRequested] {
            set.insert((Role::Admin, s, A::Approve));
        }
        for s in [S::Pending, S::Approved, S::ModificationRequested, S::ModificationApproved, S::CancellationRequested, S::DeletionRequested] {
            set.insert((Role::Admin, s, A::Cancel));
            set.insert((Role::Admin, s, A::Delete));
        }
        set.insert((Role::Admin, S::ModificationRequested, A::ApproveModification));
        set.insert((Role::Admin, S::CancellationRequested, A::CancelApprove));
        set.insert((Role::Admin, S::DeletionRequested, A::DeleteApprove));
        for s in [S::ModificationRequested, S::CancellationRequested, S::DeletionRequested] {
            set.insert((Role::Admin, s, A::RejectRequest));
            set.insert((Role::Manager, s, A::Withdraw));
        }
        for s in [S::Approved, S::ModificationApproved] {
            set.insert((Role::Manager, s, A::ModifyRequest));
            set.insert((Role::Manager, s, A::CancelRequest));
            set.insert((Role::Manager, s, A::DeleteRequest));
        }
        set.insert((Role::Manager, S::ModificationApproved, A::Resubmit));
        set
    }

    #[test]
    fn test_table_matches_cartesian_product() {
        let allowed = expected_allowed();
        for role in Role::ALL {
            for status in BookingStatus::ALL {
                for action in Action::ALL {
                    assert_eq!(
                        lookup(role, status, action).is_some(),
                        allowed.contains(&(role, status, action)),
                        "{role} / {status} / {action}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_rejections_over_cartesian_product() {
        let allowed = expected_allowed();
        for role in Role::ALL {
            for status in BookingStatus::ALL {
                for action in Action::ALL {
                    let mut b = booking(status);
                    let actor = Actor::new("someone", role);
                    b.requested_by = Some(actor.id);
                    let result = StatusStateMachine::request_transition(&b, action, &actor, Some("because"));
                    let should_pass = allowed.contains(&(role, status, action));
                    assert_eq!(result.is_ok(), should_pass, "{role} / {status} / {action}");
                    assert_eq!(b.status, status);
                }
            }
        }
    }

    #[test]
    fn test_basic_has_no_transitions() {
        assert!(TRANSITIONS.iter().all(|r| r.role != Role::Basic));
        assert!(StatusStateMachine::initial_status(Role::Basic).is_err());
    }

    #[test]
    fn test_modify_request_requires_reason() {
        let b = booking(BookingStatus::Approved);
        let manager = Actor::new("Park", Role::Manager);
        for reason in [None, Some(""), Some("   ")] {
            let result = StatusStateMachine::request_transition(&b, Action::ModifyRequest, &manager, reason);
            assert!(matches!(result, Err(Error::Validation(_))));
        }
    }

    #[test]
    fn test_second_modify_request_rejected() {
        let mut b = booking(BookingStatus::Approved);
        let manager = Actor::new("Park", Role::Manager);
        let t = StatusStateMachine::request_transition(&b, Action::ModifyRequest, &manager, Some("new room"))
            .unwrap();
        StatusStateMachine::apply(&t, &mut b, &manager, Utc::now());
        assert_eq!(b.status, BookingStatus::ModificationRequested);
        assert_eq!(b.prior_status, Some(BookingStatus::Approved));
        assert_eq!(b.modification_reason.as_deref(), Some("new room"));

        let again = StatusStateMachine::request_transition(&b, Action::ModifyRequest, &manager, Some("again"));
        assert!(matches!(again, Err(Error::PermissionDenied(_))));
    }

    #[test]
    fn test_withdraw_restores_prior_state_for_requester_only() {
        let mut b = booking(BookingStatus::ModificationApproved);
        let manager = Actor::new("Park", Role::Manager);
        let other = Actor::new("Choi", Role::Manager);
        let t = StatusStateMachine::request_transition(&b, Action::CancelRequest, &manager, Some("moved"))
            .unwrap();
        StatusStateMachine::apply(&t, &mut b, &manager, Utc::now());

        let denied = StatusStateMachine::request_transition(&b, Action::Withdraw, &other, None);
        assert!(matches!(denied, Err(Error::PermissionDenied(_))));

        let t = StatusStateMachine::request_transition(&b, Action::Withdraw, &manager, None).unwrap();
        assert_eq!(t.to, BookingStatus::ModificationApproved);
        StatusStateMachine::apply(&t, &mut b, &manager, Utc::now());
        assert_eq!(b.prior_status, None);
        assert_eq!(b.requested_by, None);
    }

    #[test]
    fn test_modification_grant_cycle() {
        let mut b = booking(BookingStatus::Approved);
        let manager = Actor::new("Park", Role::Manager);
        let admin = Actor::new("Root", Role::Admin);
        let steps = [
            (&manager, Action::ModifyRequest, BookingStatus::ModificationRequested),
            (&admin, Action::ApproveModification, BookingStatus::ModificationApproved),
            (&manager, Action::Resubmit, BookingStatus::Pending),
            (&admin, Action::Approve, BookingStatus::Approved),
        ];
        for (actor, action, expected) in steps {
            let t = StatusStateMachine::request_transition(&b, action, actor, Some("edit course code"))
                .unwrap();
            StatusStateMachine::apply(&t, &mut b, actor, Utc::now());
            assert_eq!(b.status, expected);
        }
    }

    #[test]
    fn test_cancel_approve_deactivates() {
        let mut b = booking(BookingStatus::CancellationRequested);
        let admin = Actor::new("Root", Role::Admin);
        let t = StatusStateMachine::request_transition(&b, Action::CancelApprove, &admin, None).unwrap();
        StatusStateMachine::apply(&t, &mut b, &admin, Utc::now());
        assert_eq!(b.status, BookingStatus::Cancelled);
        assert!(!b.is_active);

        for role in Role::ALL {
            assert!(!StatusStateMachine::can_edit(role, &b));
            for action in Action::ALL {
                let actor = Actor::new("x", role);
                assert!(StatusStateMachine::request_transition(&b, action, &actor, Some("r")).is_err());
            }
        }
    }

    #[test]
    fn test_edit_permissions() {
        use BookingStatus::*;
        for status in BookingStatus::ALL {
            let b = booking(status);
            assert_eq!(StatusStateMachine::can_edit(Role::Admin, &b), !status.is_terminal());
            assert_eq!(
                StatusStateMachine::can_edit(Role::Manager, &b),
                matches!(status, Pending | ModificationApproved)
            );
            assert!(!StatusStateMachine::can_edit(Role::Basic, &b));
        }
    }

    #[test]
    fn test_action_parse() {
        assert_eq!("cancel_approve".parse::<Action>().unwrap(), Action::CancelApprove);
        assert!("launch".parse::<Action>().is_err());
    }
}

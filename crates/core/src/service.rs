//! Booking operations exposed to callers
//!
//! Each operation runs its read-check-write sequence inside one database
//! transaction, then records history and sends notifications. History and
//! notification failures are logged and never undo the committed change.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::allocation::{Allocation, AllocationRequest, SlotAllocator};
use crate::composer::{BookingComposer, BookingForm, ComposedBooking};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::history::{build_snapshot, summarize, ChangeRecord, Clock, HistoryRecorder, SystemClock};
use crate::invariants::{assert_actor_id_valid, assert_booking_invariants};
use crate::models::{
    Actor, Booking, BookingRef, BookingStatus, ChangeType, HistoryView, ResourceId, TimeSpan,
};
use crate::notify::{dispatch, LogNotifier, Notification, NotificationKind, Notifier};
use crate::storage::{
    BookingFilter, BookingRepository, CatalogRepository, Database, HistoryRepository, Page,
};
use crate::workflow::{Action, StatusStateMachine};

/// Result of an accepted create, transition or edit
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingOutcome {
    pub booking_ids: Vec<Uuid>,
    pub resource_id: ResourceId,
    pub status: BookingStatus,
    pub message: String,
}

/// `{success, message, booking_ids}` view of any operation result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionResponse {
    pub success: bool,
    pub message: String,
    pub booking_ids: Vec<Uuid>,
}

impl ActionResponse {
    /// Response for a result the caller still holds
    pub fn of(result: &Result<BookingOutcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                success: true,
                message: outcome.message.clone(),
                booking_ids: outcome.booking_ids.clone(),
            },
            Err(e) => Self {
                success: false,
                message: e.user_message(),
                booking_ids: Vec::new(),
            },
        }
    }
}

impl From<Result<BookingOutcome>> for ActionResponse {
    fn from(result: Result<BookingOutcome>) -> Self {
        Self::of(&result)
    }
}

pub struct BookingService {
    db: Database,
    config: Config,
    recorder: HistoryRecorder,
    notifier: Arc<dyn Notifier>,
}

impl BookingService {
    pub fn new(db: Database, config: Config) -> Self {
        Self::with_parts(db, config, Arc::new(SystemClock), Arc::new(LogNotifier))
    }

    pub fn with_parts(
        db: Database,
        config: Config,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let recorder = HistoryRecorder::new(&config.history, clock);
        Self {
            db,
            config,
            recorder,
            notifier,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Allocate a resource and create one booking, or two legs around a break
    #[instrument(skip(self, form, actor), fields(action = "submit", actor = %actor, date = %form.date))]
    pub fn submit_booking(&self, form: &BookingForm, actor: &Actor) -> Result<BookingOutcome> {
        assert_actor_id_valid(actor.id, "submit_booking");
        let status = StatusStateMachine::initial_status(actor.role)?;
        form.validate()?;

        let requester_ref = self
            .db
            .find_requester_by_name(&form.requester_name)?
            .map(|r| r.id);
        let now = self.recorder.now();
        let allocator = SlotAllocator::new(&self.config.schedule);

        let composed = self
            .db
            .transaction(|store| {
                let request = AllocationRequest::new(&form.shoot_type, form.date, form.legs());
                let resource_id = allocator.allocate(store, &request)?.into_resource()?;
                let composed =
                    BookingComposer::compose(form, resource_id, requester_ref, actor, status, now)?;
                BookingComposer::insert(store, &composed)?;
                Ok(composed)
            })
            .inspect_err(|e| warn!(error = %e, "Booking rejected"))?;

        let reference = composed.reference();
        info!(%reference, resource_id = composed.resource_id(), %status, "Booking created");

        for row in composed.rows() {
            self.record(
                actor,
                &reference,
                ChangeRecord::new(row.id, ChangeType::Created)
                    .snapshots(None, Some(build_snapshot(row))),
            );
        }
        self.notify(NotificationKind::Created, composed.rows(), actor, None);

        let message = match (&composed, status) {
            (ComposedBooking::Split(_), BookingStatus::Approved) => {
                "Split booking confirmed.".to_string()
            }
            (ComposedBooking::Split(_), _) => "Split booking submitted for approval.".to_string(),
            (_, BookingStatus::Approved) => "Booking confirmed.".to_string(),
            _ => "Booking submitted for approval.".to_string(),
        };
        Ok(BookingOutcome {
            booking_ids: composed.ids(),
            resource_id: composed.resource_id(),
            status,
            message,
        })
    }

    /// Apply a workflow action to a booking, or to every leg of its group
    #[instrument(skip(self, reason, actor), fields(action = %action, actor = %actor, reference = %target))]
    pub fn request_transition(
        &self,
        target: &BookingRef,
        action: Action,
        reason: Option<&str>,
        actor: &Actor,
    ) -> Result<BookingOutcome> {
        let now = self.recorder.now();

        let (before, after, transition) = self
            .db
            .transaction(|store| {
                let before = load_rows(store, target)?;
                let mut after = Vec::with_capacity(before.len());
                let mut accepted = None;
                // Every leg must accept before any row is written
                for row in &before {
                    let transition =
                        StatusStateMachine::request_transition(row, action, actor, reason)?;
                    let mut updated = row.clone();
                    StatusStateMachine::apply(&transition, &mut updated, actor, now);
                    assert_booking_invariants(&updated);
                    after.push(updated);
                    accepted = Some(transition);
                }
                for row in &after {
                    store.update_booking(row)?;
                }
                let transition =
                    accepted.ok_or_else(|| Error::NotFound(format!("{target} has no rows")))?;
                Ok((before, after, transition))
            })
            .inspect_err(|e| warn!(error = %e, "Transition rejected"))?;

        let reference = after
            .first()
            .map(Booking::reference)
            .unwrap_or_else(|| target.clone());
        info!(%reference, from = %transition.from, to = %transition.to, "Transition applied");

        for (old, new) in before.iter().zip(&after) {
            self.record(
                actor,
                &reference,
                ChangeRecord::new(new.id, transition.change_type())
                    .reason(transition.reason.as_deref())
                    .snapshots(Some(build_snapshot(old)), Some(build_snapshot(new))),
            );
        }

        let kind = match action {
            Action::ModifyRequest => Some(NotificationKind::ModificationRequested),
            Action::CancelRequest => Some(NotificationKind::CancellationRequested),
            _ => None,
        };
        if let Some(kind) = kind {
            self.notify(kind, &after, actor, transition.reason.as_deref());
        }

        Ok(BookingOutcome {
            booking_ids: after.iter().map(|b| b.id).collect(),
            resource_id: after.first().map(|b| b.resource_id).unwrap_or_default(),
            status: transition.to,
            message: format!(
                "Status changed from {} to {}.",
                transition.from, transition.to
            ),
        })
    }

    /// Change booking fields while editable; the result returns to `pending`.
    ///
    /// A grouped booking is re-checked and rewritten as a whole, with its own
    /// rows excluded from the conflict check.
    #[instrument(skip(self, form, reason, actor), fields(action = "edit", actor = %actor, reference = %target))]
    pub fn edit_booking(
        &self,
        target: &BookingRef,
        form: &BookingForm,
        reason: Option<&str>,
        actor: &Actor,
    ) -> Result<BookingOutcome> {
        form.validate()?;
        let now = self.recorder.now();
        let allocator = SlotAllocator::new(&self.config.schedule);

        let (current, updated) = self
            .db
            .transaction(|store| {
                let current = ComposedBooking::from_rows(load_rows(store, target)?)?;
                for row in current.rows() {
                    StatusStateMachine::ensure_editable(actor, row)?;
                }
                let request = AllocationRequest::new(&form.shoot_type, form.date, form.legs())
                    .excluding(Some(current.reference()))
                    .preferring(Some(current.resource_id()));
                let resource_id = allocator.allocate(store, &request)?.into_resource()?;
                let updated =
                    BookingComposer::recompose(&current, form, resource_id, actor, reason, now)?;
                BookingComposer::update(store, &updated)?;
                Ok((current, updated))
            })
            .inspect_err(|e| warn!(error = %e, "Edit rejected"))?;

        let reference = updated.reference();
        info!(%reference, resource_id = updated.resource_id(), "Booking edited");

        for (old, new) in current.rows().iter().zip(updated.rows()) {
            self.record(
                actor,
                &reference,
                ChangeRecord::new(new.id, ChangeType::Updated)
                    .reason(reason)
                    .snapshots(Some(build_snapshot(old)), Some(build_snapshot(new))),
            );
        }

        Ok(BookingOutcome {
            booking_ids: updated.ids(),
            resource_id: updated.resource_id(),
            status: BookingStatus::Pending,
            message: "Booking updated and resubmitted for approval.".to_string(),
        })
    }

    /// Free resource for a window, or alternative windows that day.
    ///
    /// `exclude` may name any leg of a split booking; the whole group is
    /// left out of the check.
    #[instrument(skip(self), fields(action = "check_availability"))]
    pub fn check_availability(
        &self,
        shoot_type: &str,
        date: NaiveDate,
        span: TimeSpan,
        exclude: Option<&BookingRef>,
    ) -> Result<Allocation> {
        let exclude = match exclude {
            Some(target) => load_rows(&self.db, target)?.first().map(Booking::reference),
            None => None,
        };
        let request = AllocationRequest::new(shoot_type, date, vec![span]).excluding(exclude);
        SlotAllocator::new(&self.config.schedule).allocate(&self.db, &request)
    }

    /// History of one booking row, oldest first, with change summaries
    pub fn get_history(&self, booking_id: Uuid) -> Result<Vec<HistoryView>> {
        if self.db.find_booking(booking_id)?.is_none() {
            return Err(Error::NotFound(format!("booking {booking_id}")));
        }
        let entries = self.db.list_history(booking_id, Page::all())?;
        Ok(entries.into_iter().map(summarize).collect())
    }

    /// Record an externally reported event, e.g. a cross-check, using a
    /// free-form change type
    #[instrument(skip(self, reason, actor), fields(action = "record_external", actor = %actor, booking_id = %booking_id))]
    pub fn record_external(
        &self,
        booking_id: Uuid,
        raw_change_type: &str,
        reason: Option<&str>,
        actor: &Actor,
    ) -> Result<crate::history::AppendOutcome> {
        if self.db.find_booking(booking_id)?.is_none() {
            return Err(Error::NotFound(format!("booking {booking_id}")));
        }
        self.recorder
            .append_legacy(&self.db, actor, booking_id, raw_change_type, reason)
    }

    /// Active bookings on a date in schedule order
    pub fn day_schedule(&self, date: NaiveDate) -> Result<Vec<Booking>> {
        let filter = BookingFilter {
            date: Some(date),
            active_only: true,
            ..BookingFilter::default()
        };
        self.db.list_bookings(&filter, Page::all())
    }

    fn record(&self, actor: &Actor, reference: &BookingRef, record: ChangeRecord) {
        let change_type = record.change_type;
        if let Err(e) = self.recorder.append(&self.db, actor, record) {
            error!(
                error = %e,
                %reference,
                actor = %actor,
                change_type = %change_type,
                "History not recorded"
            );
        }
    }

    fn notify(&self, kind: NotificationKind, rows: &[Booking], actor: &Actor, reason: Option<&str>) {
        if let Some(notification) = Notification::render(kind, rows, actor, reason) {
            dispatch(self.notifier.as_ref(), &notification);
        }
    }
}

/// Resolve a reference to stored rows; any leg of a group yields the group
fn load_rows<R: BookingRepository + ?Sized>(repo: &R, target: &BookingRef) -> Result<Vec<Booking>> {
    match target {
        BookingRef::Booking(id) => {
            let booking = repo
                .find_booking(*id)?
                .ok_or_else(|| Error::NotFound(format!("booking {id}")))?;
            match &booking.group_id {
                Some(gid) => repo.find_group(gid),
                None => Ok(vec![booking]),
            }
        }
        BookingRef::Group(gid) => {
            let legs = repo.find_group(gid)?;
            if legs.is_empty() {
                return Err(Error::NotFound(format!("group {gid}")));
            }
            Ok(legs)
        }
    }
}

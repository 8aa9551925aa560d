//! Fire-and-forget outbound notifications
//!
//! Delivery is outside the core. Failures are logged and dropped so a
//! notifier can never fail the action that triggered it.

use std::fmt;
use std::sync::Mutex;

use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Actor, Booking};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    Created,
    ModificationRequested,
    CancellationRequested,
}

impl NotificationKind {
    fn heading(&self) -> &'static str {
        match self {
            NotificationKind::Created => "New booking",
            NotificationKind::ModificationRequested => "Modification requested",
            NotificationKind::CancellationRequested => "Cancellation requested",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.heading())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub booking_ids: Vec<Uuid>,
    pub text: String,
}

impl Notification {
    /// Render the templated summary for one booking (all legs of a split)
    pub fn render(
        kind: NotificationKind,
        rows: &[Booking],
        actor: &Actor,
        reason: Option<&str>,
    ) -> Option<Self> {
        let first = rows.first()?;
        let last = rows.last()?;

        let mut text = format!(
            "[{}] {} | {} | {} {}-{}",
            kind.heading(),
            first.requester_name,
            first.shoot_type,
            first.date,
            first.span.start.format("%H:%M"),
            last.span.end.format("%H:%M"),
        );
        if let Some(brk) = first.break_window {
            text.push_str(&format!(" (break {brk})"));
        }
        text.push_str(&format!(" | resource {} | by {}", first.resource_id, actor.display_name));
        if let Some(course) = &first.course_name {
            text.push_str(&format!(" | course {course}"));
        }
        if let Some(reason) = reason {
            text.push_str(&format!(" | reason: {reason}"));
        }

        Some(Self {
            kind,
            booking_ids: rows.iter().map(|b| b.id).collect(),
            text,
        })
    }
}

pub trait Notifier: Send + Sync {
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Send and swallow any failure
pub fn dispatch(notifier: &dyn Notifier, notification: &Notification) {
    if let Err(e) = notifier.send(notification) {
        warn!(kind = %notification.kind, error = %e, "Notification delivery failed");
    }
}

/// Writes notifications to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        info!(kind = %notification.kind, text = %notification.text, "Notification");
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn send(&self, _notification: &Notification) -> Result<()> {
        Ok(())
    }
}

/// Keeps every notification in memory, for inspection
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};

    use super::*;
    use crate::error::Error;
    use crate::models::{BookingStatus, GroupId, ResourceCategory, Role, TimeSpan};

    struct FailingNotifier;

    impl Notifier for FailingNotifier {
        fn send(&self, _notification: &Notification) -> Result<()> {
            Err(Error::Io(std::io::Error::other("webhook down")))
        }
    }

    fn leg(span: &str, end: &str, seq: u8) -> Booking {
        let now = Utc::now();
        Booking {
            id: Uuid::new_v4(),
            category: ResourceCategory::Academy,
            date: NaiveDate::from_ymd_opt(2025, 9, 3).unwrap(),
            span: TimeSpan::parse(span, end).unwrap(),
            requester_name: "Prof. Jang".into(),
            requester_ref: None,
            shoot_type: "Lecture".into(),
            resource_id: 2,
            status: BookingStatus::Pending,
            is_active: true,
            group_id: Some(GroupId("jang-1".into())),
            sequence_order: seq,
            break_window: Some(TimeSpan::parse("12:00", "13:00").unwrap()),
            course_name: Some("Optics".into()),
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
    fn test_render_split_booking() {
        let rows = [leg("09:00", "12:00", 1), leg("13:00", "15:00", 2)];
        let actor = Actor::new("Mina", Role::Manager);
        let n = Notification::render(NotificationKind::Created, &rows, &actor, None).unwrap();
        assert_eq!(
            n.text,
            "[New booking] Prof. Jang | Lecture | 2025-09-03 09:00-15:00 (break 12:00-13:00) \
             | resource 2 | by Mina | course Optics"
        );
        assert_eq!(n.booking_ids.len(), 2);
    }

    #[test]
    fn test_render_with_reason() {
        let rows = [leg("09:00", "12:00", 1)];
        let actor = Actor::new("Mina", Role::Manager);
        let n = Notification::render(
            NotificationKind::CancellationRequested,
            &rows,
            &actor,
            Some("speaker ill"),
        )
        .unwrap();
        assert!(n.text.starts_with("[Cancellation requested]"));
        assert!(n.text.ends_with("reason: speaker ill"));
        assert!(Notification::render(NotificationKind::Created, &[], &actor, None).is_none());
    }

    #[test]
    fn test_dispatch_swallows_failure() {
        let rows = [leg("09:00", "12:00", 1)];
        let actor = Actor::new("Mina", Role::Manager);
        let n = Notification::render(NotificationKind::Created, &rows, &actor, None).unwrap();
        dispatch(&FailingNotifier, &n);

        let recorder = RecordingNotifier::default();
        dispatch(&recorder, &n);
        assert_eq!(recorder.sent(), vec![n]);
    }
}

//! Append-only audit history
//!
//! Entries are written after the mutation they describe has committed.
//! Repeated appends for the same booking and change type inside one dedupe
//! bucket collapse into a single entry.

mod dedupe;
mod diff;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, instrument};
use uuid::Uuid;

use crate::config::HistoryConfig;
use crate::error::{Error, Result};
use crate::models::{Actor, BookingSnapshot, ChangeType, HistoryEntry, HistoryView};
use crate::storage::HistoryRepository;

pub use dedupe::{Clock, DedupeCache, FixedClock, SystemClock};
pub use diff::{build_snapshot, diff, ChangeSummary, FieldDiff};

/// One change to record
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeRecord {
    pub booking_id: Uuid,
    pub change_type: ChangeType,
    pub reason: Option<String>,
    pub old: Option<BookingSnapshot>,
    pub new: Option<BookingSnapshot>,
}

impl ChangeRecord {
    pub fn new(booking_id: Uuid, change_type: ChangeType) -> Self {
        Self {
            booking_id,
            change_type,
            reason: None,
            old: None,
            new: None,
        }
    }

    pub fn reason(mut self, reason: Option<&str>) -> Self {
        self.reason = reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        self
    }

    pub fn snapshots(mut self, old: Option<BookingSnapshot>, new: Option<BookingSnapshot>) -> Self {
        self.old = old;
        self.new = new;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppendOutcome {
    Recorded(HistoryEntry),
    /// Same booking and change type already recorded in this bucket
    Deduplicated,
}

pub struct HistoryRecorder {
    cache: DedupeCache,
    clock: Arc<dyn Clock>,
}

impl HistoryRecorder {
    pub fn new(config: &HistoryConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            cache: DedupeCache::new(config.bucket(), config.horizon()),
            clock,
        }
    }

    pub fn with_system_clock(config: &HistoryConfig) -> Self {
        Self::new(config, Arc::new(SystemClock))
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Persist one entry unless it duplicates a recent one.
    ///
    /// Store failures come back as [`Error::HistoryWrite`] and release the
    /// dedupe key so a retry can succeed.
    #[instrument(skip(self, repo, actor, record), fields(booking_id = %record.booking_id, change_type = %record.change_type, actor = %actor))]
    pub fn append<R: HistoryRepository + ?Sized>(
        &self,
        repo: &R,
        actor: &Actor,
        record: ChangeRecord,
    ) -> Result<AppendOutcome> {
        let now = self.clock.now();
        if !self.cache.try_claim(record.booking_id, record.change_type, now) {
            debug!("Duplicate history append suppressed");
            return Ok(AppendOutcome::Deduplicated);
        }

        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            booking_id: record.booking_id,
            change_type: record.change_type,
            actor_id: actor.id,
            actor_name: actor.display_name.clone(),
            description: describe(&record),
            old_snapshot: record.old,
            new_snapshot: record.new,
            created_at: now,
        };

        match repo.insert_history(&entry) {
            Ok(()) => Ok(AppendOutcome::Recorded(entry)),
            Err(e) => {
                self.cache.release(entry.booking_id, entry.change_type, now);
                error!(error = %e, "History write failed");
                Err(Error::HistoryWrite(e.to_string()))
            }
        }
    }

    /// Append with a free-form change type from an older client or import
    pub fn append_legacy<R: HistoryRepository + ?Sized>(
        &self,
        repo: &R,
        actor: &Actor,
        booking_id: Uuid,
        raw_change_type: &str,
        reason: Option<&str>,
    ) -> Result<AppendOutcome> {
        let change_type = ChangeType::from_legacy(raw_change_type).ok_or_else(|| {
            Error::validation(format!("unknown change type '{}'", raw_change_type.trim()))
        })?;
        self.append(
            repo,
            actor,
            ChangeRecord::new(booking_id, change_type).reason(reason),
        )
    }
}

fn describe(record: &ChangeRecord) -> String {
    let mut description = record.change_type.label().to_string();
    if let (Some(old), Some(new)) = (&record.old, &record.new) {
        let summary = diff(old, new);
        if !summary.is_empty() {
            description.push_str(": ");
            description.push_str(&summary.to_string());
        }
    }
    if let Some(reason) = &record.reason {
        description.push_str(&format!(" (reason: {reason})"));
    }
    description
}

/// Attach the human-readable summary shown alongside an entry
pub fn summarize(entry: HistoryEntry) -> HistoryView {
    let summary = match (&entry.old_snapshot, &entry.new_snapshot) {
        (Some(old), Some(new)) => {
            let changes = diff(old, new);
            if changes.is_empty() {
                entry.change_type.label().to_string()
            } else {
                format!("{}: {}", entry.change_type.label(), changes)
            }
        }
        _ => entry.change_type.label().to_string(),
    };
    HistoryView { entry, summary }
}

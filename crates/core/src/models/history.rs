//! Audit history models

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Canonical change vocabulary (enum, not free text)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Created,
    Updated,
    Approved,
    ModificationRequested,
    ModificationApproved,
    Resubmitted,
    CancellationRequested,
    Cancelled,
    DeletionRequested,
    Deleted,
    RequestWithdrawn,
    RequestRejected,
    CrossCheckRequested,
    CrossCheckConfirmed,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Created => "created",
            ChangeType::Updated => "updated",
            ChangeType::Approved => "approved",
            ChangeType::ModificationRequested => "modification_requested",
            ChangeType::ModificationApproved => "modification_approved",
            ChangeType::Resubmitted => "resubmitted",
            ChangeType::CancellationRequested => "cancellation_requested",
            ChangeType::Cancelled => "cancelled",
            ChangeType::DeletionRequested => "deletion_requested",
            ChangeType::Deleted => "deleted",
            ChangeType::RequestWithdrawn => "request_withdrawn",
            ChangeType::RequestRejected => "request_rejected",
            ChangeType::CrossCheckRequested => "cross_check_requested",
            ChangeType::CrossCheckConfirmed => "cross_check_confirmed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ChangeType::Created => "Booking created",
            ChangeType::Updated => "Booking updated",
            ChangeType::Approved => "Booking approved",
            ChangeType::ModificationRequested => "Modification requested",
            ChangeType::ModificationApproved => "Modification approved",
            ChangeType::Resubmitted => "Resubmitted for approval",
            ChangeType::CancellationRequested => "Cancellation requested",
            ChangeType::Cancelled => "Booking cancelled",
            ChangeType::DeletionRequested => "Deletion requested",
            ChangeType::Deleted => "Booking deleted",
            ChangeType::RequestWithdrawn => "Request withdrawn",
            ChangeType::RequestRejected => "Request rejected",
            ChangeType::CrossCheckRequested => "Cross-check requested",
            ChangeType::CrossCheckConfirmed => "Cross-check confirmed",
        }
    }

    /// Fold legacy and alternate spellings onto the canonical vocabulary.
    ///
    /// Applied only where free-form strings enter the system.
    pub fn from_legacy(raw: &str) -> Option<ChangeType> {
        let key: String = raw
            .trim()
            .to_ascii_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        let canonical = match key.as_str() {
            "created" | "create" | "insert" | "new" | "booking_created" => ChangeType::Created,
            "updated" | "update" | "edit" | "edited" | "modified" => ChangeType::Updated,
            "approved" | "approve" | "confirm" | "confirmed" => ChangeType::Approved,
            "modification_requested" | "modify_request" | "modification_request"
            | "edit_request" => ChangeType::ModificationRequested,
            "modification_approved" | "approve_modification" | "modify_approve" => {
                ChangeType::ModificationApproved
            }
            "resubmitted" | "resubmit" => ChangeType::Resubmitted,
            "cancellation_requested" | "cancel_request" | "cancellation_request" => {
                ChangeType::CancellationRequested
            }
            "cancelled" | "canceled" | "cancel" | "cancel_approve" => ChangeType::Cancelled,
            "deletion_requested" | "delete_request" | "deletion_request" => {
                ChangeType::DeletionRequested
            }
            "deleted" | "delete" | "delete_approve" => ChangeType::Deleted,
            "request_withdrawn" | "withdraw" | "withdrawn" => ChangeType::RequestWithdrawn,
            "request_rejected" | "reject" | "rejected" | "reject_request" => {
                ChangeType::RequestRejected
            }
            "cross_check_requested" | "cross_check_request" | "crosscheck_request"
            | "crosscheck" | "cross_check" | "check_request" | "review_request" => {
                ChangeType::CrossCheckRequested
            }
            "cross_check_confirmed" | "cross_check_confirm" | "crosscheck_confirm"
            | "crosscheck_confirmed" | "cross_check_done" | "check_confirm"
            | "review_confirmed" => ChangeType::CrossCheckConfirmed,
            _ => return None,
        };
        Some(canonical)
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed whitelist of booking fields captured before and after a change.
///
/// Values are kept as text so snapshots written by older clients (numbers
/// for ids, seconds on times) remain comparable after normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingSnapshot {
    #[serde(default, deserialize_with = "lenient_text")]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub start: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub end: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub requester_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub course_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub course_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub shoot_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub resource_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub break_start: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub break_end: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub group_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub sequence_order: Option<String>,
    #[serde(default, deserialize_with = "lenient_text")]
    pub status: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Immutable audit record of one accepted change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub change_type: ChangeType,
    pub actor_id: Uuid,
    pub actor_name: String,
    pub description: String,
    pub old_snapshot: Option<BookingSnapshot>,
    pub new_snapshot: Option<BookingSnapshot>,
    pub created_at: DateTime<Utc>,
}

/// A history entry with its human-readable change summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryView {
    pub entry: HistoryEntry,
    pub summary: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_cross_check_synonyms_fold() {
        for raw in ["crosscheck_request", "Cross-Check Request", "review_request", "check_request"] {
            assert_eq!(ChangeType::from_legacy(raw), Some(ChangeType::CrossCheckRequested), "{raw}");
        }
        for raw in ["crosscheck_confirm", "cross_check_done", "Review Confirmed"] {
            assert_eq!(ChangeType::from_legacy(raw), Some(ChangeType::CrossCheckConfirmed), "{raw}");
        }
    }

    #[test]
    fn test_legacy_canonical_roundtrip() {
        let all = [
            ChangeType::Created,
            ChangeType::Updated,
            ChangeType::Approved,
            ChangeType::ModificationRequested,
            ChangeType::ModificationApproved,
            ChangeType::Resubmitted,
            ChangeType::CancellationRequested,
            ChangeType::Cancelled,
            ChangeType::DeletionRequested,
            ChangeType::Deleted,
            ChangeType::RequestWithdrawn,
            ChangeType::RequestRejected,
            ChangeType::CrossCheckRequested,
            ChangeType::CrossCheckConfirmed,
        ];
        for ct in all {
            assert_eq!(ChangeType::from_legacy(ct.as_str()), Some(ct));
        }
        assert_eq!(ChangeType::from_legacy("teleported"), None);
    }

    #[test]
    fn test_snapshot_accepts_numeric_ids() {
        let snap: BookingSnapshot =
            serde_json::from_str(r#"{"resource_id": 7, "start": "09:00:00", "notes": null}"#)
                .unwrap();
        assert_eq!(snap.resource_id.as_deref(), Some("7"));
        assert_eq!(snap.start.as_deref(), Some("09:00:00"));
        assert_eq!(snap.notes, None);
        assert_eq!(snap.date, None);
    }
}

//! Audit history storage operations

use rusqlite::{params, Connection, Row};
use tracing::{instrument, warn};
use uuid::Uuid;

use super::parse::{format_datetime, parse_datetime, parse_json_opt, parse_uuid};
use super::traits::Page;
use crate::error::Result;
use crate::models::{ChangeType, HistoryEntry};

const HISTORY_COLUMNS: &str =
    "id, booking_id, change_type, actor_id, actor_name, description, old_snapshot, new_snapshot, created_at";

/// Rows whose change type no longer parses are skipped, not fatal
fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Option<HistoryEntry>> {
    let raw: String = row.get(2)?;
    let Some(change_type) = ChangeType::from_legacy(&raw) else {
        warn!(change_type = %raw, "Skipping history row with unknown change type");
        return Ok(None);
    };

    Ok(Some(HistoryEntry {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        booking_id: parse_uuid(&row.get::<_, String>(1)?)?,
        change_type,
        actor_id: parse_uuid(&row.get::<_, String>(3)?)?,
        actor_name: row.get(4)?,
        description: row.get(5)?,
        old_snapshot: parse_json_opt(row.get(6)?)?,
        new_snapshot: parse_json_opt(row.get(7)?)?,
        created_at: parse_datetime(&row.get::<_, String>(8)?)?,
    }))
}

pub struct HistoryStore<'a> {
    conn: &'a Connection,
}

impl<'a> HistoryStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Append one entry. There is no update or delete.
    #[instrument(skip(self, entry), fields(booking_id = %entry.booking_id, change_type = %entry.change_type))]
    pub fn insert(&self, entry: &HistoryEntry) -> Result<()> {
        let old = entry
            .old_snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let new = entry
            .new_snapshot
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        self.conn.execute(
            &format!(
                "INSERT INTO booking_history ({HISTORY_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
            ),
            params![
                entry.id.to_string(),
                entry.booking_id.to_string(),
                entry.change_type.as_str(),
                entry.actor_id.to_string(),
                entry.actor_name,
                entry.description,
                old,
                new,
                format_datetime(&entry.created_at),
            ],
        )?;
        Ok(())
    }

    /// Entries for one booking, oldest first
    #[instrument(skip(self))]
    pub fn list_for_booking(&self, booking_id: Uuid, page: Page) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {HISTORY_COLUMNS} FROM booking_history
             WHERE booking_id = ?1
             ORDER BY created_at, rowid
             LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(
            params![
                booking_id.to_string(),
                page.limit.map(i64::from).unwrap_or(-1),
                i64::from(page.offset)
            ],
            entry_from_row,
        )?;

        let mut entries = Vec::new();
        for row in rows {
            if let Some(entry) = row? {
                entries.push(entry);
            }
        }
        Ok(entries)
    }
}

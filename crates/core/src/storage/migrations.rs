//! Versioned schema for the booking store
//!
//! Each step runs in its own transaction together with its
//! `schema_migrations` row, so a failed step leaves the previous version.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, instrument};

use crate::error::Result;

/// One schema step
struct Step {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Applied in order; versions run 1, 2, ...
const STEPS: &[Step] = &[
    Step {
        version: 1,
        description: "Initial schema",
        sql: r#"
            -- Bookable rooms and studios
            CREATE TABLE IF NOT EXISTS resources (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            -- Which resources can host which production/shoot type
            CREATE TABLE IF NOT EXISTS type_compat (
                shoot_type TEXT NOT NULL,
                resource_id INTEGER NOT NULL,
                is_primary INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (shoot_type, resource_id),
                FOREIGN KEY (resource_id) REFERENCES resources(id) ON DELETE CASCADE
            );

            -- Requester directory
            CREATE TABLE IF NOT EXISTS requesters (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                category TEXT
            );

            -- Booking rows; split bookings are two rows sharing group_id
            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                category TEXT NOT NULL,
                date TEXT NOT NULL,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                requester_name TEXT NOT NULL,
                requester_ref INTEGER,
                shoot_type TEXT NOT NULL,
                resource_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                is_active INTEGER NOT NULL DEFAULT 1,
                group_id TEXT,
                sequence_order INTEGER NOT NULL DEFAULT 1,
                break_enabled INTEGER NOT NULL DEFAULT 0,
                break_start TEXT,
                break_end TEXT,
                break_duration INTEGER,
                course_name TEXT,
                course_code TEXT,
                notes TEXT,
                modification_reason TEXT,
                cancellation_reason TEXT,
                deletion_reason TEXT,
                prior_status TEXT,
                requested_by TEXT,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                updated_by TEXT,
                FOREIGN KEY (resource_id) REFERENCES resources(id),
                FOREIGN KEY (requester_ref) REFERENCES requesters(id) ON DELETE SET NULL
            );

            -- Append-only audit trail
            CREATE TABLE IF NOT EXISTS booking_history (
                id TEXT PRIMARY KEY,
                booking_id TEXT NOT NULL,
                change_type TEXT NOT NULL,
                actor_id TEXT NOT NULL,
                actor_name TEXT NOT NULL,
                description TEXT NOT NULL,
                old_snapshot TEXT,
                new_snapshot TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (booking_id) REFERENCES bookings(id)
            );
        "#,
    },
    Step {
        version: 2,
        description: "Add allocation and history indexes",
        sql: r#"
            -- Allocation reads: active rows on one date for a resource set
            CREATE INDEX IF NOT EXISTS idx_bookings_date_resource
                ON bookings(date, resource_id, is_active);
            CREATE INDEX IF NOT EXISTS idx_bookings_group ON bookings(group_id);
            CREATE INDEX IF NOT EXISTS idx_booking_history_booking
                ON booking_history(booking_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_type_compat_type ON type_compat(shoot_type);
        "#,
    },
];

const VERSION_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    description TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Highest applied version, 0 for a fresh database
pub(crate) fn current_version(conn: &Connection) -> Result<u32> {
    let version = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get::<_, Option<u32>>(0)
        })
        .optional()?
        .flatten();
    Ok(version.unwrap_or(0))
}

fn apply(conn: &Connection, step: &Step) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(step.sql)?;
    tx.execute(
        "INSERT INTO schema_migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
        params![step.version, step.description, Utc::now().to_rfc3339()],
    )?;
    tx.commit()?;
    Ok(())
}

/// Bring the schema up to the latest step
#[instrument(skip(conn))]
pub fn run_migrations(conn: &Connection) -> Result<()> {
    run_steps(conn, STEPS)
}

fn run_steps(conn: &Connection, steps: &[Step]) -> Result<()> {
    conn.execute_batch(VERSION_TABLE)?;
    let from = current_version(conn)?;

    let pending: Vec<&Step> = steps.iter().filter(|s| s.version > from).collect();
    if pending.is_empty() {
        return Ok(());
    }
    for step in pending {
        info!(version = step.version, description = step.description, "Applying schema step");
        apply(conn, step)?;
    }
    info!(from, to = current_version(conn)?, "Booking schema updated");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tables(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn test_fresh_database_gets_booking_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), STEPS.len() as u32);
        for table in ["booking_history", "bookings", "requesters", "resources", "type_compat"] {
            assert!(tables(&conn).iter().any(|t| t == table), "missing {table}");
        }

        // Re-running is a no-op
        run_migrations(&conn).unwrap();
        assert_eq!(current_version(&conn).unwrap(), STEPS.len() as u32);
    }

    #[test]
    fn test_steps_are_numbered_from_one() {
        for (i, step) in STEPS.iter().enumerate() {
            assert_eq!(step.version as usize, i + 1, "{}", step.description);
        }
    }

    #[test]
    fn test_failed_step_keeps_previous_version() {
        let conn = Connection::open_in_memory().unwrap();
        let steps = [
            Step {
                version: 1,
                description: "rooms",
                sql: "CREATE TABLE rooms (id INTEGER PRIMARY KEY);",
            },
            Step {
                version: 2,
                description: "broken",
                sql: "CREATE TABLE shelves (id INTEGER PRIMARY KEY); INSERT INTO nowhere VALUES (1);",
            },
        ];

        assert!(run_steps(&conn, &steps).is_err());
        assert_eq!(current_version(&conn).unwrap(), 1);
        let names = tables(&conn);
        assert!(names.iter().any(|t| t == "rooms"));
        assert!(!names.iter().any(|t| t == "shelves"));
    }
}

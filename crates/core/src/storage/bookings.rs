//! Booking storage operations

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use tracing::instrument;
use uuid::Uuid;

use super::parse::{
    format_date, format_datetime, format_time, parse_date, parse_datetime, parse_enum,
    parse_enum_opt, parse_group_id_opt, parse_span, parse_time_opt, parse_uuid,
    parse_uuid_opt,
};
use super::traits::{BookingFilter, BookingOrder, Page};
use crate::error::Result;
use crate::models::{Booking, BookingRef, GroupId, TimeSpan};

const BOOKING_COLUMNS: &str = "id, category, date, start_time, end_time, requester_name, \
     requester_ref, shoot_type, resource_id, status, is_active, group_id, sequence_order, \
     break_start, break_end, course_name, course_code, notes, modification_reason, \
     cancellation_reason, deletion_reason, prior_status, requested_by, created_by, \
     created_at, updated_at, updated_by";

fn booking_from_row(row: &Row<'_>) -> rusqlite::Result<Booking> {
    let break_start = parse_time_opt(row.get(13)?)?;
    let break_end = parse_time_opt(row.get(14)?)?;
    let break_window = match (break_start, break_end) {
        (Some(start), Some(end)) => Some(TimeSpan { start, end }),
        _ => None,
    };

    Ok(Booking {
        id: parse_uuid(&row.get::<_, String>(0)?)?,
        category: parse_enum(&row.get::<_, String>(1)?)?,
        date: parse_date(&row.get::<_, String>(2)?)?,
        span: parse_span(&row.get::<_, String>(3)?, &row.get::<_, String>(4)?)?,
        requester_name: row.get(5)?,
        requester_ref: row.get(6)?,
        shoot_type: row.get(7)?,
        resource_id: row.get(8)?,
        status: parse_enum(&row.get::<_, String>(9)?)?,
        is_active: row.get::<_, i32>(10)? != 0,
        group_id: parse_group_id_opt(row.get(11)?),
        sequence_order: row.get(12)?,
        break_window,
        course_name: row.get(15)?,
        course_code: row.get(16)?,
        notes: row.get(17)?,
        modification_reason: row.get(18)?,
        cancellation_reason: row.get(19)?,
        deletion_reason: row.get(20)?,
        prior_status: parse_enum_opt(row.get(21)?)?,
        requested_by: parse_uuid_opt(row.get(22)?)?,
        created_by: parse_uuid(&row.get::<_, String>(23)?)?,
        created_at: parse_datetime(&row.get::<_, String>(24)?)?,
        updated_at: parse_datetime(&row.get::<_, String>(25)?)?,
        updated_by: parse_uuid_opt(row.get(26)?)?,
    })
}

pub struct BookingStore<'a> {
    conn: &'a Connection,
}

impl<'a> BookingStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Insert a booking row
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, resource_id = booking.resource_id))]
    pub fn insert(&self, booking: &Booking) -> Result<()> {
        self.conn.execute(
            &format!(
                "INSERT INTO bookings ({BOOKING_COLUMNS}, break_enabled, break_duration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                         ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29)"
            ),
            params![
                booking.id.to_string(),
                booking.category.as_str(),
                format_date(&booking.date),
                format_time(&booking.span.start),
                format_time(&booking.span.end),
                booking.requester_name,
                booking.requester_ref,
                booking.shoot_type,
                booking.resource_id,
                booking.status.as_str(),
                booking.is_active as i32,
                booking.group_id.as_ref().map(|g| g.as_str()),
                booking.sequence_order,
                booking.break_window.map(|b| format_time(&b.start)),
                booking.break_window.map(|b| format_time(&b.end)),
                booking.course_name,
                booking.course_code,
                booking.notes,
                booking.modification_reason,
                booking.cancellation_reason,
                booking.deletion_reason,
                booking.prior_status.map(|s| s.as_str()),
                booking.requested_by.map(|u| u.to_string()),
                booking.created_by.to_string(),
                format_datetime(&booking.created_at),
                format_datetime(&booking.updated_at),
                booking.updated_by.map(|u| u.to_string()),
                booking.break_enabled() as i32,
                booking.break_duration_minutes(),
            ],
        )?;
        Ok(())
    }

    /// Update every mutable column of a booking row
    #[instrument(skip(self, booking), fields(booking_id = %booking.id, status = %booking.status))]
    pub fn update(&self, booking: &Booking) -> Result<()> {
        self.conn.execute(
            "UPDATE bookings SET
                category = ?1, date = ?2, start_time = ?3, end_time = ?4, requester_name = ?5,
                requester_ref = ?6, shoot_type = ?7, resource_id = ?8, status = ?9,
                is_active = ?10, group_id = ?11, sequence_order = ?12, break_enabled = ?13,
                break_start = ?14, break_end = ?15, break_duration = ?16, course_name = ?17,
                course_code = ?18, notes = ?19, modification_reason = ?20,
                cancellation_reason = ?21, deletion_reason = ?22, prior_status = ?23,
                requested_by = ?24, updated_at = ?25, updated_by = ?26
             WHERE id = ?27",
            params![
                booking.category.as_str(),
                format_date(&booking.date),
                format_time(&booking.span.start),
                format_time(&booking.span.end),
                booking.requester_name,
                booking.requester_ref,
                booking.shoot_type,
                booking.resource_id,
                booking.status.as_str(),
                booking.is_active as i32,
                booking.group_id.as_ref().map(|g| g.as_str()),
                booking.sequence_order,
                booking.break_enabled() as i32,
                booking.break_window.map(|b| format_time(&b.start)),
                booking.break_window.map(|b| format_time(&b.end)),
                booking.break_duration_minutes(),
                booking.course_name,
                booking.course_code,
                booking.notes,
                booking.modification_reason,
                booking.cancellation_reason,
                booking.deletion_reason,
                booking.prior_status.map(|s| s.as_str()),
                booking.requested_by.map(|u| u.to_string()),
                format_datetime(&booking.updated_at),
                booking.updated_by.map(|u| u.to_string()),
                booking.id.to_string(),
            ],
        )?;
        Ok(())
    }

    /// Find a booking row by id
    #[instrument(skip(self))]
    pub fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>> {
        let booking = self
            .conn
            .query_row(
                &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
                params![id.to_string()],
                booking_from_row,
            )
            .optional()?;
        Ok(booking)
    }

    /// All legs of a split booking
    #[instrument(skip(self), fields(group_id = %group_id))]
    pub fn find_group(&self, group_id: &GroupId) -> Result<Vec<Booking>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE group_id = ?1 ORDER BY sequence_order"
        ))?;
        let legs = stmt
            .query_map(params![group_id.as_str()], booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(legs)
    }

    /// Filtered, ordered, paginated listing
    #[instrument(skip(self, filter), fields(date = ?filter.date, active_only = filter.active_only))]
    pub fn list(&self, filter: &BookingFilter, page: Page) -> Result<Vec<Booking>> {
        let mut clauses: Vec<String> = Vec::new();
        let mut args: Vec<Value> = Vec::new();

        if let Some(date) = filter.date {
            args.push(Value::Text(format_date(&date)));
            clauses.push(format!("date = ?{}", args.len()));
        }
        if let Some(ids) = &filter.resource_ids {
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            let mut placeholders = Vec::with_capacity(ids.len());
            for id in ids {
                args.push(Value::Integer(*id));
                placeholders.push(format!("?{}", args.len()));
            }
            clauses.push(format!("resource_id IN ({})", placeholders.join(", ")));
        }
        if filter.active_only {
            clauses.push("is_active = 1".to_string());
        }
        if let Some(status) = filter.status {
            args.push(Value::Text(status.as_str().to_string()));
            clauses.push(format!("status = ?{}", args.len()));
        }
        match &filter.exclude {
            Some(BookingRef::Booking(id)) => {
                args.push(Value::Text(id.to_string()));
                clauses.push(format!("id != ?{}", args.len()));
            }
            Some(BookingRef::Group(gid)) => {
                args.push(Value::Text(gid.as_str().to_string()));
                clauses.push(format!("(group_id IS NULL OR group_id != ?{})", args.len()));
            }
            None => {}
        }

        let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(match filter.order {
            BookingOrder::Schedule => " ORDER BY date, start_time, sequence_order, id",
            BookingOrder::RecentlyUpdated => " ORDER BY updated_at DESC, id",
        });
        // SQLite treats a negative LIMIT as unbounded
        args.push(Value::Integer(page.limit.map(i64::from).unwrap_or(-1)));
        sql.push_str(&format!(" LIMIT ?{}", args.len()));
        args.push(Value::Integer(i64::from(page.offset)));
        sql.push_str(&format!(" OFFSET ?{}", args.len()));

        let mut stmt = self.conn.prepare(&sql)?;
        let bookings = stmt
            .query_map(params_from_iter(args.iter()), booking_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(bookings)
    }
}

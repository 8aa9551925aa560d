//! SQLite storage layer for Studio

mod bookings;
mod catalog;
mod history;
mod migrations;
mod parse;
mod traits;

use std::path::Path;

use rusqlite::{Connection, Transaction, TransactionBehavior};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Booking, Compatibility, GroupId, HistoryEntry, Requester, Resource};

pub use bookings::BookingStore;
pub use catalog::CatalogStore;
pub use history::HistoryStore;
pub use traits::{
    BookingFilter, BookingOrder, BookingRepository, CatalogRepository, HistoryRepository, Page,
};

/// Main database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open or create database at the given path
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Open in-memory database (for testing)
    #[instrument]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initialize database schema via migrations
    fn init(&self) -> Result<()> {
        migrations::run_migrations(&self.conn)?;
        Ok(())
    }

    /// Get current schema version
    pub fn schema_version(&self) -> u32 {
        migrations::current_version(&self.conn).unwrap_or(0)
    }

    pub fn bookings(&self) -> BookingStore<'_> {
        BookingStore::new(&self.conn)
    }

    pub fn history(&self) -> HistoryStore<'_> {
        HistoryStore::new(&self.conn)
    }

    pub fn catalog(&self) -> CatalogStore<'_> {
        CatalogStore::new(&self.conn)
    }

    /// Repository view over the plain connection
    pub fn handle(&self) -> StoreHandle<'_> {
        StoreHandle { conn: &self.conn }
    }

    /// Raw SQL against the live connection, for tests that break the store
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Run `f` inside one IMMEDIATE transaction.
    ///
    /// The write lock is taken up front, so a conflict check and the insert
    /// that follows it cannot interleave with another writer. Any error
    /// rolls back every write made through the handle.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&StoreHandle<'_>) -> Result<T>,
    {
        let tx = Transaction::new_unchecked(&self.conn, TransactionBehavior::Immediate)?;
        let value = f(&StoreHandle { conn: &tx })?;
        tx.commit()?;
        debug!("Transaction committed");
        Ok(value)
    }
}

/// Borrowed connection implementing the repository traits.
///
/// Hands the same surface to code running inside [`Database::transaction`]
/// as to code using the database directly.
#[derive(Clone, Copy)]
pub struct StoreHandle<'a> {
    conn: &'a Connection,
}

impl BookingRepository for StoreHandle<'_> {
    fn insert_booking(&self, booking: &Booking) -> Result<()> {
        BookingStore::new(self.conn).insert(booking)
    }

    fn update_booking(&self, booking: &Booking) -> Result<()> {
        BookingStore::new(self.conn).update(booking)
    }

    fn find_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        BookingStore::new(self.conn).find_by_id(id)
    }

    fn find_group(&self, group_id: &GroupId) -> Result<Vec<Booking>> {
        BookingStore::new(self.conn).find_group(group_id)
    }

    fn list_bookings(&self, filter: &BookingFilter, page: Page) -> Result<Vec<Booking>> {
        BookingStore::new(self.conn).list(filter, page)
    }
}

impl HistoryRepository for StoreHandle<'_> {
    fn insert_history(&self, entry: &HistoryEntry) -> Result<()> {
        HistoryStore::new(self.conn).insert(entry)
    }

    fn list_history(&self, booking_id: Uuid, page: Page) -> Result<Vec<HistoryEntry>> {
        HistoryStore::new(self.conn).list_for_booking(booking_id, page)
    }
}

impl CatalogRepository for StoreHandle<'_> {
    fn upsert_resource(&self, resource: &Resource) -> Result<()> {
        CatalogStore::new(self.conn).upsert_resource(resource)
    }

    fn list_resources(&self) -> Result<Vec<Resource>> {
        CatalogStore::new(self.conn).list_resources()
    }

    fn upsert_compatibility(&self, compat: &Compatibility) -> Result<()> {
        CatalogStore::new(self.conn).upsert_compatibility(compat)
    }

    fn compatible_resources(&self, shoot_type: &str) -> Result<Vec<Compatibility>> {
        CatalogStore::new(self.conn).compatible_resources(shoot_type)
    }

    fn upsert_requester(&self, requester: &Requester) -> Result<()> {
        CatalogStore::new(self.conn).upsert_requester(requester)
    }

    fn find_requester_by_name(&self, name: &str) -> Result<Option<Requester>> {
        CatalogStore::new(self.conn).find_requester_by_name(name)
    }
}

// Implement repository traits for Database
// This enables using Database through the trait interface

impl BookingRepository for Database {
    fn insert_booking(&self, booking: &Booking) -> Result<()> {
        self.bookings().insert(booking)
    }

    fn update_booking(&self, booking: &Booking) -> Result<()> {
        self.bookings().update(booking)
    }

    fn find_booking(&self, id: Uuid) -> Result<Option<Booking>> {
        self.bookings().find_by_id(id)
    }

    fn find_group(&self, group_id: &GroupId) -> Result<Vec<Booking>> {
        self.bookings().find_group(group_id)
    }

    fn list_bookings(&self, filter: &BookingFilter, page: Page) -> Result<Vec<Booking>> {
        self.bookings().list(filter, page)
    }
}

impl HistoryRepository for Database {
    fn insert_history(&self, entry: &HistoryEntry) -> Result<()> {
        self.history().insert(entry)
    }

    fn list_history(&self, booking_id: Uuid, page: Page) -> Result<Vec<HistoryEntry>> {
        self.history().list_for_booking(booking_id, page)
    }
}

impl CatalogRepository for Database {
    fn upsert_resource(&self, resource: &Resource) -> Result<()> {
        self.catalog().upsert_resource(resource)
    }

    fn list_resources(&self) -> Result<Vec<Resource>> {
        self.catalog().list_resources()
    }

    fn upsert_compatibility(&self, compat: &Compatibility) -> Result<()> {
        self.catalog().upsert_compatibility(compat)
    }

    fn compatible_resources(&self, shoot_type: &str) -> Result<Vec<Compatibility>> {
        self.catalog().compatible_resources(shoot_type)
    }

    fn upsert_requester(&self, requester: &Requester) -> Result<()> {
        self.catalog().upsert_requester(requester)
    }

    fn find_requester_by_name(&self, name: &str) -> Result<Option<Requester>> {
        self.catalog().find_requester_by_name(name)
    }
}

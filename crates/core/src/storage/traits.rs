//! Storage repository traits
//!
//! These traits define the storage interface the workflow consumes, allowing
//! for different implementations (SQLite, in-memory test doubles).

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    Booking, BookingRef, BookingStatus, Compatibility, GroupId, HistoryEntry, Requester,
    Resource, ResourceId,
};

/// Equality/range filter over booking rows
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub date: Option<NaiveDate>,
    /// `Some(empty)` matches nothing
    pub resource_ids: Option<Vec<ResourceId>>,
    pub active_only: bool,
    pub status: Option<BookingStatus>,
    /// Leave out one row, or every leg of one group
    pub exclude: Option<BookingRef>,
    pub order: BookingOrder,
}

impl BookingFilter {
    /// Active rows on `date` occupying any of `resource_ids`
    pub fn occupying(date: NaiveDate, resource_ids: Vec<ResourceId>) -> Self {
        Self {
            date: Some(date),
            resource_ids: Some(resource_ids),
            active_only: true,
            ..Self::default()
        }
    }

    pub fn excluding(mut self, exclude: Option<BookingRef>) -> Self {
        self.exclude = exclude;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookingOrder {
    /// date, start, sequence, id
    #[default]
    Schedule,
    /// Most recently touched first
    RecentlyUpdated,
}

/// Offset pagination; `limit: None` reads everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }
}

/// Booking row operations
pub trait BookingRepository {
    /// Insert a new booking row
    fn insert_booking(&self, booking: &Booking) -> Result<()>;

    /// Overwrite every mutable column of an existing row
    fn update_booking(&self, booking: &Booking) -> Result<()>;

    /// Find one row by id
    fn find_booking(&self, id: Uuid) -> Result<Option<Booking>>;

    /// All legs of a group ordered by sequence
    fn find_group(&self, group_id: &GroupId) -> Result<Vec<Booking>>;

    /// Filtered, ordered, paginated read
    fn list_bookings(&self, filter: &BookingFilter, page: Page) -> Result<Vec<Booking>>;
}

/// Audit history operations
pub trait HistoryRepository {
    /// Append one immutable entry
    fn insert_history(&self, entry: &HistoryEntry) -> Result<()>;

    /// Entries for a booking, oldest first
    fn list_history(&self, booking_id: Uuid, page: Page) -> Result<Vec<HistoryEntry>>;
}

/// Read access to reference data, plus seeding
pub trait CatalogRepository {
    /// Insert or replace a resource
    fn upsert_resource(&self, resource: &Resource) -> Result<()>;

    /// All resources ordered by id
    fn list_resources(&self) -> Result<Vec<Resource>>;

    /// Insert or replace a compatibility row
    fn upsert_compatibility(&self, compat: &Compatibility) -> Result<()>;

    /// Active resources compatible with a shoot type, ordered by resource id
    fn compatible_resources(&self, shoot_type: &str) -> Result<Vec<Compatibility>>;

    /// Insert or replace a requester directory entry
    fn upsert_requester(&self, requester: &Requester) -> Result<()>;

    /// Case-insensitive exact match on a trimmed name
    fn find_requester_by_name(&self, name: &str) -> Result<Option<Requester>>;
}

//! Overlap detection against one day's occupancy

use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::models::{Booking, BookingRef, ResourceId, TimeSpan};
use crate::storage::{BookingFilter, BookingRepository, Page};

/// Half-open overlap: touching boundaries are not conflicts.
pub fn check_overlap(candidate: &TimeSpan, existing: &TimeSpan) -> bool {
    existing.start < candidate.end && candidate.start < existing.end
}

/// Bookings in `existing` that collide with any of `legs`
pub fn conflicts<'b>(legs: &[TimeSpan], existing: &'b [Booking]) -> Vec<&'b Booking> {
    existing
        .iter()
        .filter(|b| legs.iter().any(|leg| check_overlap(leg, &b.span)))
        .collect()
}

/// Active bookings on one date, grouped by resource.
///
/// Built once per allocation; every free/busy probe after that is a linear
/// scan over a single resource's rows.
#[derive(Debug, Default)]
pub struct Occupancy {
    by_resource: BTreeMap<ResourceId, Vec<Booking>>,
}

impl Occupancy {
    pub fn from_bookings(bookings: Vec<Booking>) -> Self {
        let mut by_resource: BTreeMap<ResourceId, Vec<Booking>> = BTreeMap::new();
        for booking in bookings.into_iter().filter(|b| b.is_active) {
            by_resource.entry(booking.resource_id).or_default().push(booking);
        }
        Self { by_resource }
    }

    /// Read the active rows for `date` on `resource_ids`, leaving out `exclude`
    #[instrument(skip(repo, resource_ids), fields(resources = resource_ids.len()))]
    pub fn load<R: BookingRepository + ?Sized>(
        repo: &R,
        date: NaiveDate,
        resource_ids: &[ResourceId],
        exclude: Option<&BookingRef>,
    ) -> Result<Self> {
        let filter =
            BookingFilter::occupying(date, resource_ids.to_vec()).excluding(exclude.cloned());
        let rows = repo.list_bookings(&filter, Page::all())?;
        debug!(rows = rows.len(), "Loaded occupancy");
        Ok(Self::from_bookings(rows))
    }

    pub fn bookings_on(&self, resource_id: ResourceId) -> &[Booking] {
        self.by_resource
            .get(&resource_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First booking on `resource_id` that any leg overlaps
    pub fn first_conflict(&self, resource_id: ResourceId, legs: &[TimeSpan]) -> Option<&Booking> {
        conflicts(legs, self.bookings_on(resource_id)).into_iter().next()
    }

    pub fn is_free(&self, resource_id: ResourceId, legs: &[TimeSpan]) -> bool {
        self.first_conflict(resource_id, legs).is_none()
    }
}

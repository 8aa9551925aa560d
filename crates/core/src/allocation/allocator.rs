//! Resource assignment and alternative-window suggestions

use chrono::NaiveDate;
use tracing::{debug, info, instrument};

use super::conflict::Occupancy;
use crate::config::ScheduleConfig;
use crate::error::{Error, Result};
use crate::models::{minute_of_day, BookingRef, Compatibility, ResourceId, TimeSpan};
use crate::storage::{BookingRepository, CatalogRepository};

/// What the caller wants to place
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRequest {
    pub shoot_type: String,
    pub date: NaiveDate,
    /// One span for a plain booking, two for a split booking
    pub legs: Vec<TimeSpan>,
    /// Own row or group, when re-checking an edit
    pub exclude: Option<BookingRef>,
    /// Kept if still free, e.g. the resource an edited booking already holds
    pub prefer: Option<ResourceId>,
}

impl AllocationRequest {
    pub fn new(shoot_type: impl Into<String>, date: NaiveDate, legs: Vec<TimeSpan>) -> Self {
        Self {
            shoot_type: shoot_type.into(),
            date,
            legs,
            exclude: None,
            prefer: None,
        }
    }

    pub fn excluding(mut self, exclude: Option<BookingRef>) -> Self {
        self.exclude = exclude;
        self
    }

    pub fn preferring(mut self, resource_id: Option<ResourceId>) -> Self {
        self.prefer = resource_id;
        self
    }

    /// From the first leg's start to the last leg's end
    pub fn outer(&self) -> Option<TimeSpan> {
        let first = self.legs.first()?;
        let last = self.legs.last()?;
        Some(TimeSpan {
            start: first.start,
            end: last.end,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allocation {
    Assigned {
        resource_id: ResourceId,
    },
    /// Every compatible resource is busy; `suggestions` may be empty
    Unavailable {
        message: String,
        suggestions: Vec<TimeSpan>,
    },
}

impl Allocation {
    /// Turn an unavailable result into a [`Error::Conflict`]
    pub fn into_resource(self) -> Result<ResourceId> {
        match self {
            Allocation::Assigned { resource_id } => Ok(resource_id),
            Allocation::Unavailable {
                message,
                suggestions,
            } => Err(Error::Conflict {
                message,
                suggestions,
            }),
        }
    }
}

pub struct SlotAllocator<'c> {
    schedule: &'c ScheduleConfig,
}

impl<'c> SlotAllocator<'c> {
    pub fn new(schedule: &'c ScheduleConfig) -> Self {
        Self { schedule }
    }

    /// Pick a compatible free resource, or propose other windows that day.
    ///
    /// A resource is free when none of the request's legs overlaps any of its
    /// active bookings. Among free resources: the preferred one, then the
    /// primary-flagged one, then the lowest id.
    #[instrument(skip(self, repo, request), fields(shoot_type = %request.shoot_type, date = %request.date))]
    pub fn allocate<R>(&self, repo: &R, request: &AllocationRequest) -> Result<Allocation>
    where
        R: BookingRepository + CatalogRepository + ?Sized,
    {
        validate_legs(&request.legs)?;

        let compatible = repo.compatible_resources(&request.shoot_type)?;
        if compatible.is_empty() {
            return Err(Error::Conflict {
                message: format!("No resource supports shoot type '{}'.", request.shoot_type),
                suggestions: Vec::new(),
            });
        }
        let ids: Vec<ResourceId> = compatible.iter().map(|c| c.resource_id).collect();
        let occupancy = Occupancy::load(repo, request.date, &ids, request.exclude.as_ref())?;

        if let Some(resource_id) = pick_free(&compatible, &occupancy, &request.legs, request.prefer)
        {
            info!(resource_id, "Resource allocated");
            return Ok(Allocation::Assigned { resource_id });
        }

        let suggestions = self.suggest(&ids, &occupancy, &request.legs);
        debug!(count = suggestions.len(), "All compatible resources busy");
        let message = if suggestions.is_empty() {
            format!(
                "No alternative window on {}; choose another date.",
                request.date
            )
        } else {
            format!(
                "All compatible resources are booked for {} on {}.",
                request.outer().map(|o| o.to_string()).unwrap_or_default(),
                request.date
            )
        };
        Ok(Allocation::Unavailable {
            message,
            suggestions,
        })
    }

    /// Slide the whole request across the operating window in step
    /// increments and keep the earliest outer windows that fit somewhere.
    fn suggest(&self, ids: &[ResourceId], occupancy: &Occupancy, legs: &[TimeSpan]) -> Vec<TimeSpan> {
        let (Some(first), Some(last)) = (legs.first(), legs.last()) else {
            return Vec::new();
        };
        let origin = minute_of_day(first.start);
        let length = minute_of_day(last.end) - origin;
        let open = minute_of_day(self.schedule.open);
        let close = minute_of_day(self.schedule.close);
        let step = i64::from(self.schedule.step_minutes.max(1));

        let mut found = Vec::new();
        let mut start = open;
        while start + length <= close && found.len() < self.schedule.max_suggestions {
            let delta = start - origin;
            let shifted: Option<Vec<TimeSpan>> = legs.iter().map(|l| l.shifted(delta)).collect();
            if let Some(shifted) = shifted {
                if ids.iter().any(|id| occupancy.is_free(*id, &shifted)) {
                    if let (Some(a), Some(b)) = (shifted.first(), shifted.last()) {
                        found.push(TimeSpan {
                            start: a.start,
                            end: b.end,
                        });
                    }
                }
            }
            start += step;
        }
        found
    }
}

fn validate_legs(legs: &[TimeSpan]) -> Result<()> {
    match legs {
        [_] => Ok(()),
        [a, b] if a.end <= b.start => Ok(()),
        [_, _] => Err(Error::validation("split legs must not overlap")),
        _ => Err(Error::validation("a booking has one or two legs")),
    }
}

fn pick_free(
    compatible: &[Compatibility],
    occupancy: &Occupancy,
    legs: &[TimeSpan],
    prefer: Option<ResourceId>,
) -> Option<ResourceId> {
    let free: Vec<&Compatibility> = compatible
        .iter()
        .filter(|c| occupancy.is_free(c.resource_id, legs))
        .collect();

    if let Some(p) = prefer {
        if free.iter().any(|c| c.resource_id == p) {
            return Some(p);
        }
    }
    free.iter()
        .find(|c| c.primary)
        .or_else(|| free.iter().min_by_key(|c| c.resource_id))
        .map(|c| c.resource_id)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::models::{Booking, BookingStatus, Resource, ResourceCategory};
    use crate::storage::Database;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
    }

    fn span(a: &str, b: &str) -> TimeSpan {
        TimeSpan::parse(a, b).unwrap()
    }

    /// Resources 1..=3 host "Lecture"; 2 is primary. Only 3 hosts "Podcast".
    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();
        for id in 1..=3 {
            db.upsert_resource(&Resource {
                id,
                name: format!("Room {id}"),
                category: ResourceCategory::Academy,
                is_active: true,
            })
            .unwrap();
            db.upsert_compatibility(&Compatibility {
                shoot_type: "Lecture".into(),
                resource_id: id,
                primary: id == 2,
            })
            .unwrap();
        }
        db.upsert_compatibility(&Compatibility {
            shoot_type: "Podcast".into(),
            resource_id: 3,
            primary: false,
        })
        .unwrap();
        db
    }

    fn occupy(db: &Database, resource_id: ResourceId, a: &str, b: &str) -> Booking {
        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            category: ResourceCategory::Academy,
            date: date(),
            span: span(a, b),
            requester_name: "Seo".into(),
            requester_ref: None,
            shoot_type: "Lecture".into(),
            resource_id,
            status: BookingStatus::Approved,
            is_active: true,
            group_id: None,
            sequence_order: 1,
            break_window: None,
            course_name: None,
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
        };
        db.insert_booking(&booking).unwrap();
        booking
    }

    fn allocate(db: &Database, request: &AllocationRequest) -> Allocation {
        let schedule = ScheduleConfig::default();
        SlotAllocator::new(&schedule).allocate(db, request).unwrap()
    }

    #[test]
    fn test_empty_calendar_prefers_primary() {
        let db = setup();
        let request = AllocationRequest::new("Lecture", date(), vec![span("10:00", "12:00")]);
        assert_eq!(allocate(&db, &request), Allocation::Assigned { resource_id: 2 });
    }

    #[test]
    fn test_lowest_free_id_without_primary() {
        let db = setup();
        occupy(&db, 2, "11:00", "13:00");
        let request = AllocationRequest::new("Lecture", date(), vec![span("10:00", "12:00")]);
        assert_eq!(allocate(&db, &request), Allocation::Assigned { resource_id: 1 });
    }

    #[test]
    fn test_preferred_resource_kept_when_free() {
        let db = setup();
        let request = AllocationRequest::new("Lecture", date(), vec![span("10:00", "12:00")])
            .preferring(Some(3));
        assert_eq!(allocate(&db, &request), Allocation::Assigned { resource_id: 3 });
    }

    #[test]
    fn test_unknown_type_is_conflict() {
        let db = setup();
        let schedule = ScheduleConfig::default();
        let request = AllocationRequest::new("Drone", date(), vec![span("10:00", "12:00")]);
        let err = SlotAllocator::new(&schedule).allocate(&db, &request).unwrap_err();
        assert!(matches!(err, Error::Conflict { ref suggestions, .. } if suggestions.is_empty()));
    }

    #[test]
    fn test_busy_resource_yields_earliest_suggestions() {
        let db = setup();
        occupy(&db, 3, "09:00", "11:00");
        occupy(&db, 3, "11:30", "13:00");
        let request = AllocationRequest::new("Podcast", date(), vec![span("10:00", "11:00")]);

        match allocate(&db, &request) {
            Allocation::Unavailable { suggestions, .. } => assert_eq!(
                suggestions,
                vec![span("13:00", "14:00"), span("13:30", "14:30"), span("14:00", "15:00")]
            ),
            other => panic!("expected suggestions, got {other:?}"),
        }
    }

    #[test]
    fn test_fully_booked_day_has_no_suggestions() {
        let db = setup();
        occupy(&db, 3, "09:00", "22:00");
        let request = AllocationRequest::new("Podcast", date(), vec![span("10:00", "11:00")]);

        match allocate(&db, &request) {
            Allocation::Unavailable {
                message,
                suggestions,
            } => {
                assert!(suggestions.is_empty());
                assert!(message.contains("choose another date"));
            }
            other => panic!("expected unavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_edit_excludes_own_row() {
        let db = setup();
        let own = occupy(&db, 3, "10:00", "11:00");
        let request = AllocationRequest::new("Podcast", date(), vec![span("10:30", "11:30")])
            .excluding(Some(BookingRef::Booking(own.id)));
        assert_eq!(allocate(&db, &request), Allocation::Assigned { resource_id: 3 });
    }

    #[test]
    fn test_split_suggestion_keeps_break_pattern() {
        let db = setup();
        occupy(&db, 3, "09:00", "10:00");
        occupy(&db, 3, "10:30", "12:00");
        // 09:00-10:00 + 11:00-12:00 collides on both legs
        let legs = vec![span("09:00", "10:00"), span("11:00", "12:00")];
        let request = AllocationRequest::new("Podcast", date(), legs);

        match allocate(&db, &request) {
            Allocation::Unavailable { suggestions, .. } => {
                assert_eq!(suggestions.first(), Some(&span("12:00", "15:00")));
            }
            other => panic!("expected suggestions, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_overlapping_legs() {
        let db = setup();
        let schedule = ScheduleConfig::default();
        let legs = vec![span("09:00", "11:00"), span("10:00", "12:00")];
        let request = AllocationRequest::new("Lecture", date(), legs);
        assert!(matches!(
            SlotAllocator::new(&schedule).allocate(&db, &request),
            Err(Error::Validation(_))
        ));
    }
}

//! Time-bucketed suppression of duplicate history appends

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::trace;
use uuid::Uuid;

use crate::models::ChangeType;

/// Source of "now" for the recorder
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now = *now + by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DedupeKey {
    booking_id: Uuid,
    change_type: ChangeType,
    bucket: i64,
}

/// Process-local map of recently recorded (booking, change, bucket) keys.
///
/// Absorbs repeated calls for one logical action. It is not a uniqueness
/// guarantee across processes or restarts.
#[derive(Debug)]
pub struct DedupeCache {
    bucket: Duration,
    horizon: Duration,
    seen: Mutex<HashMap<DedupeKey, DateTime<Utc>>>,
}

impl DedupeCache {
    pub fn new(bucket: Duration, horizon: Duration) -> Self {
        Self {
            bucket: bucket.max(Duration::milliseconds(1)),
            horizon,
            seen: Mutex::new(HashMap::new()),
        }
    }

    fn key(&self, booking_id: Uuid, change_type: ChangeType, now: DateTime<Utc>) -> DedupeKey {
        DedupeKey {
            booking_id,
            change_type,
            bucket: now
                .timestamp_millis()
                .div_euclid(self.bucket.num_milliseconds()),
        }
    }

    /// Reserve the key for `now`. Returns false if it is already taken.
    ///
    /// Entries older than the horizon are evicted on every call.
    pub fn try_claim(&self, booking_id: Uuid, change_type: ChangeType, now: DateTime<Utc>) -> bool {
        let key = self.key(booking_id, change_type, now);
        let mut seen = self.seen.lock().unwrap_or_else(|e| e.into_inner());

        let before = seen.len();
        let horizon = self.horizon;
        seen.retain(|_, at| now - *at <= horizon);
        if seen.len() != before {
            trace!(evicted = before - seen.len(), "Evicted dedupe entries");
        }

        if seen.contains_key(&key) {
            return false;
        }
        seen.insert(key, now);
        true
    }

    /// Give a claimed key back, e.g. when the write it guarded failed
    pub fn release(&self, booking_id: Uuid, change_type: ChangeType, claimed_at: DateTime<Utc>) {
        let key = self.key(booking_id, change_type, claimed_at);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&key);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn cache() -> DedupeCache {
        DedupeCache::new(Duration::seconds(2), Duration::seconds(10))
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
    }

    #[test]
    fn test_same_bucket_is_duplicate() {
        let cache = cache();
        let id = Uuid::new_v4();
        assert!(cache.try_claim(id, ChangeType::Approved, at(0)));
        assert!(!cache.try_claim(id, ChangeType::Approved, at(1_500)));
        // Different change type or booking is a different key
        assert!(cache.try_claim(id, ChangeType::Cancelled, at(1_500)));
        assert!(cache.try_claim(Uuid::new_v4(), ChangeType::Approved, at(1_500)));
    }

    #[test]
    fn test_next_bucket_is_new() {
        let cache = cache();
        let id = Uuid::new_v4();
        assert!(cache.try_claim(id, ChangeType::Updated, at(0)));
        assert!(cache.try_claim(id, ChangeType::Updated, at(2_000)));
    }

    #[test]
    fn test_old_entries_evicted() {
        let cache = cache();
        cache.try_claim(Uuid::new_v4(), ChangeType::Created, at(0));
        cache.try_claim(Uuid::new_v4(), ChangeType::Created, at(4_000));
        assert_eq!(cache.len(), 2);
        cache.try_claim(Uuid::new_v4(), ChangeType::Created, at(12_000));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_release_allows_retry() {
        let cache = cache();
        let id = Uuid::new_v4();
        assert!(cache.try_claim(id, ChangeType::Deleted, at(0)));
        cache.release(id, ChangeType::Deleted, at(0));
        assert!(cache.try_claim(id, ChangeType::Deleted, at(100)));
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(at(0));
        clock.advance(Duration::seconds(3));
        assert_eq!(clock.now(), at(3_000));
        clock.set(at(0));
        assert_eq!(clock.now(), at(0));
    }
}

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::order::Order;

/// The time-boxed window during which couriers may respond to one order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchQueueEntry {
    pub order_id: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Nearest first. Fixed at creation.
    pub candidate_courier_ids: Vec<Uuid>,
    pub seen_by: BTreeSet<Uuid>,
    pub declined_by: BTreeSet<Uuid>,
}

impl DispatchQueueEntry {
    pub fn open(order_id: Uuid, candidates: Vec<Uuid>, created_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            order_id,
            active: true,
            created_at,
            expires_at: created_at + ttl,
            completed_at: None,
            candidate_courier_ids: candidates,
            seen_by: BTreeSet::new(),
            declined_by: BTreeSet::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.active && !self.is_expired(now)
    }

    pub fn is_candidate(&self, courier_id: Uuid) -> bool {
        self.candidate_courier_ids.contains(&courier_id)
    }

    /// Whether the order should appear in this courier's offer list.
    pub fn offers_to(&self, courier_id: Uuid, now: DateTime<Utc>) -> bool {
        self.is_open(now)
            && self.is_candidate(courier_id)
            && !self.declined_by.contains(&courier_id)
            && !self.seen_by.contains(&courier_id)
    }

    /// Returns `true` if the courier was not already in the set.
    pub fn decline(&mut self, courier_id: Uuid) -> bool {
        self.declined_by.insert(courier_id)
    }

    pub fn mark_seen(&mut self, courier_id: Uuid) -> bool {
        self.seen_by.insert(courier_id)
    }

    /// Deactivates the entry. Returns `false` if it was already retired.
    pub fn retire(&mut self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        self.active = false;
        self.completed_at = Some(now);
        true
    }

    pub fn seconds_left(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}

/// One courier's standing in an entry after a decline or dismissal. Other
/// couriers' responses are not exposed.
#[derive(Debug, Clone, Serialize)]
pub struct QueueMembership {
    pub order_id: Uuid,
    pub courier_id: Uuid,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
    pub seen: bool,
    pub declined: bool,
}

impl QueueMembership {
    pub fn for_courier(entry: &DispatchQueueEntry, courier_id: Uuid) -> Self {
        Self {
            order_id: entry.order_id,
            courier_id,
            active: entry.active,
            expires_at: entry.expires_at,
            seen: entry.seen_by.contains(&courier_id),
            declined: entry.declined_by.contains(&courier_id),
        }
    }
}

/// An order as offered to one courier.
#[derive(Debug, Clone, Serialize)]
pub struct Offer {
    pub order: Order,
    pub expires_at: DateTime<Utc>,
    pub time_left_seconds: i64,
    pub distance_to_restaurant_km: Option<f64>,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::{DispatchQueueEntry, QueueMembership};

    fn entry(candidates: Vec<Uuid>) -> DispatchQueueEntry {
        DispatchQueueEntry::open(Uuid::new_v4(), candidates, Utc::now(), Duration::seconds(150))
    }

    #[test]
    fn expiry_is_fixed_offset_from_creation() {
        let e = entry(vec![]);
        assert_eq!(e.expires_at - e.created_at, Duration::seconds(150));
        assert!(e.is_open(e.created_at + Duration::seconds(149)));
        assert!(!e.is_open(e.created_at + Duration::seconds(150)));
    }

    #[test]
    fn decline_is_idempotent() {
        let courier = Uuid::from_u128(7);
        let mut e = entry(vec![courier]);
        assert!(e.decline(courier));
        assert!(!e.decline(courier));
        assert_eq!(e.declined_by.len(), 1);
    }

    #[test]
    fn offers_exclude_non_candidates_declined_and_seen() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(3);
        let outsider = Uuid::from_u128(4);
        let mut e = entry(vec![a, b, c]);
        let now = e.created_at;

        e.decline(b);
        e.mark_seen(c);

        assert!(e.offers_to(a, now));
        assert!(!e.offers_to(b, now));
        assert!(!e.offers_to(c, now));
        assert!(!e.offers_to(outsider, now));
    }

    #[test]
    fn retire_happens_once() {
        let mut e = entry(vec![]);
        let now = e.created_at;
        assert!(e.retire(now));
        assert!(!e.retire(now + Duration::seconds(5)));
        assert_eq!(e.completed_at, Some(now));
        assert!(!e.is_open(now));
    }

    #[test]
    fn membership_reports_only_the_callers_flags() {
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let mut e = entry(vec![a, b]);
        e.decline(b);
        e.mark_seen(a);

        let view = QueueMembership::for_courier(&e, a);
        assert!(view.seen);
        assert!(!view.declined);
        let json = serde_json::to_value(&view).unwrap();
        assert!(json.get("declined_by").is_none());
        assert!(json.get("seen_by").is_none());
    }
}

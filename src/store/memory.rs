//! In-memory [`DispatchStore`] backed by [`DashMap`].
//!
//! A `get_mut` on a row holds that row's shard write lock until the guard is
//! dropped, which is what serializes mutations of one order. Guards are
//! always taken in the order orders, queue, couriers so two units never wait
//! on each other in opposite directions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use super::{DispatchStore, OrderQuery, OrderScope, Page, StoreCounts, StoreResult, Transition};
use crate::error::AppError;
use crate::models::courier::{Courier, CourierStatus, CourierUpdate};
use crate::models::dispatch::DispatchQueueEntry;
use crate::models::earning::Earning;
use crate::models::notification::Notification;
use crate::models::order::{Order, OrderStatus};
use crate::models::restaurant::Restaurant;

#[derive(Default)]
pub struct MemoryStore {
    couriers: DashMap<Uuid, Courier>,
    restaurants: DashMap<Uuid, Restaurant>,
    orders: DashMap<Uuid, Order>,
    queue: DashMap<Uuid, DispatchQueueEntry>,
    /// Keyed by order id, which makes the key the uniqueness constraint.
    earnings: DashMap<Uuid, Earning>,
    notifications: DashMap<Uuid, Notification>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: Vec<T>, page: Page) -> Vec<T> {
    items
        .into_iter()
        .skip(page.offset())
        .take(page.limit as usize)
        .collect()
}

fn order_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("order {id} not found"))
}

fn courier_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("courier {id} not found"))
}

#[async_trait]
impl DispatchStore for MemoryStore {
    async fn insert_courier(&self, courier: Courier) -> StoreResult<Courier> {
        match self.couriers.entry(courier.id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!("courier {} already registered", courier.id))),
            Entry::Vacant(slot) => {
                slot.insert(courier.clone());
                Ok(courier)
            }
        }
    }

    async fn courier(&self, id: Uuid) -> StoreResult<Option<Courier>> {
        Ok(self.couriers.get(&id).map(|c| c.value().clone()))
    }

    async fn couriers(&self) -> StoreResult<Vec<Courier>> {
        Ok(self
            .couriers
            .iter()
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn update_courier(&self, id: Uuid, update: CourierUpdate, now: DateTime<Utc>) -> StoreResult<Courier> {
        let mut courier = self.couriers.get_mut(&id).ok_or_else(|| courier_not_found(id))?;
        courier.apply(&update, now)?;
        Ok(courier.clone())
    }

    async fn register_restaurant(&self, restaurant: Restaurant) -> StoreResult<Restaurant> {
        match self.restaurants.entry(restaurant.id) {
            Entry::Occupied(mut slot) => {
                if slot.get().manager_id != restaurant.manager_id {
                    return Err(AppError::Forbidden(format!(
                        "restaurant {} is managed by someone else",
                        restaurant.id
                    )));
                }
                slot.insert(restaurant.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(restaurant.clone());
            }
        }
        Ok(restaurant)
    }

    async fn restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>> {
        Ok(self.restaurants.get(&id).map(|r| r.value().clone()))
    }

    async fn restaurants_managed_by(&self, manager_id: Uuid) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .restaurants
            .iter()
            .filter(|entry| entry.manager_id == manager_id)
            .map(|entry| entry.id)
            .collect())
    }

    async fn create_order(&self, order: Order, entry: DispatchQueueEntry) -> StoreResult<Order> {
        if entry.order_id != order.id {
            return Err(AppError::Internal(format!(
                "queue entry for {} attached to order {}",
                entry.order_id, order.id
            )));
        }

        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!("order {} already exists", order.id))),
            Entry::Vacant(slot) => {
                self.queue.insert(entry.order_id, entry);
                slot.insert(order.clone());
                Ok(order)
            }
        }
    }

    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>> {
        Ok(self.orders.get(&id).map(|o| o.value().clone()))
    }

    async fn orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>> {
        let mut matching: Vec<Order> = self
            .orders
            .iter()
            .filter(|entry| {
                let order = entry.value();
                let in_scope = match &query.scope {
                    OrderScope::Customer(id) => order.customer_id == *id,
                    OrderScope::Courier(id) => order.courier_id == Some(*id),
                    OrderScope::Restaurants(ids) => ids.contains(&order.restaurant_id),
                };
                in_scope && query.status.is_none_or(|status| order.status == status)
            })
            .map(|entry| entry.value().clone())
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(matching, query.page))
    }

    async fn accept_order(&self, order_id: Uuid, courier_id: Uuid, now: DateTime<Utc>) -> StoreResult<Order> {
        let mut order = self.orders.get_mut(&order_id).ok_or_else(|| order_not_found(order_id))?;
        let mut entry = self
            .queue
            .get_mut(&order_id)
            .ok_or_else(|| AppError::NotFound(format!("no dispatch entry for order {order_id}")))?;
        let mut courier = self
            .couriers
            .get_mut(&courier_id)
            .ok_or_else(|| courier_not_found(courier_id))?;

        if order.status != OrderStatus::Pending {
            return Err(AppError::Conflict(format!(
                "order {order_id} is no longer pending ({})",
                order.status
            )));
        }
        if !entry.active {
            return Err(AppError::Conflict(format!(
                "dispatch window for order {order_id} is closed"
            )));
        }
        if entry.is_expired(now) {
            return Err(AppError::Expired(format!(
                "dispatch window for order {order_id} has expired"
            )));
        }
        if entry.declined_by.contains(&courier_id) {
            return Err(AppError::Conflict(format!(
                "courier {courier_id} declined order {order_id}"
            )));
        }
        if !courier.can_take_offer() {
            return Err(AppError::Conflict(format!(
                "courier {courier_id} is not available ({:?})",
                courier.status
            )));
        }

        order.transition(OrderStatus::AcceptedByDriver, now)?;
        order.courier_id = Some(courier_id);
        entry.retire(now);
        courier.set_status(CourierStatus::Busy, now);

        Ok(order.clone())
    }

    async fn advance_order(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition> {
        let mut order = self.orders.get_mut(&order_id).ok_or_else(|| order_not_found(order_id))?;

        if let Some(courier_id) = actor {
            if !order.is_bound_to(courier_id) {
                return Err(AppError::Forbidden(format!(
                    "courier {courier_id} is not assigned to order {order_id}"
                )));
            }
        }

        let from = order.status;
        if from == OrderStatus::Delivered && target == OrderStatus::Delivered {
            return Ok(Transition {
                order: order.clone(),
                from,
            });
        }

        order.transition(target, now)?;

        if target == OrderStatus::Cancelled {
            if let Some(mut entry) = self.queue.get_mut(&order_id) {
                entry.retire(now);
            }
        }

        if let Some(courier_id) = order.courier_id {
            let next_courier_status = match target {
                OrderStatus::PickedUp => Some(CourierStatus::OnDelivery),
                OrderStatus::Delivered | OrderStatus::Cancelled => Some(CourierStatus::Available),
                _ => None,
            };
            if let Some(status) = next_courier_status {
                if let Some(mut courier) = self.couriers.get_mut(&courier_id) {
                    courier.set_status(status, now);
                }
            }
        }

        Ok(Transition {
            order: order.clone(),
            from,
        })
    }

    async fn queue_entry(&self, order_id: Uuid) -> StoreResult<Option<DispatchQueueEntry>> {
        Ok(self.queue.get(&order_id).map(|e| e.value().clone()))
    }

    async fn open_entries(&self, now: DateTime<Utc>) -> StoreResult<Vec<DispatchQueueEntry>> {
        let mut open: Vec<DispatchQueueEntry> = self
            .queue
            .iter()
            .filter(|entry| entry.is_open(now))
            .map(|entry| entry.value().clone())
            .collect();

        open.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.order_id.cmp(&b.order_id)));
        Ok(open)
    }

    async fn decline(&self, order_id: Uuid, courier_id: Uuid) -> StoreResult<DispatchQueueEntry> {
        let mut entry = self
            .queue
            .get_mut(&order_id)
            .ok_or_else(|| order_not_found(order_id))?;
        if !entry.is_candidate(courier_id) {
            return Err(order_not_found(order_id));
        }
        if entry.active {
            entry.decline(courier_id);
        }
        Ok(entry.clone())
    }

    async fn mark_seen(&self, order_id: Uuid, courier_id: Uuid) -> StoreResult<DispatchQueueEntry> {
        let mut entry = self
            .queue
            .get_mut(&order_id)
            .ok_or_else(|| order_not_found(order_id))?;
        if !entry.is_candidate(courier_id) {
            return Err(order_not_found(order_id));
        }
        if entry.active {
            entry.mark_seen(courier_id);
        }
        Ok(entry.clone())
    }

    async fn expired_entries(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        Ok(self
            .queue
            .iter()
            .filter(|entry| entry.active && entry.is_expired(now))
            .map(|entry| entry.order_id)
            .collect())
    }

    async fn expire_order(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>> {
        let Some(mut order) = self.orders.get_mut(&order_id) else {
            return Ok(None);
        };
        let Some(mut entry) = self.queue.get_mut(&order_id) else {
            return Ok(None);
        };

        if !entry.active || !entry.is_expired(now) {
            return Ok(None);
        }

        if order.status != OrderStatus::Pending {
            entry.retire(now);
            return Ok(None);
        }

        order.transition(OrderStatus::NoCouriersAvailable, now)?;
        entry.retire(now);
        Ok(Some(order.clone()))
    }

    async fn insert_earning(&self, earning: Earning) -> StoreResult<Option<Earning>> {
        match self.earnings.entry(earning.order_id) {
            Entry::Occupied(_) => Ok(None),
            Entry::Vacant(slot) => {
                if let Some(mut courier) = self.couriers.get_mut(&earning.courier_id) {
                    courier.total_deliveries += 1;
                    courier.total_earnings += earning.net_amount;
                }
                slot.insert(earning.clone());
                Ok(Some(earning))
            }
        }
    }

    async fn earnings_for(
        &self,
        courier_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Earning>> {
        let mut rows: Vec<Earning> = self
            .earnings
            .iter()
            .filter(|entry| entry.courier_id == courier_id && entry.created_at >= start && entry.created_at <= end)
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification> {
        self.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn notifications(&self, user_id: Uuid, unread_only: bool, page: Page) -> StoreResult<Vec<Notification>> {
        let mut rows: Vec<Notification> = self
            .notifications
            .iter()
            .filter(|entry| entry.user_id == user_id && (!unread_only || !entry.is_read))
            .map(|entry| entry.value().clone())
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, page))
    }

    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid, now: DateTime<Utc>) -> StoreResult<Notification> {
        let mut notification = self
            .notifications
            .get_mut(&id)
            .filter(|n| n.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("notification {id} not found")))?;
        notification.mark_read(now);
        Ok(notification.clone())
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize> {
        let mut updated = 0;
        for mut entry in self.notifications.iter_mut() {
            if entry.user_id == user_id && !entry.is_read {
                entry.mark_read(now);
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn counts(&self) -> StoreResult<StoreCounts> {
        Ok(StoreCounts {
            couriers: self.couriers.len(),
            orders: self.orders.len(),
            open_entries: self.queue.iter().filter(|entry| entry.active).count(),
            earnings: self.earnings.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use super::MemoryStore;
    use crate::error::AppError;
    use crate::geo::GeoPoint;
    use crate::models::courier::{Courier, CourierStatus};
    use crate::models::dispatch::DispatchQueueEntry;
    use crate::models::earning::Earning;
    use crate::models::order::{DeliveryAddress, Order, OrderAmounts, OrderStatus, StatusTimestamps};
    use crate::models::restaurant::Restaurant;
    use crate::store::DispatchStore;

    fn order(id: Uuid, created_at: chrono::DateTime<Utc>) -> Order {
        Order {
            id,
            customer_id: Uuid::from_u128(100),
            restaurant_id: Uuid::from_u128(200),
            items: vec![],
            delivery_address: DeliveryAddress {
                line1: "1 Main St".into(),
                line2: None,
                city: "Berlin".into(),
                postal_code: None,
                location: None,
            },
            special_instructions: None,
            delivery_instructions: None,
            amounts: OrderAmounts::new(dec!(10), dec!(2), dec!(1), dec!(0)).unwrap(),
            status: OrderStatus::Pending,
            courier_id: None,
            created_at,
            updated_at: created_at,
            timestamps: StatusTimestamps::default(),
        }
    }

    async fn seed(store: &MemoryStore, couriers: &[Uuid]) -> Uuid {
        let now = Utc::now();
        for id in couriers {
            let mut courier = Courier::new(*id, "c".into(), GeoPoint::new(52.5, 13.4), 4.5, now);
            courier.set_status(CourierStatus::Available, now);
            store.insert_courier(courier).await.unwrap();
        }
        let order_id = Uuid::new_v4();
        let entry = DispatchQueueEntry::open(order_id, couriers.to_vec(), now, Duration::seconds(150));
        store.create_order(order(order_id, now), entry).await.unwrap();
        order_id
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let couriers: Vec<Uuid> = (1..=8).map(Uuid::from_u128).collect();
        let store = Arc::new(MemoryStore::new());
        let order_id = seed(&store, &couriers).await;
        let now = Utc::now();

        let handles: Vec<_> = couriers
            .iter()
            .map(|courier_id| {
                let store = store.clone();
                let courier_id = *courier_id;
                tokio::spawn(async move { store.accept_order(order_id, courier_id, now).await })
            })
            .collect();

        let mut winners = Vec::new();
        for handle in handles {
            match handle.await.unwrap() {
                Ok(order) => winners.push(order.courier_id),
                Err(AppError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = store.order(order_id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::AcceptedByDriver);
        assert_eq!(stored.courier_id, winners[0]);

        let busy = store
            .couriers()
            .await
            .unwrap()
            .into_iter()
            .filter(|c| c.status == CourierStatus::Busy)
            .count();
        assert_eq!(busy, 1);
    }

    #[tokio::test]
    async fn duplicate_order_id_is_rejected() {
        let store = MemoryStore::new();
        let order_id = seed(&store, &[]).await;
        let now = Utc::now();
        let entry = DispatchQueueEntry::open(order_id, vec![], now, Duration::seconds(150));
        let err = store.create_order(order(order_id, now), entry).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn earning_is_unique_per_order() {
        let store = MemoryStore::new();
        let courier_id = Uuid::from_u128(1);
        let order_id = seed(&store, &[courier_id]).await;

        let earning = Earning {
            id: Uuid::new_v4(),
            order_id,
            courier_id,
            gross_amount: dec!(26.50),
            commission_rate: dec!(0.30),
            commission_amount: dec!(7.95),
            net_amount: dec!(18.55),
            created_at: Utc::now(),
        };

        let settled_at = earning.created_at;
        assert!(store.insert_earning(earning.clone()).await.unwrap().is_some());
        let second = Earning {
            id: Uuid::new_v4(),
            ..earning
        };
        assert!(store.insert_earning(second).await.unwrap().is_none());

        let window = store
            .earnings_for(courier_id, settled_at, settled_at)
            .await
            .unwrap();
        assert_eq!(window.len(), 1);
        let courier = store.courier(courier_id).await.unwrap().unwrap();
        assert_eq!(courier.total_deliveries, 1);
        assert_eq!(courier.total_earnings, dec!(18.55));
    }

    #[tokio::test]
    async fn expire_order_transitions_once() {
        let store = MemoryStore::new();
        let order_id = seed(&store, &[]).await;
        let later = Utc::now() + Duration::seconds(151);

        assert_eq!(store.expired_entries(later).await.unwrap(), vec![order_id]);
        let expired = store.expire_order(order_id, later).await.unwrap();
        assert_eq!(expired.map(|o| o.status), Some(OrderStatus::NoCouriersAvailable));
        assert!(store.expire_order(order_id, later).await.unwrap().is_none());
        assert!(store.expired_entries(later).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expire_skips_entries_still_inside_window() {
        let store = MemoryStore::new();
        let order_id = seed(&store, &[]).await;
        assert!(store.expire_order(order_id, Utc::now()).await.unwrap().is_none());
        let entry = store.queue_entry(order_id).await.unwrap().unwrap();
        assert!(entry.active);
    }

    #[tokio::test]
    async fn status_change_by_other_courier_is_forbidden() {
        let store = MemoryStore::new();
        let winner = Uuid::from_u128(1);
        let other = Uuid::from_u128(2);
        let order_id = seed(&store, &[winner, other]).await;
        let now = Utc::now();
        store.accept_order(order_id, winner, now).await.unwrap();

        let err = store
            .advance_order(order_id, OrderStatus::OrderingAtRestaurant, Some(other), now)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn cancellation_retires_entry_and_frees_courier() {
        let store = MemoryStore::new();
        let courier_id = Uuid::from_u128(1);
        let order_id = seed(&store, &[courier_id]).await;
        let now = Utc::now();
        store.accept_order(order_id, courier_id, now).await.unwrap();

        let transition = store
            .advance_order(order_id, OrderStatus::Cancelled, None, now)
            .await
            .unwrap();
        assert_eq!(transition.from, OrderStatus::AcceptedByDriver);
        assert_eq!(transition.order.timestamps.cancelled_at, Some(now));

        let courier = store.courier(courier_id).await.unwrap().unwrap();
        assert!(courier.is_available);
    }

    #[tokio::test]
    async fn earnings_window_is_inclusive_and_filters_by_time() {
        let store = MemoryStore::new();
        let courier_id = Uuid::from_u128(1);
        let now = Utc::now();
        for days_ago in [0, 3, 10] {
            let earning = Earning {
                id: Uuid::new_v4(),
                order_id: Uuid::new_v4(),
                courier_id,
                gross_amount: dec!(10.00),
                commission_rate: dec!(0.30),
                commission_amount: dec!(3.00),
                net_amount: dec!(7.00),
                created_at: now - Duration::days(days_ago),
            };
            store.insert_earning(earning).await.unwrap();
        }

        let rows = store
            .earnings_for(courier_id, now - Duration::days(3), now)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].created_at, now);
        assert!(
            store
                .earnings_for(Uuid::from_u128(2), now - Duration::days(30), now)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn courier_registers_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = Uuid::from_u128(1);
        store
            .insert_courier(Courier::new(id, "first".into(), GeoPoint::new(52.5, 13.4), 5.0, now))
            .await
            .unwrap();

        let err = store
            .insert_courier(Courier::new(id, "second".into(), GeoPoint::new(0.0, 0.0), 5.0, now))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.courier(id).await.unwrap().unwrap().name, "first");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_courier_registration_has_one_winner() {
        let store = Arc::new(MemoryStore::new());
        let id = Uuid::from_u128(1);
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let store = store.clone();
                tokio::spawn(async move {
                    let courier = Courier::new(id, format!("c{n}"), GeoPoint::new(52.5, 13.4), 5.0, Utc::now());
                    store.insert_courier(courier).await
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn restaurant_stays_with_its_manager() {
        let store = MemoryStore::new();
        let id = Uuid::from_u128(9);
        let owner = Uuid::from_u128(1);
        let restaurant = |name: &str, manager_id: Uuid| Restaurant {
            id,
            name: name.to_string(),
            location: GeoPoint::new(52.52, 13.405),
            manager_id,
        };

        store.register_restaurant(restaurant("Kebab", owner)).await.unwrap();
        store.register_restaurant(restaurant("Kebab Haus", owner)).await.unwrap();

        let err = store
            .register_restaurant(restaurant("Taken", Uuid::from_u128(2)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let stored = store.restaurant(id).await.unwrap().unwrap();
        assert_eq!(stored.name, "Kebab Haus");
        assert_eq!(stored.manager_id, owner);
    }

    #[tokio::test]
    async fn only_candidates_touch_the_entry() {
        let store = MemoryStore::new();
        let candidate = Uuid::from_u128(1);
        let outsider = Uuid::from_u128(2);
        let order_id = seed(&store, &[candidate]).await;

        assert!(matches!(
            store.decline(order_id, outsider).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            store.mark_seen(order_id, outsider).await,
            Err(AppError::NotFound(_))
        ));

        store.decline(order_id, candidate).await.unwrap();
        let entry = store.decline(order_id, candidate).await.unwrap();
        assert_eq!(entry.declined_by.len(), 1);
        assert!(entry.seen_by.is_empty());
    }

    #[tokio::test]
    async fn retired_entry_is_left_alone() {
        let store = MemoryStore::new();
        let winner = Uuid::from_u128(1);
        let late = Uuid::from_u128(2);
        let order_id = seed(&store, &[winner, late]).await;
        store.accept_order(order_id, winner, Utc::now()).await.unwrap();

        let entry = store.decline(order_id, late).await.unwrap();
        assert!(!entry.active);
        assert!(entry.declined_by.is_empty());
        let entry = store.mark_seen(order_id, late).await.unwrap();
        assert!(entry.seen_by.is_empty());
    }
}

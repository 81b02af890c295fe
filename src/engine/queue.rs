use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::DispatchSettings;
use crate::engine::{record_notification, retry_once};
use crate::error::AppError;
use crate::geo::haversine_km;
use crate::models::dispatch::{DispatchQueueEntry, Offer, QueueMembership};
use crate::models::notification::{Notification, NotificationKind};
use crate::models::order::Order;
use crate::notify::{Channel, Envelope, EventType, Fanout};
use crate::observability::metrics::Metrics;
use crate::store::DispatchStore;

/// Visibility windows of pending orders.
#[derive(Clone)]
pub struct DispatchQueue {
    store: Arc<dyn DispatchStore>,
    fanout: Arc<dyn Fanout>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    settings: DispatchSettings,
}

impl DispatchQueue {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        fanout: Arc<dyn Fanout>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            store,
            fanout,
            clock,
            metrics,
            settings,
        }
    }

    /// A fresh entry whose window closes one TTL after `created_at`.
    pub fn open_entry(&self, order_id: Uuid, candidates: Vec<Uuid>, created_at: DateTime<Utc>) -> DispatchQueueEntry {
        DispatchQueueEntry::open(order_id, candidates, created_at, self.settings.ttl)
    }

    /// Orders currently offered to the courier, oldest first.
    pub async fn list_available_for(&self, courier_id: Uuid) -> Result<Vec<Offer>, AppError> {
        let courier = self
            .store
            .courier(courier_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("courier {courier_id} not found")))?;
        let now = self.clock.now();

        let entries: Vec<DispatchQueueEntry> = self
            .store
            .open_entries(now)
            .await?
            .into_iter()
            .filter(|entry| entry.offers_to(courier_id, now))
            .take(self.settings.offer_page_size)
            .collect();

        let mut offers = Vec::with_capacity(entries.len());
        for entry in entries {
            let Some(order) = self.store.order(entry.order_id).await? else {
                warn!(order_id = %entry.order_id, "queue entry without order");
                continue;
            };
            let distance_to_restaurant_km = self
                .store
                .restaurant(order.restaurant_id)
                .await?
                .map(|restaurant| haversine_km(&courier.location, &restaurant.location));

            offers.push(Offer {
                time_left_seconds: entry.seconds_left(now),
                expires_at: entry.expires_at,
                distance_to_restaurant_km,
                order,
            });
        }
        Ok(offers)
    }

    pub async fn decline(&self, order_id: Uuid, courier_id: Uuid) -> Result<QueueMembership, AppError> {
        let entry = retry_once("decline", || self.store.decline(order_id, courier_id)).await?;
        info!(order_id = %order_id, courier_id = %courier_id, "offer declined");
        Ok(QueueMembership::for_courier(&entry, courier_id))
    }

    /// Dismisses the offer from the courier's list without declining it.
    pub async fn mark_seen(&self, order_id: Uuid, courier_id: Uuid) -> Result<QueueMembership, AppError> {
        let entry = retry_once("mark_seen", || self.store.mark_seen(order_id, courier_id)).await?;
        Ok(QueueMembership::for_courier(&entry, courier_id))
    }

    /// Closes every lapsed window. Returns the orders that moved to
    /// `no_couriers_available` on this pass.
    pub async fn sweep_expired(&self) -> Result<Vec<Order>, AppError> {
        let now = self.clock.now();
        let lapsed = self.store.expired_entries(now).await?;
        let mut expired = Vec::new();

        for order_id in lapsed {
            match retry_once("expire_order", || self.store.expire_order(order_id, now)).await {
                Ok(Some(order)) => {
                    self.announce_expiry(&order, now).await;
                    expired.push(order);
                }
                Ok(None) => {}
                Err(err) => warn!(order_id = %order_id, error = %err, "failed to expire order"),
            }
        }

        if let Ok(counts) = self.store.counts().await {
            self.metrics.open_dispatch_entries.set(counts.open_entries as i64);
        }
        Ok(expired)
    }

    async fn announce_expiry(&self, order: &Order, now: DateTime<Utc>) {
        self.metrics.orders_expired_total.inc();
        info!(order_id = %order.id, customer_id = %order.customer_id, "order expired without a courier");

        let notification = Notification::new(
            order.customer_id,
            NotificationKind::OrderExpired,
            "No Couriers Available",
            "Sorry, no couriers were available to accept your order. Please try again.",
            Some(order.id),
            now,
        );
        record_notification(self.store.as_ref(), notification).await;

        let payload = json!({ "order_id": order.id, "status": order.status });
        for channel in [Channel::User(order.customer_id), Channel::Order(order.id)] {
            self.fanout
                .publish(&channel, Envelope::new(EventType::OrderExpired, payload.clone(), now));
        }
    }
}

/// Runs [`DispatchQueue::sweep_expired`] every `interval` until the task is dropped.
pub async fn run_expiry_sweep(queue: DispatchQueue, interval: std::time::Duration) {
    info!(interval_ms = interval.as_millis() as u64, "expiry sweep started");
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match queue.sweep_expired().await {
            Ok(expired) if !expired.is_empty() => info!(count = expired.len(), "expiry sweep closed orders"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "expiry sweep failed"),
        }
    }
}

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::clock::Clock;
use crate::config::DispatchSettings;
use crate::engine::earnings::EarningsLedger;
use crate::engine::queue::DispatchQueue;
use crate::engine::{record_notification, retry_once};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::geo::locator::Locator;
use crate::models::courier::{Courier, CourierStatus, CourierUpdate};
use crate::models::dispatch::QueueMembership;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::order::{Order, OrderDraft, OrderStatus, StatusTimestamps};
use crate::notify::{Channel, Envelope, EventType, Fanout};
use crate::observability::metrics::Metrics;
use crate::store::{DispatchStore, OrderQuery, OrderScope, Page};

/// The authoritative order record and its lifecycle.
#[derive(Clone)]
pub struct OrderLedger {
    store: Arc<dyn DispatchStore>,
    fanout: Arc<dyn Fanout>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
    settings: DispatchSettings,
    locator: Locator,
    queue: DispatchQueue,
    earnings: EarningsLedger,
}

impl OrderLedger {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn DispatchStore>,
        fanout: Arc<dyn Fanout>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
        settings: DispatchSettings,
        locator: Locator,
        queue: DispatchQueue,
        earnings: EarningsLedger,
    ) -> Self {
        Self {
            store,
            fanout,
            clock,
            metrics,
            settings,
            locator,
            queue,
            earnings,
        }
    }

    fn publish(&self, channels: &[Channel], event_type: EventType, payload: serde_json::Value, now: DateTime<Utc>) {
        for channel in channels {
            self.fanout
                .publish(channel, Envelope::new(event_type, payload.clone(), now));
        }
    }

    /// Places an order and opens its dispatch window for the couriers
    /// nearest to the restaurant.
    pub async fn create(&self, customer_id: Uuid, draft: OrderDraft) -> Result<Order, AppError> {
        let amounts = draft.validate()?;
        let restaurant = self
            .store
            .restaurant(draft.restaurant_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("restaurant {} not found", draft.restaurant_id)))?;

        let candidates: Vec<Uuid> = self
            .locator
            .find_nearby(restaurant.location, self.settings.radius_km, CourierStatus::Available)
            .await?
            .into_iter()
            .map(|nearby| nearby.courier.id)
            .collect();

        let now = self.clock.now();
        let order = Order {
            id: Uuid::new_v4(),
            customer_id,
            restaurant_id: restaurant.id,
            items: draft.items,
            delivery_address: draft.delivery_address,
            special_instructions: draft.special_instructions,
            delivery_instructions: draft.delivery_instructions,
            amounts,
            status: OrderStatus::Pending,
            courier_id: None,
            created_at: now,
            updated_at: now,
            timestamps: StatusTimestamps::default(),
        };
        let entry = self.queue.open_entry(order.id, candidates.clone(), now);
        let expires_at = entry.expires_at;

        let order = retry_once("create_order", || self.store.create_order(order.clone(), entry.clone())).await?;

        self.metrics.orders_created_total.inc();
        self.metrics.open_dispatch_entries.inc();
        info!(
            order_id = %order.id,
            customer_id = %customer_id,
            candidates = candidates.len(),
            total = %order.amounts.total,
            "order created"
        );

        let payload = json!({
            "order": order,
            "expires_at": expires_at,
            "candidate_courier_ids": candidates,
        });
        let mut channels = vec![Channel::Couriers, Channel::Order(order.id)];
        channels.extend(candidates.iter().map(|id| Channel::User(*id)));
        self.publish(&channels, EventType::OrderCreated, payload, now);

        Ok(order)
    }

    /// Binds the courier to the order if it is still up for grabs.
    pub async fn accept(&self, order_id: Uuid, courier_id: Uuid) -> Result<Order, AppError> {
        let start = Instant::now();
        let now = self.clock.now();
        let result = retry_once("accept_order", || self.store.accept_order(order_id, courier_id, now)).await;

        let outcome = match &result {
            Ok(_) => "accepted",
            Err(AppError::Conflict(_)) | Err(AppError::Expired(_)) => "rejected",
            Err(_) => "error",
        };
        self.metrics
            .accept_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics.acceptances_total.with_label_values(&[outcome]).inc();

        let order = match result {
            Ok(order) => order,
            Err(err) => {
                warn!(order_id = %order_id, courier_id = %courier_id, error = %err, "acceptance rejected");
                return Err(err);
            }
        };

        self.metrics.open_dispatch_entries.dec();
        info!(order_id = %order.id, courier_id = %courier_id, "order accepted");

        let payload = json!({ "order": order, "courier_id": courier_id });
        self.publish(
            &[
                Channel::Order(order.id),
                Channel::User(order.customer_id),
                Channel::Couriers,
            ],
            EventType::OrderAccepted,
            payload,
            now,
        );
        record_notification(
            self.store.as_ref(),
            Notification::new(
                order.customer_id,
                NotificationKind::OrderAccepted,
                "Courier Accepted",
                "A courier has accepted your order!",
                Some(order.id),
                now,
            ),
        )
        .await;

        Ok(order)
    }

    pub async fn decline(&self, order_id: Uuid, courier_id: Uuid) -> Result<QueueMembership, AppError> {
        self.queue.decline(order_id, courier_id).await
    }

    /// Advances a bound order. Only post-acceptance statuses and `cancelled`
    /// can be requested here.
    pub async fn update_status(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        courier_id: Option<Uuid>,
    ) -> Result<Order, AppError> {
        if !target.is_courier_settable() {
            return Err(AppError::Validation(format!("status {target} cannot be set directly")));
        }

        let now = self.clock.now();
        let transition =
            retry_once("advance_order", || self.store.advance_order(order_id, target, courier_id, now)).await?;
        let order = transition.order.clone();

        if target == OrderStatus::Delivered {
            let bound = order
                .courier_id
                .ok_or_else(|| AppError::Internal(format!("delivered order {order_id} has no courier")))?;
            self.earnings
                .settle(order.id, bound, order.amounts.total, self.settings.commission_rate)
                .await?;
        }

        if transition.is_replay() {
            return Ok(order);
        }

        if transition.from == OrderStatus::Pending {
            self.metrics.open_dispatch_entries.dec();
        }
        info!(order_id = %order.id, from = %transition.from, status = %order.status, "order status changed");
        self.announce_status(&order, now).await;
        Ok(order)
    }

    async fn announce_status(&self, order: &Order, now: DateTime<Utc>) {
        let payload = json!({ "order_id": order.id, "status": order.status, "order": order });
        let mut channels = vec![Channel::User(order.customer_id), Channel::Order(order.id)];
        if order.status == OrderStatus::Cancelled && order.courier_id.is_none() {
            channels.push(Channel::Couriers);
        }
        self.publish(&channels, EventType::StatusUpdate, payload, now);

        record_notification(
            self.store.as_ref(),
            Notification::new(
                order.customer_id,
                NotificationKind::StatusUpdate,
                "Order Update",
                format!(
                    "Your order status has changed to: {}",
                    order.status.as_str().replace('_', " ")
                ),
                Some(order.id),
                now,
            ),
        )
        .await;
    }

    /// Cancels on behalf of the owning customer or the bound courier.
    pub async fn cancel(&self, order_id: Uuid, principal: &Principal) -> Result<Order, AppError> {
        let order = self.get(order_id, principal).await?;
        let actor = match principal.role {
            Role::Customer if order.customer_id == principal.id => None,
            Role::Courier if order.is_bound_to(principal.id) => Some(principal.id),
            _ => {
                return Err(AppError::Forbidden(format!(
                    "{} {} may not cancel order {order_id}",
                    principal.role, principal.id
                )));
            }
        };
        self.update_status(order_id, OrderStatus::Cancelled, actor).await
    }

    /// The order if `principal` takes part in it. Everyone else sees nothing.
    pub async fn get(&self, order_id: Uuid, principal: &Principal) -> Result<Order, AppError> {
        let order = self
            .store
            .order(order_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;

        if self.is_participant(&order, principal).await? {
            Ok(order)
        } else {
            Err(AppError::NotFound(format!("order {order_id} not found")))
        }
    }

    async fn is_participant(&self, order: &Order, principal: &Principal) -> Result<bool, AppError> {
        Ok(match principal.role {
            Role::Customer => order.customer_id == principal.id,
            Role::Courier => {
                if order.is_bound_to(principal.id) {
                    true
                } else if order.status == OrderStatus::Pending {
                    self.store
                        .queue_entry(order.id)
                        .await?
                        .is_some_and(|entry| entry.is_candidate(principal.id))
                } else {
                    false
                }
            }
            Role::RestaurantStaff => self
                .store
                .restaurant(order.restaurant_id)
                .await?
                .is_some_and(|restaurant| restaurant.manager_id == principal.id),
        })
    }

    /// Newest first, scoped to what the caller's role may see.
    pub async fn list_for(
        &self,
        principal: &Principal,
        status: Option<OrderStatus>,
        page: Page,
    ) -> Result<Vec<Order>, AppError> {
        let scope = match principal.role {
            Role::Customer => OrderScope::Customer(principal.id),
            Role::Courier => OrderScope::Courier(principal.id),
            Role::RestaurantStaff => OrderScope::Restaurants(self.store.restaurants_managed_by(principal.id).await?),
        };
        self.store.orders(&OrderQuery { scope, status, page }).await
    }

    /// Records the courier's position and, for an order they carry, relays it
    /// to whoever watches that order.
    pub async fn relay_location(
        &self,
        courier_id: Uuid,
        location: GeoPoint,
        order_id: Option<Uuid>,
    ) -> Result<Courier, AppError> {
        let relay_to = match order_id {
            Some(order_id) => {
                let order = self
                    .store
                    .order(order_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("order {order_id} not found")))?;
                if !order.is_bound_to(courier_id) {
                    return Err(AppError::Forbidden(format!(
                        "courier {courier_id} is not assigned to order {order_id}"
                    )));
                }
                Some(order_id)
            }
            None => None,
        };

        let now = self.clock.now();
        let update = CourierUpdate {
            status: None,
            location: Some(location),
        };
        let courier = retry_once("update_courier", || self.store.update_courier(courier_id, update.clone(), now)).await?;

        if let Some(order_id) = relay_to {
            self.fanout.publish(
                &Channel::Order(order_id),
                Envelope::new(
                    EventType::DriverLocation,
                    json!({ "courier_id": courier_id, "order_id": order_id, "location": location }),
                    now,
                ),
            );
        }

        Ok(courier)
    }
}

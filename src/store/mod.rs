//! Persistence seam for the dispatch engine.
//!
//! Each mutating method is one atomic unit: it either applies completely or
//! not at all, and every mutation of a single order runs under an exclusive
//! guard on that order's row. Callers never read a row and write it back in
//! a separate step.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::courier::{Courier, CourierUpdate};
use crate::models::dispatch::DispatchQueueEntry;
use crate::models::earning::Earning;
use crate::models::notification::Notification;
use crate::models::order::{Order, OrderStatus};
use crate::models::restaurant::Restaurant;

pub use memory::MemoryStore;

pub type StoreResult<T> = Result<T, AppError>;

pub const DEFAULT_PAGE_LIMIT: u32 = 20;
pub const MAX_PAGE_LIMIT: u32 = 100;

/// One-based pagination window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1) as usize) * self.limit as usize
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderScope {
    Customer(Uuid),
    Courier(Uuid),
    Restaurants(Vec<Uuid>),
}

#[derive(Debug, Clone)]
pub struct OrderQuery {
    pub scope: OrderScope,
    pub status: Option<OrderStatus>,
    pub page: Page,
}

/// Result of a status change. `from == to == Delivered` marks a replay of an
/// already applied delivery.
#[derive(Debug, Clone)]
pub struct Transition {
    pub order: Order,
    pub from: OrderStatus,
}

impl Transition {
    pub fn is_replay(&self) -> bool {
        self.from == self.order.status
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreCounts {
    pub couriers: usize,
    pub orders: usize,
    pub open_entries: usize,
    pub earnings: usize,
}

#[async_trait]
pub trait DispatchStore: Send + Sync {
    /// Fails with `Conflict` when a courier with the same id exists.
    async fn insert_courier(&self, courier: Courier) -> StoreResult<Courier>;
    async fn courier(&self, id: Uuid) -> StoreResult<Option<Courier>>;
    async fn couriers(&self) -> StoreResult<Vec<Courier>>;
    /// Last write wins.
    async fn update_courier(&self, id: Uuid, update: CourierUpdate, now: DateTime<Utc>) -> StoreResult<Courier>;

    /// Inserts or replaces a restaurant. Replacing one held by another
    /// manager fails with `Forbidden`.
    async fn register_restaurant(&self, restaurant: Restaurant) -> StoreResult<Restaurant>;
    async fn restaurant(&self, id: Uuid) -> StoreResult<Option<Restaurant>>;
    async fn restaurants_managed_by(&self, manager_id: Uuid) -> StoreResult<Vec<Uuid>>;

    /// Persists an order together with its queue entry.
    async fn create_order(&self, order: Order, entry: DispatchQueueEntry) -> StoreResult<Order>;
    async fn order(&self, id: Uuid) -> StoreResult<Option<Order>>;
    async fn orders(&self, query: &OrderQuery) -> StoreResult<Vec<Order>>;

    /// Checks eligibility and binds the courier under the order's row guard.
    /// Fails with `Conflict` for every caller but the first.
    async fn accept_order(&self, order_id: Uuid, courier_id: Uuid, now: DateTime<Utc>) -> StoreResult<Order>;

    /// Applies a legal status change. When `actor` is set it must be the
    /// bound courier. Frees the courier on `Delivered` and `Cancelled`, and
    /// retires the queue entry on `Cancelled`.
    async fn advance_order(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> StoreResult<Transition>;

    async fn queue_entry(&self, order_id: Uuid) -> StoreResult<Option<DispatchQueueEntry>>;
    /// Active, unexpired entries, oldest first.
    async fn open_entries(&self, now: DateTime<Utc>) -> StoreResult<Vec<DispatchQueueEntry>>;
    /// Candidates only; other couriers get `NotFound`. A retired entry is
    /// returned unchanged.
    async fn decline(&self, order_id: Uuid, courier_id: Uuid) -> StoreResult<DispatchQueueEntry>;
    /// Same rules as `decline`.
    async fn mark_seen(&self, order_id: Uuid, courier_id: Uuid) -> StoreResult<DispatchQueueEntry>;
    /// Ids of active entries whose window has passed.
    async fn expired_entries(&self, now: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;
    /// Retires an expired entry and, if the order is still pending, moves it
    /// to `NoCouriersAvailable`. Returns the order only when it transitioned.
    async fn expire_order(&self, order_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Order>>;

    /// Unique on order id. Returns `None` when a row for the order exists.
    async fn insert_earning(&self, earning: Earning) -> StoreResult<Option<Earning>>;
    /// Rows created within `[start, end]`, newest first.
    async fn earnings_for(
        &self,
        courier_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Earning>>;

    async fn insert_notification(&self, notification: Notification) -> StoreResult<Notification>;
    async fn notifications(&self, user_id: Uuid, unread_only: bool, page: Page) -> StoreResult<Vec<Notification>>;
    async fn mark_notification_read(&self, user_id: Uuid, id: Uuid, now: DateTime<Utc>) -> StoreResult<Notification>;
    async fn mark_all_notifications_read(&self, user_id: Uuid, now: DateTime<Utc>) -> StoreResult<usize>;

    async fn counts(&self) -> StoreResult<StoreCounts>;
}

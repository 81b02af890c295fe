pub mod earnings;
pub mod ledger;
pub mod queue;

use std::future::Future;
use std::sync::Arc;

use tracing::warn;

use crate::clock::Clock;
use crate::config::DispatchSettings;
use crate::error::AppError;
use crate::geo::locator::Locator;
use crate::models::notification::Notification;
use crate::notify::Fanout;
use crate::observability::metrics::Metrics;
use crate::store::DispatchStore;

use self::earnings::EarningsLedger;
use self::ledger::OrderLedger;
use self::queue::DispatchQueue;

/// Runs a store operation, retrying exactly once if it fails transiently.
pub async fn retry_once<T, F, Fut>(operation: &'static str, mut attempt: F) -> Result<T, AppError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
{
    match attempt().await {
        Err(err) if err.is_transient() => {
            warn!(operation, error = %err, "transient store failure, retrying once");
            attempt().await
        }
        other => other,
    }
}

/// Stores an inbox row. Losing one is logged, never propagated.
pub(crate) async fn record_notification(store: &dyn DispatchStore, notification: Notification) {
    let user_id = notification.user_id;
    let kind = notification.kind;
    if let Err(err) = retry_once("insert_notification", || store.insert_notification(notification.clone())).await {
        warn!(user_id = %user_id, kind = ?kind, error = %err, "failed to store notification");
    }
}

/// The dispatch components wired to one store, fanout and clock.
#[derive(Clone)]
pub struct Engine {
    pub ledger: OrderLedger,
    pub queue: DispatchQueue,
    pub earnings: EarningsLedger,
    pub locator: Locator,
}

impl Engine {
    pub fn new(
        store: Arc<dyn DispatchStore>,
        fanout: Arc<dyn Fanout>,
        clock: Arc<dyn Clock>,
        metrics: Metrics,
        settings: DispatchSettings,
    ) -> Self {
        let locator = Locator::new(store.clone(), settings.nearby_limit);
        let earnings = EarningsLedger::new(store.clone(), clock.clone(), metrics.clone());
        let queue = DispatchQueue::new(
            store.clone(),
            fanout.clone(),
            clock.clone(),
            metrics.clone(),
            settings.clone(),
        );
        let ledger = OrderLedger::new(
            store,
            fanout,
            clock,
            metrics,
            settings,
            locator.clone(),
            queue.clone(),
            earnings.clone(),
        );

        Self {
            ledger,
            queue,
            earnings,
            locator,
        }
    }
}

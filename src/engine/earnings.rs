use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::engine::retry_once;
use crate::error::AppError;
use crate::models::earning::{DailyEarnings, Earning, EarningsSummary};
use crate::observability::metrics::Metrics;
use crate::store::DispatchStore;

/// Lookback used when a summary request names no start.
pub const DEFAULT_SUMMARY_DAYS: i64 = 30;

/// Commission and net payout for a gross amount, in cents.
pub fn split(gross: Decimal, rate: Decimal) -> (Decimal, Decimal) {
    let commission = (gross * rate).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    (commission, gross - commission)
}

#[derive(Clone)]
pub struct EarningsLedger {
    store: Arc<dyn DispatchStore>,
    clock: Arc<dyn Clock>,
    metrics: Metrics,
}

impl EarningsLedger {
    pub fn new(store: Arc<dyn DispatchStore>, clock: Arc<dyn Clock>, metrics: Metrics) -> Self {
        Self { store, clock, metrics }
    }

    /// Records the payout for a delivered order. Returns `None` when the
    /// order was already settled.
    pub async fn settle(
        &self,
        order_id: Uuid,
        courier_id: Uuid,
        gross: Decimal,
        rate: Decimal,
    ) -> Result<Option<Earning>, AppError> {
        if rate < Decimal::ZERO || rate > Decimal::ONE {
            return Err(AppError::Validation(format!("commission rate {rate} outside [0, 1]")));
        }
        if gross < Decimal::ZERO {
            return Err(AppError::Validation(format!("gross amount {gross} is negative")));
        }

        let (commission_amount, net_amount) = split(gross, rate);
        let earning = Earning {
            id: Uuid::new_v4(),
            order_id,
            courier_id,
            gross_amount: gross,
            commission_rate: rate,
            commission_amount,
            net_amount,
            created_at: self.clock.now(),
        };

        let inserted = retry_once("insert_earning", || self.store.insert_earning(earning.clone())).await?;
        match &inserted {
            Some(row) => {
                self.metrics.settlements_total.with_label_values(&["settled"]).inc();
                info!(
                    order_id = %order_id,
                    courier_id = %courier_id,
                    gross = %row.gross_amount,
                    net = %row.net_amount,
                    "earning settled"
                );
            }
            None => {
                self.metrics.settlements_total.with_label_values(&["duplicate"]).inc();
                warn!(order_id = %order_id, "order already settled, skipping");
            }
        }
        Ok(inserted)
    }

    /// Earnings between `start` and `end` inclusive, grouped per day.
    /// Defaults to the last 30 days ending now.
    pub async fn summary(
        &self,
        courier_id: Uuid,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<EarningsSummary, AppError> {
        let end = end.unwrap_or_else(|| self.clock.now());
        let start = start.unwrap_or(end - Duration::days(DEFAULT_SUMMARY_DAYS));
        if start > end {
            return Err(AppError::Validation(format!("start {start} is after end {end}")));
        }

        let earnings = self.store.earnings_for(courier_id, start, end).await?;
        let daily = group_by_day(&earnings)?;
        let total_net = daily
            .iter()
            .try_fold(Decimal::ZERO, |acc, day| acc.checked_add(day.total_net))
            .ok_or_else(|| AppError::Internal(format!("earnings total overflow for courier {courier_id}")))?;

        Ok(EarningsSummary {
            courier_id,
            start,
            end,
            total_net,
            deliveries: earnings.len(),
            daily,
            earnings,
        })
    }
}

/// Rows must arrive newest first; days come out in the same order.
fn group_by_day(earnings: &[Earning]) -> Result<Vec<DailyEarnings>, AppError> {
    let mut daily: Vec<DailyEarnings> = Vec::new();
    for earning in earnings {
        let date = earning.created_at.date_naive();
        match daily.last_mut() {
            Some(day) if day.date == date => {
                day.total_net = day
                    .total_net
                    .checked_add(earning.net_amount)
                    .ok_or_else(|| AppError::Internal(format!("earnings total overflow on {date}")))?;
                day.deliveries += 1;
            }
            _ => daily.push(DailyEarnings {
                date,
                total_net: earning.net_amount,
                deliveries: 1,
            }),
        }
    }
    Ok(daily)
}

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Courier payout for one delivered order. Written once, never updated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Earning {
    pub id: Uuid,
    pub order_id: Uuid,
    pub courier_id: Uuid,
    pub gross_amount: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub net_amount: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Net payout and delivery count for one UTC calendar day.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DailyEarnings {
    pub date: NaiveDate,
    pub total_net: Decimal,
    pub deliveries: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct EarningsSummary {
    pub courier_id: Uuid,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_net: Decimal,
    pub deliveries: usize,
    /// Newest day first.
    pub daily: Vec<DailyEarnings>,
    pub earnings: Vec<Earning>,
}

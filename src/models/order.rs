use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;

/// Order lifecycle. Declaration order is the forward delivery path; the
/// three failure states sit after it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    AcceptedByDriver,
    OrderingAtRestaurant,
    OrderReady,
    PickedUp,
    OnTheWay,
    Arrived,
    Delivered,
    Cancelled,
    NoCouriersAvailable,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::AcceptedByDriver => "accepted_by_driver",
            OrderStatus::OrderingAtRestaurant => "ordering_at_restaurant",
            OrderStatus::OrderReady => "order_ready",
            OrderStatus::PickedUp => "picked_up",
            OrderStatus::OnTheWay => "on_the_way",
            OrderStatus::Arrived => "arrived",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::NoCouriersAvailable => "no_couriers_available",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::NoCouriersAvailable
        )
    }

    /// The single forward step on the delivery path, if any.
    pub fn next(self) -> Option<OrderStatus> {
        match self {
            OrderStatus::Pending => Some(OrderStatus::AcceptedByDriver),
            OrderStatus::AcceptedByDriver => Some(OrderStatus::OrderingAtRestaurant),
            OrderStatus::OrderingAtRestaurant => Some(OrderStatus::OrderReady),
            OrderStatus::OrderReady => Some(OrderStatus::PickedUp),
            OrderStatus::PickedUp => Some(OrderStatus::OnTheWay),
            OrderStatus::OnTheWay => Some(OrderStatus::Arrived),
            OrderStatus::Arrived => Some(OrderStatus::Delivered),
            OrderStatus::Delivered | OrderStatus::Cancelled | OrderStatus::NoCouriersAvailable => {
                None
            }
        }
    }

    /// Statuses a courier may request through a status update. The rest are
    /// owned by creation, acceptance and the expiry sweep.
    pub fn is_courier_settable(self) -> bool {
        !matches!(
            self,
            OrderStatus::Pending | OrderStatus::AcceptedByDriver | OrderStatus::NoCouriersAvailable
        )
    }

    pub fn can_transition_to(self, target: OrderStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        match target {
            OrderStatus::Cancelled => true,
            OrderStatus::NoCouriersAvailable => self == OrderStatus::Pending,
            _ => self.next() == Some(target),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub menu_item_id: Uuid,
    pub quantity: u32,
    pub unit_price: Decimal,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub allergen_notes: Option<String>,
}

impl LineItem {
    pub fn line_total(&self) -> Result<Decimal, AppError> {
        self.unit_price
            .checked_mul(Decimal::from(self.quantity))
            .ok_or_else(amount_overflow)
    }
}

fn amount_overflow() -> AppError {
    AppError::Validation("amount overflow".to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryAddress {
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub location: Option<GeoPoint>,
}

/// Monetary breakdown of an order. `total` is computed once here and never
/// touched again.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OrderAmounts {
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax: Decimal,
    pub tip: Decimal,
    pub total: Decimal,
}

impl OrderAmounts {
    pub fn new(subtotal: Decimal, delivery_fee: Decimal, tax: Decimal, tip: Decimal) -> Result<Self, AppError> {
        for (name, value) in [
            ("subtotal", subtotal),
            ("delivery_fee", delivery_fee),
            ("tax", tax),
            ("tip", tip),
        ] {
            if value < Decimal::ZERO {
                return Err(AppError::Validation(format!("{name} cannot be negative")));
            }
        }

        let total = [delivery_fee, tax, tip]
            .into_iter()
            .try_fold(subtotal, |acc, value| acc.checked_add(value))
            .ok_or_else(amount_overflow)?;

        Ok(Self {
            subtotal,
            delivery_fee,
            tax,
            tip,
            total,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusTimestamps {
    pub accepted_at: Option<DateTime<Utc>>,
    pub restaurant_notified_at: Option<DateTime<Utc>>,
    pub ready_for_pickup_at: Option<DateTime<Utc>>,
    pub picked_up_at: Option<DateTime<Utc>>,
    pub on_the_way_at: Option<DateTime<Utc>>,
    pub arrived_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
}

impl StatusTimestamps {
    pub fn stamp(&mut self, status: OrderStatus, at: DateTime<Utc>) {
        let slot = match status {
            OrderStatus::Pending => return,
            OrderStatus::AcceptedByDriver => &mut self.accepted_at,
            OrderStatus::OrderingAtRestaurant => &mut self.restaurant_notified_at,
            OrderStatus::OrderReady => &mut self.ready_for_pickup_at,
            OrderStatus::PickedUp => &mut self.picked_up_at,
            OrderStatus::OnTheWay => &mut self.on_the_way_at,
            OrderStatus::Arrived => &mut self.arrived_at,
            OrderStatus::Delivered => &mut self.delivered_at,
            OrderStatus::Cancelled => &mut self.cancelled_at,
            OrderStatus::NoCouriersAvailable => &mut self.expired_at,
        };
        *slot = Some(at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    pub special_instructions: Option<String>,
    pub delivery_instructions: Option<String>,
    pub amounts: OrderAmounts,
    pub status: OrderStatus,
    pub courier_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub timestamps: StatusTimestamps,
}

impl Order {
    /// Moves the order to `target`, stamping the matching timestamp.
    pub fn transition(&mut self, target: OrderStatus, now: DateTime<Utc>) -> Result<(), AppError> {
        if !self.status.can_transition_to(target) {
            return Err(AppError::Conflict(format!(
                "order {} cannot move from {} to {}",
                self.id, self.status, target
            )));
        }
        self.status = target;
        self.timestamps.stamp(target, now);
        self.updated_at = now;
        Ok(())
    }

    pub fn is_bound_to(&self, courier_id: Uuid) -> bool {
        self.courier_id == Some(courier_id)
    }
}

/// What a customer submits to place an order. Line-item prices come from
/// the catalog and are trusted; the sums are not.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub restaurant_id: Uuid,
    pub items: Vec<LineItem>,
    pub delivery_address: DeliveryAddress,
    #[serde(default)]
    pub special_instructions: Option<String>,
    #[serde(default)]
    pub delivery_instructions: Option<String>,
    pub subtotal: Decimal,
    pub delivery_fee: Decimal,
    pub tax: Decimal,
    #[serde(default)]
    pub tip: Decimal,
    /// Optional client-side total, checked against the computed one.
    #[serde(default)]
    pub total: Option<Decimal>,
}

impl OrderDraft {
    pub fn validate(&self) -> Result<OrderAmounts, AppError> {
        if self.items.is_empty() {
            return Err(AppError::Validation("order must contain at least one item".to_string()));
        }
        for item in &self.items {
            if item.quantity == 0 {
                return Err(AppError::Validation(format!(
                    "item {} has zero quantity",
                    item.menu_item_id
                )));
            }
            if item.unit_price < Decimal::ZERO {
                return Err(AppError::Validation(format!(
                    "item {} has a negative price",
                    item.menu_item_id
                )));
            }
        }
        if self.delivery_address.line1.trim().is_empty() || self.delivery_address.city.trim().is_empty() {
            return Err(AppError::Validation("delivery address is incomplete".to_string()));
        }
        if let Some(location) = self.delivery_address.location {
            if !location.is_valid() {
                return Err(AppError::Validation("delivery location is out of range".to_string()));
            }
        }

        let items_total = self.items.iter().try_fold(Decimal::ZERO, |acc, item| {
            acc.checked_add(item.line_total()?).ok_or_else(amount_overflow)
        })?;
        if items_total != self.subtotal {
            return Err(AppError::Validation(format!(
                "subtotal {} does not match line items {}",
                self.subtotal, items_total
            )));
        }

        let amounts = OrderAmounts::new(self.subtotal, self.delivery_fee, self.tax, self.tip)?;
        if let Some(claimed) = self.total {
            if claimed != amounts.total {
                return Err(AppError::Validation(format!(
                    "total {} does not equal subtotal + delivery_fee + tax + tip = {}",
                    claimed, amounts.total
                )));
            }
        }
        Ok(amounts)
    }
}

/// Body of an order status update.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StatusUpdate {
    pub status: OrderStatus,
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use uuid::Uuid;

    use super::{DeliveryAddress, LineItem, OrderAmounts, OrderDraft, OrderStatus, StatusTimestamps};
    use crate::error::AppError;

    fn draft() -> OrderDraft {
        OrderDraft {
            restaurant_id: Uuid::from_u128(1),
            items: vec![
                LineItem {
                    menu_item_id: Uuid::from_u128(10),
                    quantity: 2,
                    unit_price: dec!(7.50),
                    special_instructions: Some("no onions".into()),
                    allergen_notes: None,
                },
                LineItem {
                    menu_item_id: Uuid::from_u128(11),
                    quantity: 1,
                    unit_price: dec!(5.00),
                    special_instructions: None,
                    allergen_notes: None,
                },
            ],
            delivery_address: DeliveryAddress {
                line1: "Unter den Linden 1".into(),
                line2: None,
                city: "Berlin".into(),
                postal_code: Some("10117".into()),
                location: None,
            },
            special_instructions: None,
            delivery_instructions: None,
            subtotal: dec!(20.00),
            delivery_fee: dec!(3.00),
            tax: dec!(1.50),
            tip: dec!(2.00),
            total: None,
        }
    }

    #[test]
    fn valid_draft_yields_summed_total() {
        let amounts = draft().validate().unwrap();
        assert_eq!(amounts.total, dec!(26.50));

        let mut with_total = draft();
        with_total.total = Some(dec!(26.50));
        assert!(with_total.validate().is_ok());
    }

    #[test]
    fn mismatched_total_is_rejected() {
        let mut bad = draft();
        bad.total = Some(dec!(30.00));
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn subtotal_must_match_line_items() {
        let mut bad = draft();
        bad.subtotal = dec!(19.00);
        assert!(matches!(bad.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn empty_or_zero_quantity_items_are_rejected() {
        let mut empty = draft();
        empty.items.clear();
        assert!(empty.validate().is_err());

        let mut zero = draft();
        zero.items[0].quantity = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn overflowing_amounts_are_rejected() {
        let mut huge = draft();
        huge.items.truncate(1);
        huge.items[0].unit_price = Decimal::MAX;
        huge.subtotal = Decimal::MAX;
        assert!(matches!(huge.validate(), Err(AppError::Validation(msg)) if msg == "amount overflow"));

        let mut two_lines = draft();
        two_lines.items[0].quantity = 1;
        two_lines.items[0].unit_price = Decimal::MAX;
        assert!(matches!(two_lines.validate(), Err(AppError::Validation(_))));

        assert!(matches!(
            OrderAmounts::new(Decimal::MAX, dec!(1), dec!(0), dec!(0)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn total_is_sum_of_components() {
        let amounts = OrderAmounts::new(dec!(20.00), dec!(3.00), dec!(1.50), dec!(2.00)).unwrap();
        assert_eq!(amounts.total, dec!(26.50));
    }

    #[test]
    fn negative_amounts_are_rejected() {
        assert!(OrderAmounts::new(dec!(20.00), dec!(-1.00), dec!(0), dec!(0)).is_err());
        assert!(OrderAmounts::new(dec!(0), dec!(0), dec!(0), dec!(0)).is_ok());
    }

    #[test]
    fn forward_path_moves_one_step_at_a_time() {
        let path = [
            OrderStatus::Pending,
            OrderStatus::AcceptedByDriver,
            OrderStatus::OrderingAtRestaurant,
            OrderStatus::OrderReady,
            OrderStatus::PickedUp,
            OrderStatus::OnTheWay,
            OrderStatus::Arrived,
            OrderStatus::Delivered,
        ];

        for window in path.windows(2) {
            assert!(window[0].can_transition_to(window[1]));
        }
        assert!(!OrderStatus::AcceptedByDriver.can_transition_to(OrderStatus::PickedUp));
        assert!(!OrderStatus::OnTheWay.can_transition_to(OrderStatus::OrderReady));
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::NoCouriersAvailable,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(OrderStatus::Cancelled));
            assert!(!terminal.can_transition_to(OrderStatus::Pending));
        }
    }

    #[test]
    fn only_pending_orders_can_expire() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::NoCouriersAvailable));
        assert!(!OrderStatus::AcceptedByDriver.can_transition_to(OrderStatus::NoCouriersAvailable));
    }

    #[test]
    fn cancellation_allowed_from_any_open_state() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Arrived.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn stamping_fills_the_matching_column() {
        let now = Utc::now();
        let mut stamps = StatusTimestamps::default();
        stamps.stamp(OrderStatus::OrderReady, now);
        stamps.stamp(OrderStatus::NoCouriersAvailable, now);
        assert_eq!(stamps.ready_for_pickup_at, Some(now));
        assert_eq!(stamps.expired_at, Some(now));
        assert!(stamps.picked_up_at.is_none());
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::NoCouriersAvailable).unwrap();
        assert_eq!(json, "\"no_couriers_available\"");
        assert_eq!(OrderStatus::AcceptedByDriver.to_string(), "accepted_by_driver");
    }
}

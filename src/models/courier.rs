use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::geo::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Offline,
    Available,
    Busy,
    OnDelivery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub name: String,
    pub location: GeoPoint,
    pub status: CourierStatus,
    pub is_available: bool,
    pub total_deliveries: u64,
    pub total_earnings: Decimal,
    pub rating: f64,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    pub fn new(id: Uuid, name: String, location: GeoPoint, rating: f64, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            location,
            status: CourierStatus::Offline,
            is_available: false,
            total_deliveries: 0,
            total_earnings: Decimal::ZERO,
            rating: rating.clamp(0.0, 5.0),
            updated_at: now,
        }
    }

    /// The only way to change `status`; keeps `is_available` in step with it.
    pub fn set_status(&mut self, status: CourierStatus, now: DateTime<Utc>) {
        self.status = status;
        self.is_available = status == CourierStatus::Available;
        self.updated_at = now;
    }

    pub fn can_take_offer(&self) -> bool {
        self.status == CourierStatus::Available && self.is_available
    }

    /// Applies a self-service update. Couriers toggle between available and
    /// offline; busy and on-delivery are reached only through dispatch.
    pub fn apply(&mut self, update: &CourierUpdate, now: DateTime<Utc>) -> Result<(), AppError> {
        if let Some(location) = update.location {
            if !location.is_valid() {
                return Err(AppError::Validation(format!(
                    "invalid location lat={} lng={}",
                    location.lat, location.lng
                )));
            }
        }

        if let Some(status) = update.status {
            if !matches!(status, CourierStatus::Available | CourierStatus::Offline) {
                return Err(AppError::Validation(
                    "couriers can only switch between available and offline".to_string(),
                ));
            }
            if matches!(self.status, CourierStatus::Busy | CourierStatus::OnDelivery) {
                return Err(AppError::Conflict(format!(
                    "courier {} has an active delivery",
                    self.id
                )));
            }
            self.set_status(status, now);
        }

        if let Some(location) = update.location {
            self.location = location;
        }
        self.updated_at = now;
        Ok(())
    }
}

/// Every field a caller may change on a courier profile.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourierUpdate {
    pub status: Option<CourierStatus>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourierStats {
    pub courier_id: Uuid,
    pub status: CourierStatus,
    pub is_available: bool,
    pub total_deliveries: u64,
    pub total_earnings: Decimal,
    pub rating: f64,
}

impl From<&Courier> for CourierStats {
    fn from(courier: &Courier) -> Self {
        Self {
            courier_id: courier.id,
            status: courier.status,
            is_available: courier.is_available,
            total_deliveries: courier.total_deliveries,
            total_earnings: courier.total_earnings,
            rating: courier.rating,
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::{Courier, CourierStatus, CourierUpdate};
    use crate::error::AppError;
    use crate::geo::GeoPoint;

    #[test]
    fn availability_flag_tracks_status() {
        let now = Utc::now();
        let mut courier = Courier::new(Uuid::from_u128(1), "Ada".into(), GeoPoint::new(52.5, 13.4), 4.8, now);
        assert!(!courier.is_available);

        for (status, available) in [
            (CourierStatus::Available, true),
            (CourierStatus::Busy, false),
            (CourierStatus::OnDelivery, false),
            (CourierStatus::Offline, false),
            (CourierStatus::Available, true),
        ] {
            courier.set_status(status, now);
            assert_eq!(courier.is_available, available, "{status:?}");
        }
    }

    #[test]
    fn update_touches_only_supplied_fields() {
        let now = Utc::now();
        let mut courier = Courier::new(Uuid::from_u128(1), "Ada".into(), GeoPoint::new(52.5, 13.4), 9.0, now);
        assert_eq!(courier.rating, 5.0);

        courier
            .apply(
                &CourierUpdate {
                    status: None,
                    location: Some(GeoPoint::new(48.85, 2.35)),
                },
                now,
            )
            .unwrap();
        assert_eq!(courier.location, GeoPoint::new(48.85, 2.35));
        assert_eq!(courier.status, CourierStatus::Offline);
    }

    #[test]
    fn cannot_go_available_mid_delivery() {
        let now = Utc::now();
        let mut courier = Courier::new(Uuid::from_u128(1), "Ada".into(), GeoPoint::new(52.5, 13.4), 4.0, now);
        courier.set_status(CourierStatus::Busy, now);

        let update = CourierUpdate {
            status: Some(CourierStatus::Available),
            location: None,
        };
        assert!(matches!(courier.apply(&update, now), Err(AppError::Conflict(_))));
        assert_eq!(courier.status, CourierStatus::Busy);
    }

    #[test]
    fn dispatch_only_states_are_not_self_service() {
        let now = Utc::now();
        let mut courier = Courier::new(Uuid::from_u128(1), "Ada".into(), GeoPoint::new(52.5, 13.4), 4.0, now);
        let update = CourierUpdate {
            status: Some(CourierStatus::OnDelivery),
            location: None,
        };
        assert!(matches!(courier.apply(&update, now), Err(AppError::Validation(_))));
    }
}

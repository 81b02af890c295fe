use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;

use crate::error::AppError;
use crate::geo::{GeoPoint, haversine_km};
use crate::models::courier::{Courier, CourierStatus};
use crate::store::DispatchStore;

#[derive(Debug, Clone, Serialize)]
pub struct NearbyCourier {
    pub courier: Courier,
    pub distance_km: f64,
}

/// Read-only nearest-courier lookup over a store snapshot.
#[derive(Clone)]
pub struct Locator {
    store: Arc<dyn DispatchStore>,
    limit: usize,
}

impl Locator {
    pub fn new(store: Arc<dyn DispatchStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    pub async fn find_nearby(
        &self,
        point: GeoPoint,
        radius_km: f64,
        status_filter: CourierStatus,
    ) -> Result<Vec<NearbyCourier>, AppError> {
        if !point.is_valid() {
            return Err(AppError::Validation(format!(
                "invalid point lat={} lng={}",
                point.lat, point.lng
            )));
        }
        if !(radius_km.is_finite() && radius_km >= 0.0) {
            return Err(AppError::Validation(format!("invalid radius {radius_km}")));
        }

        let couriers = self.store.couriers().await?;
        Ok(rank_within(couriers, point, radius_km, status_filter, self.limit))
    }
}

/// Filters to `status_filter` within `radius_km`, nearest first, ties by id.
pub fn rank_within(
    couriers: Vec<Courier>,
    point: GeoPoint,
    radius_km: f64,
    status_filter: CourierStatus,
    limit: usize,
) -> Vec<NearbyCourier> {
    let mut nearby: Vec<NearbyCourier> = couriers
        .into_iter()
        .filter(|courier| {
            courier.status == status_filter
                && (status_filter != CourierStatus::Available || courier.is_available)
        })
        .map(|courier| {
            let distance_km = haversine_km(&point, &courier.location);
            NearbyCourier { courier, distance_km }
        })
        .filter(|candidate| candidate.distance_km <= radius_km)
        .collect();

    nearby.sort_by(|a, b| {
        a.distance_km
            .partial_cmp(&b.distance_km)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.courier.id.cmp(&b.courier.id))
    });
    nearby.truncate(limit);
    nearby
}

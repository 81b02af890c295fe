use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::engine::retry_once;
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::geo::locator::NearbyCourier;
use crate::models::courier::{Courier, CourierStats, CourierStatus, CourierUpdate};
use crate::models::dispatch::Offer;
use crate::models::earning::EarningsSummary;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier).get(list_couriers))
        .route("/couriers/nearby", get(nearby_couriers))
        .route("/couriers/me/offers", get(my_offers))
        .route("/couriers/me/earnings", get(my_earnings))
        .route("/couriers/me/stats", get(my_stats))
        .route("/couriers/me/status", patch(update_my_status))
        .route("/couriers/me/location", patch(update_my_location))
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub name: String,
    pub location: GeoPoint,
    pub rating: Option<f64>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CourierStatus,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
    pub order_id: Option<Uuid>,
}

/// Both bounds are RFC 3339 instants. Missing bounds mean the last 30 days.
#[derive(Deserialize)]
pub struct EarningsQuery {
    #[serde(alias = "start_date")]
    pub start: Option<DateTime<Utc>>,
    #[serde(alias = "end_date")]
    pub end: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius_km: Option<f64>,
    pub status: Option<CourierStatus>,
}

/// Registers the calling courier's dispatch profile. New couriers start offline.
async fn create_courier(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<(StatusCode, Json<Courier>), AppError> {
    principal.require(Role::Courier)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if !payload.location.is_valid() {
        return Err(AppError::Validation("location is out of range".to_string()));
    }
    let courier = Courier::new(
        principal.id,
        payload.name,
        payload.location,
        payload.rating.unwrap_or(5.0),
        state.clock.now(),
    );
    let courier = state.store.insert_courier(courier).await?;
    info!(courier_id = %courier.id, "courier registered");
    Ok((StatusCode::CREATED, Json(courier)))
}

async fn list_couriers(State(state): State<Arc<AppState>>, _principal: Principal) -> Result<Json<Vec<Courier>>, AppError> {
    let mut couriers = state.store.couriers().await?;
    couriers.sort_by_key(|courier| courier.id);
    Ok(Json(couriers))
}

async fn nearby_couriers(
    State(state): State<Arc<AppState>>,
    _principal: Principal,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<NearbyCourier>>, AppError> {
    let nearby = state
        .engine
        .locator
        .find_nearby(
            GeoPoint::new(query.lat, query.lng),
            query.radius_km.unwrap_or(state.settings.radius_km),
            query.status.unwrap_or(CourierStatus::Available),
        )
        .await?;
    Ok(Json(nearby))
}

async fn my_offers(State(state): State<Arc<AppState>>, principal: Principal) -> Result<Json<Vec<Offer>>, AppError> {
    principal.require(Role::Courier)?;
    Ok(Json(state.engine.queue.list_available_for(principal.id).await?))
}

async fn my_earnings(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<EarningsQuery>,
) -> Result<Json<EarningsSummary>, AppError> {
    principal.require(Role::Courier)?;
    let summary = state
        .engine
        .earnings
        .summary(principal.id, query.start, query.end)
        .await?;
    Ok(Json(summary))
}

async fn my_stats(State(state): State<Arc<AppState>>, principal: Principal) -> Result<Json<CourierStats>, AppError> {
    principal.require(Role::Courier)?;
    let courier = state
        .store
        .courier(principal.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("courier {} not found", principal.id)))?;
    Ok(Json(CourierStats::from(&courier)))
}

async fn update_my_status(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Courier>, AppError> {
    principal.require(Role::Courier)?;
    let update = CourierUpdate {
        status: Some(payload.status),
        location: None,
    };
    let now = state.clock.now();
    let courier = retry_once("update_courier", || {
        state.store.update_courier(principal.id, update.clone(), now)
    })
    .await?;
    info!(courier_id = %courier.id, status = ?courier.status, "courier status changed");
    Ok(Json(courier))
}

async fn update_my_location(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Courier>, AppError> {
    principal.require(Role::Courier)?;
    let courier = state
        .engine
        .ledger
        .relay_location(principal.id, payload.location, payload.order_id)
        .await?;
    Ok(Json(courier))
}

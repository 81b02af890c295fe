use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::error::AppError;
use crate::geo::GeoPoint;
use crate::models::restaurant::Restaurant;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/restaurants", post(register_restaurant))
}

#[derive(Deserialize)]
pub struct RegisterRestaurantRequest {
    /// Catalog id; generated when the catalog has not assigned one yet.
    pub id: Option<Uuid>,
    pub name: String,
    pub location: GeoPoint,
}

/// Mirrors a catalog restaurant so dispatch can locate it. The caller
/// becomes its manager.
async fn register_restaurant(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(payload): Json<RegisterRestaurantRequest>,
) -> Result<(StatusCode, Json<Restaurant>), AppError> {
    principal.require(Role::RestaurantStaff)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    if !payload.location.is_valid() {
        return Err(AppError::Validation("location is out of range".to_string()));
    }

    let restaurant = state
        .store
        .register_restaurant(Restaurant {
            id: payload.id.unwrap_or_else(Uuid::new_v4),
            name: payload.name,
            location: payload.location,
            manager_id: principal.id,
        })
        .await?;
    info!(restaurant_id = %restaurant.id, manager_id = %principal.id, "restaurant registered");
    Ok((StatusCode::CREATED, Json(restaurant)))
}

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{Principal, Role};
use crate::error::AppError;
use crate::models::dispatch::QueueMembership;
use crate::models::order::{Order, OrderDraft, OrderStatus, StatusUpdate};
use crate::state::AppState;
use crate::store::Page;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/decline", post(decline_order))
        .route("/orders/:id/seen", post(mark_seen))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/status", patch(update_status))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<OrderStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(draft): Json<OrderDraft>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    principal.require(Role::Customer)?;
    let order = state.engine.ledger.create(principal.id, draft).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

async fn list_orders(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, AppError> {
    let page = Page::new(query.page, query.limit);
    let orders = state.engine.ledger.list_for(&principal, query.status, page).await?;
    Ok(Json(orders))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.ledger.get(id, &principal).await?))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    principal.require(Role::Courier)?;
    Ok(Json(state.engine.ledger.accept(id, principal.id).await?))
}

async fn decline_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueMembership>, AppError> {
    principal.require(Role::Courier)?;
    Ok(Json(state.engine.ledger.decline(id, principal.id).await?))
}

async fn mark_seen(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<QueueMembership>, AppError> {
    principal.require(Role::Courier)?;
    Ok(Json(state.engine.queue.mark_seen(id, principal.id).await?))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.engine.ledger.cancel(id, &principal).await?))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
    Json(payload): Json<StatusUpdate>,
) -> Result<Json<Order>, AppError> {
    principal.require(Role::Courier)?;
    let order = state
        .engine
        .ledger
        .update_status(id, payload.status, Some(principal.id))
        .await?;
    Ok(Json(order))
}

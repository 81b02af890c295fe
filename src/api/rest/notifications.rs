use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::routing::{get, patch};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Principal;
use crate::error::AppError;
use crate::models::notification::Notification;
use crate::state::AppState;
use crate::store::Page;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/notifications", get(list_notifications).patch(mark_all_read))
        .route("/notifications/:id", patch(mark_read))
}

#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Serialize)]
pub struct MarkAllResponse {
    pub updated: usize,
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let rows = state
        .store
        .notifications(principal.id, query.unread_only, Page::new(query.page, query.limit))
        .await?;
    Ok(Json(rows))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, AppError> {
    let notification = state
        .store
        .mark_notification_read(principal.id, id, state.clock.now())
        .await?;
    Ok(Json(notification))
}

async fn mark_all_read(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<MarkAllResponse>, AppError> {
    let updated = state
        .store
        .mark_all_notifications_read(principal.id, state.clock.now())
        .await?;
    Ok(Json(MarkAllResponse { updated }))
}

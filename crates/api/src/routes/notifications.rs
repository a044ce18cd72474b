//! Users and their notification inboxes.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{NotificationId, UserId};
use serde::{Deserialize, Serialize};
use store::{NewUser, Notification, Store, User};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct InboxParams {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct InboxResponse {
    pub notifications: Vec<Notification>,
    pub unread_count: u64,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// POST /users
#[tracing::instrument(skip(state, req))]
pub async fn create_user<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    if req.name.trim().is_empty() || req.email.trim().is_empty() {
        return Err(ApiError::BadRequest("name and email are required".to_string()));
    }
    let user = state.store.create_user(req).await?;
    tracing::info!(user_id = %user.id, role = user.role.as_str(), "user created");
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /users/{id}/notifications
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
    Query(params): Query<InboxParams>,
) -> Result<Json<InboxResponse>, ApiError> {
    if state.store.find_user(user_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("User {user_id} not found")));
    }

    let notifier = state.orders.notifier();
    let notifications = notifier
        .notifications_for(user_id, params.unread_only)
        .await?;
    let unread_count = notifier.unread_count(user_id).await?;
    Ok(Json(InboxResponse {
        notifications,
        unread_count,
    }))
}

/// POST /users/{id}/notifications/read
#[tracing::instrument(skip(state))]
pub async fn mark_all_read<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<MarkAllReadResponse>, ApiError> {
    let updated = state.orders.notifier().mark_all_read(user_id).await?;
    Ok(Json(MarkAllReadResponse { updated }))
}

/// POST /notifications/{id}/read
#[tracing::instrument(skip(state))]
pub async fn mark_read<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<NotificationId>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(state.orders.notifier().mark_read(id).await?))
}

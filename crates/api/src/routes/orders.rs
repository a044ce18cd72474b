//! Order administration endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use serde::Deserialize;
use store::{DeliveryMethod, Order, OrderQuery, OrderStatus, PaymentStatus, Store};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub delivery_method: Option<DeliveryMethod>,
    pub user_id: Option<UserId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl From<OrderListParams> for OrderQuery {
    fn from(params: OrderListParams) -> Self {
        OrderQuery {
            status: params.status,
            payment_status: params.payment_status,
            delivery_method: params.delivery_method,
            user_id: params.user_id,
            from: params.from,
            to: params.to,
            limit: params.limit,
            offset: params.offset,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePaymentRequest {
    pub payment_status: PaymentStatus,
}

/// GET /orders: newest first, filtered by the query string.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<OrderListParams>,
) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(state.orders.list_orders(params.into()).await?))
}

/// GET /orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.get_order(id).await?))
}

/// GET /orders/by-number/{number}
#[tracing::instrument(skip(state))]
pub async fn get_by_number<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(number): Path<String>,
) -> Result<Json<Order>, ApiError> {
    state
        .orders
        .find_by_number(&number)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Order {number} not found")))
}

/// PATCH /orders/{id}/status
#[tracing::instrument(skip(state))]
pub async fn update_status<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(state.orders.update_status(id, req.status).await?))
}

/// PATCH /orders/{id}/payment
#[tracing::instrument(skip(state))]
pub async fn update_payment<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<OrderId>,
    Json(req): Json<UpdatePaymentRequest>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(
        state
            .orders
            .update_payment_status(id, req.payment_status)
            .await?,
    ))
}

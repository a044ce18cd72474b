//! Session cart and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{ProductId, SessionId};
use domain::{CartSummary, CheckoutForm};
use serde::Deserialize;
use store::{Order, Store};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: u32,
}

fn one() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: u32,
}

/// GET /cart/{session}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(session): Path<SessionId>,
) -> Result<Json<CartSummary>, ApiError> {
    let summary = state.carts.for_session(session).summary().await?;
    Ok(Json(summary))
}

/// POST /cart/{session}/items
#[tracing::instrument(skip(state))]
pub async fn add<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(session): Path<SessionId>,
    Json(req): Json<AddItemRequest>,
) -> Result<Json<CartSummary>, ApiError> {
    let cart = state.carts.for_session(session);
    cart.add(req.product_id, req.quantity).await?;
    Ok(Json(cart.summary().await?))
}

/// PUT /cart/{session}/items/{product_id}
///
/// A quantity of zero removes the line.
#[tracing::instrument(skip(state))]
pub async fn update<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path((session, product_id)): Path<(SessionId, ProductId)>,
    Json(req): Json<UpdateItemRequest>,
) -> Result<Json<CartSummary>, ApiError> {
    let cart = state.carts.for_session(session);
    cart.update(product_id, req.quantity).await?;
    Ok(Json(cart.summary().await?))
}

/// DELETE /cart/{session}/items/{product_id}
#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path((session, product_id)): Path<(SessionId, ProductId)>,
) -> Result<Json<CartSummary>, ApiError> {
    let cart = state.carts.for_session(session);
    cart.remove(product_id).await?;
    Ok(Json(cart.summary().await?))
}

/// DELETE /cart/{session}
#[tracing::instrument(skip(state))]
pub async fn clear<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(session): Path<SessionId>,
) -> Result<StatusCode, ApiError> {
    state.carts.for_session(session).clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /cart/{session}/checkout
///
/// Places an order from the session's cart and empties the cart once the
/// order is committed.
#[tracing::instrument(skip(state, form))]
pub async fn checkout<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(session): Path<SessionId>,
    Json(form): Json<CheckoutForm>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let cart = state.carts.for_session(session);
    let lines = cart.snapshot().await?;

    let order = state
        .orders
        .create_order(form, &lines)
        .await
        .map_err(ApiError::Checkout)?;

    if let Err(e) = cart.clear().await {
        tracing::warn!(order_number = %order.order_number, error = %e, "could not clear cart");
    }

    Ok((StatusCode::CREATED, Json(order)))
}

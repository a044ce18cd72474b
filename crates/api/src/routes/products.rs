//! Catalog endpoints: products and categories.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CategoryId, Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{
    Category, NewCategory, NewProduct, Product, ProductChanges, ProductQuery, StockStatus, Store,
};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    pub stock_status: Option<StockStatus>,
    /// Admin listings pass `true` to see inactive products too.
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ProductListParams {
    fn into_query(self) -> ProductQuery {
        let mut query = if self.include_inactive {
            ProductQuery::new()
        } else {
            ProductQuery::storefront()
        };
        if let Some(category_id) = self.category_id {
            query = query.category(category_id);
        }
        if let Some(term) = self.search.filter(|t| !t.trim().is_empty()) {
            query = query.search(term);
        }
        if let Some(status) = self.stock_status {
            query = query.stock_status(status);
        }
        if let Some(limit) = self.limit {
            query = query.limit(limit);
        }
        if let Some(offset) = self.offset {
            query = query.offset(offset);
        }
        query
    }
}

/// A product with its effective selling price.
#[derive(Serialize)]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub final_price: Money,
    pub is_discounted: bool,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            final_price: product.final_price(),
            is_discounted: product.is_discounted(),
            product,
        }
    }
}

/// GET /products
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ProductListParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.store.list_products(params.into_query()).await?;
    Ok(Json(products.into_iter().map(ProductResponse::from).collect()))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ProductId>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product = state
        .store
        .find_product(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Product {id} not found")))?;
    Ok(Json(product.into()))
}

/// Rejects amounts the catalog tables refuse.
fn check_amounts(
    price: Option<Money>,
    discount_price: Option<Money>,
    discount_percentage: Option<u8>,
    stock_quantity: Option<i32>,
) -> Result<(), ApiError> {
    if price.is_some_and(|p| p.is_negative()) {
        return Err(ApiError::BadRequest("price must not be negative".to_string()));
    }
    if discount_price.is_some_and(|p| p.is_negative()) {
        return Err(ApiError::BadRequest(
            "discount_price must not be negative".to_string(),
        ));
    }
    if discount_percentage.is_some_and(|p| p > 100) {
        return Err(ApiError::BadRequest(
            "discount_percentage must be between 0 and 100".to_string(),
        ));
    }
    if stock_quantity.is_some_and(|q| q < 0) {
        return Err(ApiError::BadRequest(
            "stock_quantity must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// POST /products
#[tracing::instrument(skip(state, req), fields(sku = %req.sku))]
pub async fn create<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<NewProduct>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    if req.name.trim().is_empty() || req.sku.trim().is_empty() {
        return Err(ApiError::BadRequest("name and sku are required".to_string()));
    }
    check_amounts(
        Some(req.price),
        req.discount_price,
        req.discount_percentage,
        Some(req.stock_quantity),
    )?;

    let product = state.store.create_product(req).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PATCH /products/{id}
#[tracing::instrument(skip(state, changes))]
pub async fn update<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ProductId>,
    Json(changes): Json<ProductChanges>,
) -> Result<Json<ProductResponse>, ApiError> {
    if changes.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::BadRequest("name must not be empty".to_string()));
    }
    check_amounts(
        changes.price,
        changes.discount_price.flatten(),
        changes.discount_percentage.flatten(),
        changes.stock_quantity,
    )?;
    let product = state.store.update_product(id, changes).await?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode, ApiError> {
    state.store.delete_product(id).await?;
    tracing::info!(product_id = %id, "product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /categories
#[tracing::instrument(skip(state))]
pub async fn list_categories<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.store.list_categories().await?))
}

/// POST /categories
#[tracing::instrument(skip(state, req))]
pub async fn create_category<S: Store + Clone>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<NewCategory>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    if req.name.trim().is_empty() {
        return Err(ApiError::BadRequest("name is required".to_string()));
    }
    let category = state.store.create_category(req).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

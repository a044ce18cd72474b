//! HTTP API server with observability for the storefront backend.
//!
//! Provides REST endpoints for the catalog, session carts, checkout, order
//! administration and admin notifications, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use domain::{CartService, OrderService};
use metrics_exporter_prometheus::PrometheusHandle;
use store::Store;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S> {
    pub store: S,
    pub carts: CartService<S>,
    pub orders: OrderService<S>,
}

impl<S> AppState<S>
where
    S: Store + Clone,
{
    /// Wires the services over one store using the configured settings.
    pub fn new(store: S, config: &Config) -> Arc<Self> {
        Arc::new(Self {
            carts: CartService::new(store.clone(), config.cart_settings()),
            orders: OrderService::new(store.clone(), config.checkout_settings()),
            store,
        })
    }
}

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: Store + Clone>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/products",
            get(routes::products::list::<S>).post(routes::products::create::<S>),
        )
        .route(
            "/products/{id}",
            get(routes::products::get::<S>)
                .patch(routes::products::update::<S>)
                .delete(routes::products::delete::<S>),
        )
        .route(
            "/categories",
            get(routes::products::list_categories::<S>)
                .post(routes::products::create_category::<S>),
        )
        .route(
            "/cart/{session}",
            get(routes::cart::get::<S>).delete(routes::cart::clear::<S>),
        )
        .route("/cart/{session}/items", post(routes::cart::add::<S>))
        .route(
            "/cart/{session}/items/{product_id}",
            put(routes::cart::update::<S>).delete(routes::cart::remove::<S>),
        )
        .route("/cart/{session}/checkout", post(routes::cart::checkout::<S>))
        .route("/orders", get(routes::orders::list::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route(
            "/orders/by-number/{number}",
            get(routes::orders::get_by_number::<S>),
        )
        .route(
            "/orders/{id}/status",
            patch(routes::orders::update_status::<S>),
        )
        .route(
            "/orders/{id}/payment",
            patch(routes::orders::update_payment::<S>),
        )
        .route("/users", post(routes::notifications::create_user::<S>))
        .route(
            "/users/{id}/notifications",
            get(routes::notifications::list::<S>),
        )
        .route(
            "/users/{id}/notifications/read",
            post(routes::notifications::mark_all_read::<S>),
        )
        .route(
            "/notifications/{id}/read",
            post(routes::notifications::mark_read::<S>),
        )
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

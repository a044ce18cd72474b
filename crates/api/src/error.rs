//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{CartError, OrderError};
use notifications::NotifyError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Catalog and other direct store failures.
    Store(StoreError),
    Cart(CartError),
    /// Order administration failure.
    Order(OrderError),
    /// Checkout failure. Persistence errors are reported without detail.
    Checkout(OrderError),
    Notify(NotifyError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Cart(err) => cart_error_to_response(err),
            ApiError::Order(err) => order_error_to_response(err, "internal server error"),
            ApiError::Checkout(err) => order_error_to_response(err, "could not place order"),
            ApiError::Notify(err) => match err {
                NotifyError::NotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
                NotifyError::Store(err) => store_error_to_response(err),
            },
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        e if e.is_not_found() => (StatusCode::NOT_FOUND, err.to_string()),
        e if e.is_duplicate() => (StatusCode::CONFLICT, err.to_string()),
        StoreError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
        _ => internal(&err, "internal server error"),
    }
}

fn cart_error_to_response(err: CartError) -> (StatusCode, String) {
    match &err {
        CartError::InvalidQuantity { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        CartError::ProductNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        CartError::InsufficientStock { .. } => (StatusCode::CONFLICT, err.to_string()),
        CartError::Store(_) => internal(&err, "internal server error"),
    }
}

fn order_error_to_response(err: OrderError, generic: &str) -> (StatusCode, String) {
    match &err {
        OrderError::EmptyCart => (StatusCode::BAD_REQUEST, err.to_string()),
        OrderError::InvalidForm { .. } => (StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
        OrderError::ProductNotFound(_) | OrderError::OrderNotFound(_) => {
            (StatusCode::NOT_FOUND, err.to_string())
        }
        OrderError::InsufficientStock { .. } | OrderError::InvalidStatusTransition { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        OrderError::Store(_) => internal(&err, generic),
    }
}

fn internal(err: &dyn std::error::Error, message: &str) -> (StatusCode, String) {
    tracing::error!(error = %err, "internal server error");
    (StatusCode::INTERNAL_SERVER_ERROR, message.to_string())
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}

impl From<CartError> for ApiError {
    fn from(err: CartError) -> Self {
        ApiError::Cart(err)
    }
}

impl From<OrderError> for ApiError {
    fn from(err: OrderError) -> Self {
        ApiError::Order(err)
    }
}

impl From<NotifyError> for ApiError {
    fn from(err: NotifyError) -> Self {
        ApiError::Notify(err)
    }
}

#[cfg(test)]
mod tests {
    use common::{OrderId, ProductId};
    use store::OrderStatus;

    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_order_errors_map_to_statuses() {
        assert_eq!(
            status_of(ApiError::Order(OrderError::OrderNotFound(OrderId::new(1)))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Order(OrderError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Pending,
            })),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Checkout(OrderError::EmptyCart)),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(ApiError::Checkout(OrderError::InvalidForm {
                field: "customer_name",
                reason: "is required",
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_store_errors_map_to_statuses() {
        assert_eq!(
            status_of(ApiError::Store(StoreError::ProductNotFound(ProductId::new(3)))),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::Store(StoreError::DuplicateSku("A-1".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Store(StoreError::DuplicateSlug("lamps".into()))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Notify(NotifyError::Store(StoreError::DuplicateEmail(
                "ana@example.com".into()
            )))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(ApiError::Checkout(OrderError::Store(StoreError::Corrupt(
                "bad row".into()
            )))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}

//! Order placement and administration.

mod form;
mod number;
mod service;

pub use form::{CheckoutForm, PICKUP_ADDRESS};
pub use number::format_order_number;
pub use service::{CheckoutSettings, OrderService};

use common::{OrderId, ProductId};
use store::{OrderStatus, StoreError};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Checkout was attempted with nothing in the cart.
    #[error("Cart is empty")]
    EmptyCart,

    /// A checkout form field is missing or malformed.
    #[error("Invalid {field}: {reason}")]
    InvalidForm {
        field: &'static str,
        reason: &'static str,
    },

    /// A cart line names a product that no longer exists or is no longer sold.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// Current stock doesn't cover the requested quantity.
    #[error("Insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: i32,
    },

    /// The order's status can't move to the requested one.
    #[error("Invalid status transition: cannot move from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<StoreError> for OrderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::ProductNotFound(id) => OrderError::ProductNotFound(id),
            StoreError::OrderNotFound(id) => OrderError::OrderNotFound(id),
            StoreError::InsufficientStock {
                product_id,
                product_name,
                requested,
                available,
            } => OrderError::InsufficientStock {
                product_id,
                product_name,
                requested,
                available,
            },
            other => OrderError::Store(other),
        }
    }
}

impl OrderError {
    /// Short label used for the failure metric.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::EmptyCart => "empty_cart",
            OrderError::InvalidForm { .. } => "invalid_form",
            OrderError::ProductNotFound(_) => "product_not_found",
            OrderError::InsufficientStock { .. } => "insufficient_stock",
            OrderError::InvalidStatusTransition { .. } => "invalid_transition",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::Store(_) => "store",
        }
    }
}

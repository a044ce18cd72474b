//! Session-scoped shopping cart.

mod service;
mod summary;

pub use service::{Cart, CartService};
pub use summary::{CartLine, CartSettings, CartSnapshotLine, CartSummary};

use common::ProductId;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// Quantity must be at least one.
    #[error("Invalid quantity: {quantity} (must be greater than 0)")]
    InvalidQuantity { quantity: u32 },

    /// The product doesn't exist or is no longer sold.
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The cart would hold more units than are in stock.
    #[error("Insufficient stock for {product_name}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: i32,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

use common::{CategoryId, OrderId, ProductId, UserId};
use thiserror::Error;

/// Errors that can occur when reading or writing storefront records.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("User not found: {0}")]
    UserNotFound(UserId),

    #[error("Category not found: {0}")]
    CategoryNotFound(CategoryId),

    /// A stock decrement would take the quantity below zero.
    #[error(
        "Insufficient stock for {product_name}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        product_name: String,
        requested: u32,
        available: i32,
    },

    /// Another order already holds this order number.
    #[error("Order number already taken: {0}")]
    OrderNumberConflict(String),

    #[error("SKU already in use: {0}")]
    DuplicateSku(String),

    #[error("Category slug already in use: {0}")]
    DuplicateSlug(String),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    /// The recipient refused the notification write.
    #[error("Notification rejected for user {0}")]
    NotificationRejected(UserId),

    /// A stored value could not be mapped back to its domain type.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether the error names a record that does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::ProductNotFound(_)
                | StoreError::OrderNotFound(_)
                | StoreError::UserNotFound(_)
                | StoreError::CategoryNotFound(_)
        )
    }

    /// Whether the error is a uniqueness violation on a natural key.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateSku(_)
                | StoreError::DuplicateSlug(_)
                | StoreError::DuplicateEmail(_)
                | StoreError::OrderNumberConflict(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

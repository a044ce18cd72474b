use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use common::{NotificationId, OrderId, ProductId, SessionId, UserId};

use crate::{
    Category, NewCategory, NewNotification, NewOrder, NewProduct, NewUser, Notification, Order,
    OrderQuery, OrderStatus, PaymentStatus, Product, ProductChanges, ProductQuery, Result,
    StockStatus, User,
};

/// Quantities held in one shopper's cart, keyed by product.
pub type CartContents = BTreeMap<ProductId, u32>;

/// Catalog reads and administrative edits.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>>;

    /// Loads several products at once. Missing ids are skipped.
    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>>;

    /// Lists products matching a query, ordered by id.
    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>>;

    /// Creates a product. Fails with `DuplicateSku` if the SKU is taken.
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// Applies a partial edit. The stock status follows any stock change.
    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> Result<Product>;

    /// Removes a product. Order lines that referenced it keep their snapshot
    /// and lose the product link.
    async fn delete_product(&self, id: ProductId) -> Result<()>;

    async fn list_categories(&self) -> Result<Vec<Category>>;

    /// Creates a category. Fails with `DuplicateSlug` if another category
    /// already has the derived slug.
    async fn create_category(&self, category: NewCategory) -> Result<Category>;
}

/// Order reads and updates that don't touch stock.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>>;

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>>;

    /// Lists orders matching a query, newest first.
    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>>;

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order>;
}

/// Per-user notification inbox.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Stores a notification for an existing user.
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification>;

    /// Notifications addressed to a user, newest first.
    async fn notifications_for(&self, user_id: UserId, unread_only: bool)
    -> Result<Vec<Notification>>;

    /// Marks one notification read. Returns `None` if it doesn't exist.
    async fn mark_read(&self, id: NotificationId) -> Result<Option<Notification>>;

    /// Marks every notification of a user read. Returns how many changed.
    async fn mark_all_read(&self, user_id: UserId) -> Result<u64>;

    async fn unread_count(&self, user_id: UserId) -> Result<u64>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Registers a user. Fails with `DuplicateEmail` if the email is taken.
    async fn create_user(&self, user: NewUser) -> Result<User>;

    /// Users whose role receives store-wide alerts.
    async fn admins(&self) -> Result<Vec<User>>;
}

/// Server-side cart storage keyed by shopper session.
#[async_trait]
pub trait CartSessionStore: Send + Sync {
    /// Returns the cart for a session, empty if none was saved.
    async fn load_cart(&self, session: &SessionId) -> Result<CartContents>;

    /// Replaces the stored cart for a session.
    async fn save_cart(&self, session: &SessionId, contents: CartContents) -> Result<()>;

    async fn clear_cart(&self, session: &SessionId) -> Result<()>;
}

/// A unit of work over stock and orders.
///
/// Everything done through a unit of work becomes visible atomically on
/// `commit`. Dropping it without committing discards every change. Product
/// and order locks are held until the unit of work ends, so two units of
/// work touching the same product are serialized.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Loads a product and locks it against concurrent stock changes.
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Removes stock. Fails with `InsufficientStock` rather than going below
    /// zero. Returns the new quantity.
    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<i32>;

    /// Returns stock. Returns the new quantity.
    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<i32>;

    /// Recomputes the stock status label from the current quantity.
    async fn update_stock_status(&mut self, id: ProductId) -> Result<StockStatus>;

    /// Draws the next order sequence number for a calendar day, starting at 1.
    async fn next_order_sequence(&mut self, day: NaiveDate) -> Result<u32>;

    /// Inserts an order and its items.
    ///
    /// Fails with `OrderNumberConflict` if the number is already taken. The
    /// unit of work stays usable after that failure.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    /// Loads an order and locks it against concurrent status changes.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order>;

    /// Makes every change visible.
    async fn commit(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// Everything the storefront needs from a backend.
pub trait Store:
    CatalogStore
    + OrderStore
    + NotificationStore
    + UserDirectory
    + CartSessionStore
    + TransactionalStore
    + 'static
{
}

impl<T> Store for T where
    T: CatalogStore
        + OrderStore
        + NotificationStore
        + UserDirectory
        + CartSessionStore
        + TransactionalStore
        + 'static
{
}

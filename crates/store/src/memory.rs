use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use common::{CategoryId, NotificationId, OrderId, ProductId, SessionId, UserId};
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};

use crate::{
    CartContents, CartSessionStore, CatalogStore, Category, NewCategory, NewNotification, NewOrder,
    NewProduct, NewUser, Notification, NotificationStore, Order, OrderQuery, OrderStatus,
    OrderStore, PaymentStatus, Product, ProductChanges, ProductQuery, Result, StockStatus,
    StoreError, TransactionalStore, UnitOfWork, User, UserDirectory,
};

/// Records that change together under a unit of work.
#[derive(Debug, Default)]
struct MemoryState {
    products: BTreeMap<ProductId, Product>,
    categories: BTreeMap<CategoryId, Category>,
    orders: BTreeMap<OrderId, Order>,
    order_sequences: HashMap<NaiveDate, u32>,
    next_product_id: i64,
    next_category_id: i64,
    next_order_id: i64,
    next_item_id: i64,
}

impl MemoryState {
    fn allocate_product_id(&mut self) -> ProductId {
        self.next_product_id += 1;
        ProductId::new(self.next_product_id)
    }

    fn allocate_category_id(&mut self) -> CategoryId {
        self.next_category_id += 1;
        CategoryId::new(self.next_category_id)
    }

    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product> {
        self.products
            .get_mut(&id)
            .ok_or(StoreError::ProductNotFound(id))
    }
}

#[derive(Debug, Default)]
struct Inbox {
    notifications: Vec<Notification>,
    users: BTreeMap<UserId, User>,
    next_user_id: i64,
    rejecting: HashSet<UserId>,
}

/// In-memory storefront backend.
///
/// Provides the same behavior as the PostgreSQL backend. A unit of work
/// holds the write lock for its whole lifetime, which serializes checkouts.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    inbox: Arc<RwLock<Inbox>>,
    carts: Arc<RwLock<HashMap<SessionId, CartContents>>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes notification writes for this user fail, for exercising
    /// delivery failures.
    pub async fn set_reject_notifications_for(&self, user_id: UserId) {
        self.inbox.write().await.rejecting.insert(user_id);
    }

    /// Returns the total number of stored orders.
    pub async fn order_count(&self) -> usize {
        self.state.read().await.orders.len()
    }

    /// Returns the total number of stored notifications.
    pub async fn notification_count(&self) -> usize {
        self.inbox.read().await.notifications.len()
    }
}

#[async_trait]
impl CatalogStore for InMemoryStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let state = self.state.read().await;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        Ok(state
            .products
            .values()
            .filter(|p| !query.active_only || p.is_active)
            .filter(|p| query.category_id.is_none() || p.category_id == query.category_id)
            .filter(|p| query.stock_status.is_none_or(|s| p.stock_status == s))
            .filter(|p| query.matches_search(&p.name, &p.sku))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let mut state = self.state.write().await;
        if state.products.values().any(|p| p.sku == product.sku) {
            return Err(StoreError::DuplicateSku(product.sku));
        }
        if let Some(category_id) = product.category_id
            && !state.categories.contains_key(&category_id)
        {
            return Err(StoreError::CategoryNotFound(category_id));
        }

        let id = state.allocate_product_id();
        let product = product.into_product(id, Utc::now());
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> Result<Product> {
        let mut state = self.state.write().await;
        if let Some(Some(category_id)) = changes.category_id
            && !state.categories.contains_key(&category_id)
        {
            return Err(StoreError::CategoryNotFound(category_id));
        }

        let product = state.product_mut(id)?;
        changes.apply(product, Utc::now());
        Ok(product.clone())
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut state = self.state.write().await;
        state
            .products
            .remove(&id)
            .ok_or(StoreError::ProductNotFound(id))?;

        for order in state.orders.values_mut() {
            for item in order.items.iter_mut() {
                if item.product_id == Some(id) {
                    item.product_id = None;
                }
            }
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let state = self.state.read().await;
        let mut categories: Vec<Category> = state.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let mut state = self.state.write().await;
        if let Some(parent_id) = category.parent_id
            && !state.categories.contains_key(&parent_id)
        {
            return Err(StoreError::CategoryNotFound(parent_id));
        }
        let slug = category.slug();
        if state.categories.values().any(|c| c.slug == slug) {
            return Err(StoreError::DuplicateSlug(slug));
        }

        let id = state.allocate_category_id();
        let category = Category {
            id,
            slug,
            name: category.name,
            parent_id: category.parent_id,
            created_at: Utc::now(),
        };
        state.categories.insert(id, category.clone());
        Ok(category)
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .find(|o| o.order_number == order_number)
            .cloned())
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let offset = query.offset.unwrap_or(0);
        let limit = query.limit.unwrap_or(usize::MAX);

        // Ids grow with insertion, so reverse id order is newest first.
        Ok(state
            .orders
            .values()
            .rev()
            .filter(|o| query.status.is_none_or(|s| o.status == s))
            .filter(|o| query.payment_status.is_none_or(|s| o.payment_status == s))
            .filter(|o| query.delivery_method.is_none_or(|m| o.delivery_method == m))
            .filter(|o| query.user_id.is_none() || o.user_id == query.user_id)
            .filter(|o| query.from.is_none_or(|from| o.created_at >= from))
            .filter(|o| query.to.is_none_or(|to| o.created_at <= to))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        order.payment_status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let mut inbox = self.inbox.write().await;
        let user_id = notification.user_id;
        if !inbox.users.contains_key(&user_id) {
            return Err(StoreError::UserNotFound(user_id));
        }
        if inbox.rejecting.contains(&user_id) {
            return Err(StoreError::NotificationRejected(user_id));
        }

        let notification = notification.into_notification(NotificationId::new(), Utc::now());
        inbox.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn notifications_for(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let inbox = self.inbox.read().await;
        Ok(inbox
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id && (!unread_only || !n.is_read))
            .cloned()
            .collect())
    }

    async fn mark_read(&self, id: NotificationId) -> Result<Option<Notification>> {
        let mut inbox = self.inbox.write().await;
        Ok(inbox
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .map(|n| {
                n.is_read = true;
                n.clone()
            }))
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64> {
        let mut inbox = self.inbox.write().await;
        let mut changed = 0;
        for n in inbox
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id && !n.is_read)
        {
            n.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn unread_count(&self, user_id: UserId) -> Result<u64> {
        let inbox = self.inbox.read().await;
        Ok(inbox
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id && !n.is_read)
            .count() as u64)
    }
}

#[async_trait]
impl UserDirectory for InMemoryStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.inbox.read().await.users.get(&id).cloned())
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let mut inbox = self.inbox.write().await;
        if inbox.users.values().any(|u| u.email == user.email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        inbox.next_user_id += 1;
        let id = UserId::new(inbox.next_user_id);
        let user = user.into_user(id, Utc::now());
        inbox.users.insert(id, user.clone());
        Ok(user)
    }

    async fn admins(&self) -> Result<Vec<User>> {
        let inbox = self.inbox.read().await;
        Ok(inbox
            .users
            .values()
            .filter(|u| u.role.receives_admin_notifications())
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CartSessionStore for InMemoryStore {
    async fn load_cart(&self, session: &SessionId) -> Result<CartContents> {
        Ok(self
            .carts
            .read()
            .await
            .get(session)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_cart(&self, session: &SessionId, contents: CartContents) -> Result<()> {
        let mut carts = self.carts.write().await;
        if contents.is_empty() {
            carts.remove(session);
        } else {
            carts.insert(session.clone(), contents);
        }
        Ok(())
    }

    async fn clear_cart(&self, session: &SessionId) -> Result<()> {
        self.carts.write().await.remove(session);
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().write_owned().await;
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            undo: Vec::new(),
        }))
    }
}

/// Prior value of a row touched by a unit of work.
enum Undo {
    Product(Product),
    Order(Order),
    InsertedOrder {
        id: OrderId,
        next_order_id: i64,
        next_item_id: i64,
    },
    Sequence(NaiveDate, Option<u32>),
}

/// Writes in place while holding the write lock, logging the prior value of
/// every touched row. Commit clears the log; dropping replays it in reverse.
struct MemoryUnitOfWork {
    guard: OwnedRwLockWriteGuard<MemoryState>,
    undo: Vec<Undo>,
}

impl MemoryUnitOfWork {
    fn touch_product(&mut self, id: ProductId) -> Result<&mut Product> {
        let product = self.guard.product_mut(id)?;
        self.undo.push(Undo::Product(product.clone()));
        Ok(product)
    }
}

impl Drop for MemoryUnitOfWork {
    fn drop(&mut self) {
        if !self.undo.is_empty() {
            tracing::debug!(entries = self.undo.len(), "rolling back unit of work");
        }
        let state = &mut *self.guard;
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Product(product) => {
                    state.products.insert(product.id, product);
                }
                Undo::Order(order) => {
                    state.orders.insert(order.id, order);
                }
                Undo::InsertedOrder {
                    id,
                    next_order_id,
                    next_item_id,
                } => {
                    state.orders.remove(&id);
                    state.next_order_id = next_order_id;
                    state.next_item_id = next_item_id;
                }
                Undo::Sequence(day, Some(previous)) => {
                    state.order_sequences.insert(day, previous);
                }
                Undo::Sequence(day, None) => {
                    state.order_sequences.remove(&day);
                }
            }
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.guard.products.get(&id).cloned())
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<i32> {
        let product = self.touch_product(id)?;
        let requested = i64::from(quantity);
        if i64::from(product.stock_quantity) < requested {
            return Err(StoreError::InsufficientStock {
                product_id: id,
                product_name: product.name.clone(),
                requested: quantity,
                available: product.stock_quantity,
            });
        }
        // Fits in i32 since it is no larger than the current quantity.
        product.stock_quantity -= requested as i32;
        product.updated_at = Utc::now();
        Ok(product.stock_quantity)
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<i32> {
        let added = i32::try_from(quantity)
            .map_err(|_| StoreError::Corrupt(format!("stock increment {quantity} too large")))?;
        let product = self.touch_product(id)?;
        product.stock_quantity = product.stock_quantity.saturating_add(added);
        product.updated_at = Utc::now();
        Ok(product.stock_quantity)
    }

    async fn update_stock_status(&mut self, id: ProductId) -> Result<StockStatus> {
        let product = self.touch_product(id)?;
        product.stock_status = StockStatus::for_quantity(product.stock_quantity);
        Ok(product.stock_status)
    }

    async fn next_order_sequence(&mut self, day: NaiveDate) -> Result<u32> {
        let previous = self.guard.order_sequences.get(&day).copied();
        self.undo.push(Undo::Sequence(day, previous));
        let next = previous.unwrap_or(0) + 1;
        self.guard.order_sequences.insert(day, next);
        Ok(next)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let state = &mut *self.guard;
        if state
            .orders
            .values()
            .any(|o| o.order_number == order.order_number)
        {
            tracing::debug!(order_number = %order.order_number, "order number already taken");
            return Err(StoreError::OrderNumberConflict(order.order_number));
        }
        for item in &order.items {
            if !state.products.contains_key(&item.product_id) {
                return Err(StoreError::ProductNotFound(item.product_id));
            }
        }

        let next_order_id = state.next_order_id;
        let next_item_id = state.next_item_id;
        state.next_order_id += 1;
        let id = OrderId::new(state.next_order_id);
        let first_item_id = state.next_item_id + 1;
        state.next_item_id += order.items.len() as i64;

        let order = order.into_order(id, first_item_id, Utc::now());
        state.orders.insert(id, order.clone());
        self.undo.push(Undo::InsertedOrder {
            id,
            next_order_id,
            next_item_id,
        });
        Ok(order)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.guard.orders.get(&id).cloned())
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let order = self
            .guard
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;
        self.undo.push(Undo::Order(order.clone()));
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut uow = self;
        uow.undo.clear();
        Ok(())
    }
}

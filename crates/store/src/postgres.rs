use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use common::{CategoryId, Money, NotificationId, OrderId, ProductId, SessionId, UserId};
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::{
    CartContents, CartSessionStore, CatalogStore, Category, NewCategory, NewNotification, NewOrder,
    NewProduct, NewUser, Notification, NotificationStore, Order, OrderItem, OrderQuery,
    OrderStatus, OrderStore, OrderTotals, PaymentStatus, Product, ProductChanges, ProductQuery,
    Result, Role, ShippingAddress, StockStatus, StoreError, TransactionalStore, UnitOfWork, User,
    UserDirectory,
};

const PRODUCT_COLUMNS: &str = "id, category_id, name, sku, description, price, discount_price, \
     discount_percentage, stock_quantity, stock_status, is_active, created_at, updated_at";

const ORDER_COLUMNS: &str = "id, order_number, user_id, status, payment_status, payment_method, \
     delivery_method, subtotal, shipping_cost, tax, discount, total, customer_name, \
     customer_email, customer_phone, shipping_address, shipping_city, shipping_region, \
     shipping_neighborhood, shipping_postal_code, notes, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "id, user_id, title, message, type, data, is_read, created_at";

/// PostgreSQL-backed storefront store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Name of the violated constraint, if the error is a constraint violation.
fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) => db_err.constraint(),
        _ => None,
    }
}

fn corrupt(what: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what} out of range: {value}"))
}

fn row_to_product(row: &PgRow) -> Result<Product> {
    let discount_percentage = row
        .try_get::<Option<i16>, _>("discount_percentage")?
        .map(|p| u8::try_from(p).map_err(|_| corrupt("discount_percentage", p)))
        .transpose()?;

    Ok(Product {
        id: ProductId::new(row.try_get("id")?),
        category_id: row
            .try_get::<Option<i64>, _>("category_id")?
            .map(CategoryId::new),
        name: row.try_get("name")?,
        sku: row.try_get("sku")?,
        description: row.try_get("description")?,
        price: Money::from_cents(row.try_get("price")?),
        discount_price: row
            .try_get::<Option<i64>, _>("discount_price")?
            .map(Money::from_cents),
        discount_percentage,
        stock_quantity: row.try_get("stock_quantity")?,
        stock_status: row.try_get::<String, _>("stock_status")?.parse()?,
        is_active: row.try_get("is_active")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_category(row: &PgRow) -> Result<Category> {
    Ok(Category {
        id: CategoryId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        parent_id: row
            .try_get::<Option<i64>, _>("parent_id")?
            .map(CategoryId::new),
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_order_item(row: &PgRow) -> Result<OrderItem> {
    let quantity: i32 = row.try_get("quantity")?;
    Ok(OrderItem {
        id: row.try_get("id")?,
        order_id: OrderId::new(row.try_get("order_id")?),
        product_id: row
            .try_get::<Option<i64>, _>("product_id")?
            .map(ProductId::new),
        product_name: row.try_get("product_name")?,
        sku: row.try_get("sku")?,
        price: Money::from_cents(row.try_get("price")?),
        quantity: u32::try_from(quantity).map_err(|_| corrupt("quantity", quantity))?,
        subtotal: Money::from_cents(row.try_get("subtotal")?),
    })
}

fn row_to_order(row: &PgRow, items: Vec<OrderItem>) -> Result<Order> {
    Ok(Order {
        id: OrderId::new(row.try_get("id")?),
        order_number: row.try_get("order_number")?,
        user_id: row.try_get::<Option<i64>, _>("user_id")?.map(UserId::new),
        status: row.try_get::<String, _>("status")?.parse()?,
        payment_status: row.try_get::<String, _>("payment_status")?.parse()?,
        payment_method: row.try_get("payment_method")?,
        delivery_method: row.try_get::<String, _>("delivery_method")?.parse()?,
        totals: OrderTotals {
            subtotal: Money::from_cents(row.try_get("subtotal")?),
            shipping: Money::from_cents(row.try_get("shipping_cost")?),
            tax: Money::from_cents(row.try_get("tax")?),
            discount: Money::from_cents(row.try_get("discount")?),
            total: Money::from_cents(row.try_get("total")?),
        },
        customer_name: row.try_get("customer_name")?,
        customer_email: row.try_get("customer_email")?,
        customer_phone: row.try_get("customer_phone")?,
        shipping_address: ShippingAddress {
            address: row.try_get("shipping_address")?,
            city: row.try_get("shipping_city")?,
            region: row.try_get("shipping_region")?,
            neighborhood: row.try_get("shipping_neighborhood")?,
            postal_code: row.try_get("shipping_postal_code")?,
        },
        notes: row.try_get("notes")?,
        items,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_notification(row: &PgRow) -> Result<Notification> {
    Ok(Notification {
        id: NotificationId::from_uuid(row.try_get::<Uuid, _>("id")?),
        user_id: UserId::new(row.try_get("user_id")?),
        title: row.try_get("title")?,
        message: row.try_get("message")?,
        kind: row.try_get::<String, _>("type")?.parse()?,
        data: row.try_get("data")?,
        is_read: row.try_get("is_read")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_user(row: &PgRow) -> Result<User> {
    Ok(User {
        id: UserId::new(row.try_get("id")?),
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        role: row.try_get::<String, _>("role")?.parse()?,
        created_at: row.try_get("created_at")?,
    })
}

/// Loads the items of several orders, grouped by order id.
async fn fetch_items(
    conn: &mut PgConnection,
    order_ids: &[i64],
) -> Result<HashMap<i64, Vec<OrderItem>>> {
    let rows = sqlx::query(
        r#"
        SELECT id, order_id, product_id, product_name, sku, price, quantity, subtotal
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY id ASC
        "#,
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?;

    let mut grouped: HashMap<i64, Vec<OrderItem>> = HashMap::new();
    for row in &rows {
        let item = row_to_order_item(row)?;
        grouped.entry(item.order_id.get()).or_default().push(item);
    }
    Ok(grouped)
}

/// Maps order rows to orders, attaching their items.
async fn hydrate_orders(conn: &mut PgConnection, rows: Vec<PgRow>) -> Result<Vec<Order>> {
    let ids = rows
        .iter()
        .map(|row| row.try_get::<i64, _>("id"))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let mut items = fetch_items(conn, &ids).await?;

    rows.iter()
        .zip(ids)
        .map(|(row, id)| row_to_order(row, items.remove(&id).unwrap_or_default()))
        .collect()
}

async fn fetch_order(
    conn: &mut PgConnection,
    id: OrderId,
    for_update: bool,
) -> Result<Option<Order>> {
    let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    if for_update {
        sql.push_str(" FOR UPDATE");
    }

    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        Some(row) => Ok(hydrate_orders(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

async fn fetch_product(
    conn: &mut PgConnection,
    id: ProductId,
    for_update: bool,
) -> Result<Option<Product>> {
    let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    if for_update {
        sql.push_str(" FOR UPDATE");
    }

    let row = sqlx::query(&sql)
        .bind(id.get())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(row_to_product).transpose()
}

#[async_trait]
impl CatalogStore for PostgresStore {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_product(&mut conn, id, false).await
    }

    async fn find_products(&self, ids: &[ProductId]) -> Result<Vec<Product>> {
        let raw: Vec<i64> = ids.iter().map(ProductId::get).collect();
        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY id ASC"
        ))
        .bind(raw)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_product).collect()
    }

    async fn list_products(&self, query: ProductQuery) -> Result<Vec<Product>> {
        let mut sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE 1=1");
        let mut param_count = 0;

        if query.active_only {
            sql.push_str(" AND is_active = TRUE");
        }
        if query.category_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND category_id = ${param_count}"));
        }
        if query.search.is_some() {
            param_count += 1;
            sql.push_str(&format!(
                " AND (name ILIKE ${param_count} OR sku ILIKE ${param_count})"
            ));
        }
        if query.stock_status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND stock_status = ${param_count}"));
        }

        sql.push_str(" ORDER BY id ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(category_id) = query.category_id {
            sqlx_query = sqlx_query.bind(category_id.get());
        }
        if let Some(term) = &query.search {
            sqlx_query = sqlx_query.bind(format!("%{term}%"));
        }
        if let Some(status) = query.stock_status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_product).collect()
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let category_id = product.category_id;
        let mut product = product.into_product(ProductId::new(0), Utc::now());

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (category_id, name, sku, description, price, discount_price,
                discount_percentage, stock_quantity, stock_status, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)
            RETURNING id
            "#,
        )
        .bind(product.category_id.map(|c| c.get()))
        .bind(&product.name)
        .bind(&product.sku)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.discount_price.map(|m| m.cents()))
        .bind(product.discount_percentage.map(i16::from))
        .bind(product.stock_quantity)
        .bind(product.stock_status.as_str())
        .bind(product.is_active)
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some("products_sku_key") => StoreError::DuplicateSku(product.sku.clone()),
            Some("products_category_id_fkey") => match category_id {
                Some(category_id) => StoreError::CategoryNotFound(category_id),
                None => StoreError::Database(e),
            },
            _ => StoreError::Database(e),
        })?;

        product.id = ProductId::new(id);
        Ok(product)
    }

    async fn update_product(&self, id: ProductId, changes: ProductChanges) -> Result<Product> {
        let mut tx = self.pool.begin().await?;
        let mut product = fetch_product(&mut tx, id, true)
            .await?
            .ok_or(StoreError::ProductNotFound(id))?;
        changes.apply(&mut product, Utc::now());

        sqlx::query(
            r#"
            UPDATE products SET
                category_id = $2, name = $3, description = $4, price = $5,
                discount_price = $6, discount_percentage = $7, stock_quantity = $8,
                stock_status = $9, is_active = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .bind(product.category_id.map(|c| c.get()))
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.cents())
        .bind(product.discount_price.map(|m| m.cents()))
        .bind(product.discount_percentage.map(i16::from))
        .bind(product.stock_quantity)
        .bind(product.stock_status.as_str())
        .bind(product.is_active)
        .bind(product.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match (violated_constraint(&e), product.category_id) {
            (Some("products_category_id_fkey"), Some(category_id)) => {
                StoreError::CategoryNotFound(category_id)
            }
            _ => StoreError::Database(e),
        })?;

        tx.commit().await?;
        Ok(product)
    }

    async fn delete_product(&self, id: ProductId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ProductNotFound(id));
        }
        Ok(())
    }

    async fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query(
            "SELECT id, name, slug, parent_id, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_category).collect()
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let slug = category.slug();
        let row = sqlx::query(
            r#"
            INSERT INTO categories (name, slug, parent_id)
            VALUES ($1, $2, $3)
            RETURNING id, name, slug, parent_id, created_at
            "#,
        )
        .bind(&category.name)
        .bind(&slug)
        .bind(category.parent_id.map(|c| c.get()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match (violated_constraint(&e), category.parent_id) {
            (Some("categories_slug_key"), _) => StoreError::DuplicateSlug(slug.clone()),
            (Some("categories_parent_id_fkey"), Some(parent_id)) => {
                StoreError::CategoryNotFound(parent_id)
            }
            _ => StoreError::Database(e),
        })?;

        row_to_category(&row)
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn find_order(&self, id: OrderId) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut conn, id, false).await
    }

    async fn find_order_by_number(&self, order_number: &str) -> Result<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(order_number)
        .fetch_optional(&mut *conn)
        .await?;

        match row {
            Some(row) => Ok(hydrate_orders(&mut conn, vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>> {
        let mut sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE 1=1");
        let mut param_count = 0;

        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.payment_status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND payment_status = ${param_count}"));
        }
        if query.delivery_method.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND delivery_method = ${param_count}"));
        }
        if query.user_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND user_id = ${param_count}"));
        }
        if query.from.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at >= ${param_count}"));
        }
        if query.to.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND created_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(status) = query.payment_status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(method) = query.delivery_method {
            sqlx_query = sqlx_query.bind(method.as_str());
        }
        if let Some(user_id) = query.user_id {
            sqlx_query = sqlx_query.bind(user_id.get());
        }
        if let Some(from) = query.from {
            sqlx_query = sqlx_query.bind(from);
        }
        if let Some(to) = query.to {
            sqlx_query = sqlx_query.bind(to);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let mut conn = self.pool.acquire().await?;
        let rows = sqlx_query.fetch_all(&mut *conn).await?;
        hydrate_orders(&mut conn, rows).await
    }

    async fn update_payment_status(&self, id: OrderId, status: PaymentStatus) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            "UPDATE orders SET payment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id.get())
        .bind(status.as_str())
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        fetch_order(&mut conn, id, false)
            .await?
            .ok_or(StoreError::OrderNotFound(id))
    }
}

#[async_trait]
impl NotificationStore for PostgresStore {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification> {
        let user_id = notification.user_id;
        let notification = notification.into_notification(NotificationId::new(), Utc::now());

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, title, message, type, data, is_read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(notification.id.as_uuid())
        .bind(user_id.get())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.kind.as_str())
        .bind(&notification.data)
        .bind(notification.is_read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some("notifications_user_id_fkey") => StoreError::UserNotFound(user_id),
            _ => StoreError::Database(e),
        })?;

        Ok(notification)
    }

    async fn notifications_for(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        let mut sql = format!("SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE user_id = $1");
        if unread_only {
            sql.push_str(" AND is_read = FALSE");
        }
        sql.push_str(" ORDER BY created_at DESC");

        let rows = sqlx::query(&sql)
            .bind(user_id.get())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_notification).collect()
    }

    async fn mark_read(&self, id: NotificationId) -> Result<Option<Notification>> {
        let row = sqlx::query(&format!(
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 RETURNING {NOTIFICATION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(row_to_notification).transpose()
    }

    async fn mark_all_read(&self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id.get())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn unread_count(&self, user_id: UserId) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id.get())
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query("SELECT id, name, email, role, created_at FROM users WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_user).transpose()
    }

    async fn create_user(&self, user: NewUser) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email, role)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, role, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match violated_constraint(&e) {
            Some("users_email_key") => StoreError::DuplicateEmail(user.email.clone()),
            _ => StoreError::Database(e),
        })?;
        row_to_user(&row)
    }

    async fn admins(&self) -> Result<Vec<User>> {
        let roles: Vec<String> = [Role::Admin, Role::Staff, Role::Customer]
            .iter()
            .filter(|r| r.receives_admin_notifications())
            .map(|r| r.as_str().to_string())
            .collect();

        let rows = sqlx::query(
            "SELECT id, name, email, role, created_at FROM users WHERE role = ANY($1) ORDER BY id",
        )
        .bind(roles)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_user).collect()
    }
}

#[async_trait]
impl CartSessionStore for PostgresStore {
    async fn load_cart(&self, session: &SessionId) -> Result<CartContents> {
        let rows = sqlx::query("SELECT product_id, quantity FROM cart_items WHERE session_id = $1")
            .bind(session.as_str())
            .fetch_all(&self.pool)
            .await?;

        let mut contents = CartContents::new();
        for row in &rows {
            let quantity: i32 = row.try_get("quantity")?;
            contents.insert(
                ProductId::new(row.try_get("product_id")?),
                u32::try_from(quantity).map_err(|_| corrupt("quantity", quantity))?,
            );
        }
        Ok(contents)
    }

    async fn save_cart(&self, session: &SessionId, contents: CartContents) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(session.as_str())
            .execute(&mut *tx)
            .await?;

        for (product_id, quantity) in contents {
            let quantity = i32::try_from(quantity).map_err(|_| corrupt("quantity", quantity))?;
            sqlx::query(
                "INSERT INTO cart_items (session_id, product_id, quantity) VALUES ($1, $2, $3)",
            )
            .bind(session.as_str())
            .bind(product_id.get())
            .bind(quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn clear_cart(&self, session: &SessionId) -> Result<()> {
        sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
            .bind(session.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// A database transaction. Row locks are taken with `SELECT ... FOR UPDATE`
/// and released on commit or rollback.
struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        fetch_product(&mut self.tx, id, true).await
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: u32) -> Result<i32> {
        let remaining: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity - $2, updated_at = NOW()
            WHERE id = $1 AND stock_quantity >= $2
            RETURNING stock_quantity
            "#,
        )
        .bind(id.get())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        match remaining {
            Some(remaining) => Ok(remaining),
            None => {
                let product = fetch_product(&mut self.tx, id, false)
                    .await?
                    .ok_or(StoreError::ProductNotFound(id))?;
                Err(StoreError::InsufficientStock {
                    product_id: id,
                    product_name: product.name,
                    requested: quantity,
                    available: product.stock_quantity,
                })
            }
        }
    }

    async fn increment_stock(&mut self, id: ProductId, quantity: u32) -> Result<i32> {
        let updated: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET stock_quantity = stock_quantity + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING stock_quantity
            "#,
        )
        .bind(id.get())
        .bind(i64::from(quantity))
        .fetch_optional(&mut *self.tx)
        .await?;

        updated.ok_or(StoreError::ProductNotFound(id))
    }

    async fn update_stock_status(&mut self, id: ProductId) -> Result<StockStatus> {
        let quantity: Option<i32> =
            sqlx::query_scalar("SELECT stock_quantity FROM products WHERE id = $1")
                .bind(id.get())
                .fetch_optional(&mut *self.tx)
                .await?;
        let status = StockStatus::for_quantity(quantity.ok_or(StoreError::ProductNotFound(id))?);

        sqlx::query("UPDATE products SET stock_status = $2 WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(status)
    }

    async fn next_order_sequence(&mut self, day: NaiveDate) -> Result<u32> {
        let value: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO order_sequences (day, last_value)
            VALUES ($1, 1)
            ON CONFLICT (day) DO UPDATE SET last_value = order_sequences.last_value + 1
            RETURNING last_value
            "#,
        )
        .bind(day)
        .fetch_one(&mut *self.tx)
        .await?;

        u32::try_from(value).map_err(|_| corrupt("order sequence", value))
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        // DO NOTHING leaves the transaction usable when the number is taken.
        let inserted: Option<(i64, DateTime<Utc>)> = sqlx::query_as(
            r#"
            INSERT INTO orders (order_number, user_id, status, payment_status, payment_method,
                delivery_method, subtotal, shipping_cost, tax, discount, total, customer_name,
                customer_email, customer_phone, shipping_address, shipping_city, shipping_region,
                shipping_neighborhood, shipping_postal_code, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20)
            ON CONFLICT ON CONSTRAINT orders_order_number_key DO NOTHING
            RETURNING id, created_at
            "#,
        )
        .bind(&order.order_number)
        .bind(order.user_id.map(|u| u.get()))
        .bind(OrderStatus::Pending.as_str())
        .bind(PaymentStatus::Pending.as_str())
        .bind(&order.payment_method)
        .bind(order.delivery_method.as_str())
        .bind(order.totals.subtotal.cents())
        .bind(order.totals.shipping.cents())
        .bind(order.totals.tax.cents())
        .bind(order.totals.discount.cents())
        .bind(order.totals.total.cents())
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(&order.shipping_address.address)
        .bind(&order.shipping_address.city)
        .bind(&order.shipping_address.region)
        .bind(&order.shipping_address.neighborhood)
        .bind(&order.shipping_address.postal_code)
        .bind(&order.notes)
        .fetch_optional(&mut *self.tx)
        .await?;

        let Some((id, created_at)) = inserted else {
            tracing::debug!(order_number = %order.order_number, "order number already taken");
            return Err(StoreError::OrderNumberConflict(order.order_number));
        };

        let mut item_ids = Vec::with_capacity(order.items.len());
        for item in &order.items {
            let quantity = i32::try_from(item.quantity)
                .map_err(|_| corrupt("quantity", item.quantity))?;
            let item_id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO order_items (order_id, product_id, product_name, sku, price, quantity, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id
                "#,
            )
            .bind(id)
            .bind(item.product_id.get())
            .bind(&item.product_name)
            .bind(&item.sku)
            .bind(item.price.cents())
            .bind(quantity)
            .bind(item.subtotal.cents())
            .fetch_one(&mut *self.tx)
            .await?;
            item_ids.push(item_id);
        }

        let mut order = order.into_order(OrderId::new(id), 0, created_at);
        for (item, item_id) in order.items.iter_mut().zip(item_ids) {
            item.id = item_id;
        }
        Ok(order)
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        fetch_order(&mut self.tx, id, true).await
    }

    async fn set_order_status(&mut self, id: OrderId, status: OrderStatus) -> Result<Order> {
        let result = sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(id.get())
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::OrderNotFound(id));
        }
        fetch_order(&mut self.tx, id, false)
            .await?
            .ok_or(StoreError::OrderNotFound(id))
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}

//! Order service: checkout and administrative order changes.

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use common::{Money, OrderId, ProductId};
use notifications::NotificationDispatcher;
use store::{
    DeliveryMethod, NewOrder, NewOrderItem, Order, OrderQuery, OrderStatus, OrderTotals,
    PaymentStatus, Product, Store, StoreError, UnitOfWork,
};

use super::{CheckoutForm, OrderError, format_order_number};
use crate::cart::CartSnapshotLine;

/// Checkout configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSettings {
    /// Shipping charged on delivery orders when the form doesn't name one.
    pub shipping_fee: Money,
    pub order_number_prefix: String,
    /// City stored on pickup orders.
    pub pickup_city: String,
    /// How many order numbers to try before giving up on a checkout.
    pub max_attempts: u32,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            shipping_fee: Money::from_cents(5000),
            order_number_prefix: "ORD".to_string(),
            pickup_city: "Store".to_string(),
            max_attempts: 3,
        }
    }
}

/// Service for placing and administering orders.
///
/// Checkout runs in a single unit of work: products are locked in id order,
/// stock is checked and decremented, and the order with its items is
/// inserted. Nothing is visible until commit. Administrators are notified
/// only after the commit, and notification failures never fail the checkout.
pub struct OrderService<S> {
    store: S,
    notifier: NotificationDispatcher<S>,
    settings: CheckoutSettings,
}

impl<S> OrderService<S>
where
    S: Store + Clone,
{
    /// Creates a new order service over the given store.
    pub fn new(store: S, settings: CheckoutSettings) -> Self {
        Self {
            notifier: NotificationDispatcher::new(store.clone()),
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    /// Returns the dispatcher used for order and stock alerts.
    pub fn notifier(&self) -> &NotificationDispatcher<S> {
        &self.notifier
    }

    /// Turns a cart snapshot and checkout form into a placed order.
    #[tracing::instrument(skip(self, form, cart_items), fields(lines = cart_items.len()))]
    pub async fn create_order(
        &self,
        form: CheckoutForm,
        cart_items: &[CartSnapshotLine],
    ) -> Result<Order, OrderError> {
        let started = Instant::now();
        let result = self.place_order(&form, cart_items).await;
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match result {
            Ok((order, low_stock)) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %order.id,
                    order_number = %order.order_number,
                    total = %order.totals.total,
                    "order placed"
                );
                self.announce(&order, &low_stock).await;
                Ok(order)
            }
            Err(e) => {
                metrics::counter!("orders_failed_total", "reason" => e.reason()).increment(1);
                tracing::warn!(error = %e, "checkout failed");
                Err(e)
            }
        }
    }

    /// Runs the checkout unit of work. Returns the order and the products
    /// whose stock now needs attention.
    async fn place_order(
        &self,
        form: &CheckoutForm,
        cart_items: &[CartSnapshotLine],
    ) -> Result<(Order, Vec<Product>), OrderError> {
        form.validate()?;
        let lines = merge_lines(cart_items)?;

        let mut uow = self.store.begin().await?;

        let mut locked = Vec::with_capacity(lines.len());
        let mut items = Vec::with_capacity(lines.len());
        for (&product_id, &(quantity, subtotal)) in &lines {
            let product = uow
                .lock_product(product_id)
                .await?
                .filter(|p| p.is_active)
                .ok_or(OrderError::ProductNotFound(product_id))?;

            if !product.has_stock_for(quantity) {
                return Err(OrderError::InsufficientStock {
                    product_id,
                    product_name: product.name,
                    requested: quantity,
                    available: product.stock_quantity,
                });
            }

            items.push(NewOrderItem {
                product_id,
                product_name: product.name.clone(),
                sku: product.sku.clone(),
                price: product.final_price(),
                quantity,
                subtotal,
            });
            locked.push(product);
        }

        let totals = self.totals(form, &items)?;
        let new_order = NewOrder {
            order_number: String::new(),
            user_id: form.user_id,
            payment_method: form.payment_method.trim().to_string(),
            delivery_method: form.delivery_method,
            totals,
            customer_name: form.customer_name.trim().to_string(),
            customer_email: form.customer_email.clone(),
            customer_phone: form.customer_phone.trim().to_string(),
            shipping_address: form.resolved_address(&self.settings.pickup_city),
            notes: form.notes.clone(),
            items,
        };
        let order = self.insert_with_fresh_number(uow.as_mut(), new_order).await?;

        let mut low_stock = Vec::new();
        for (mut product, &(quantity, _)) in locked.into_iter().zip(lines.values()) {
            product.stock_quantity = uow.decrement_stock(product.id, quantity).await?;
            product.stock_status = uow.update_stock_status(product.id).await?;
            if product.stock_status.needs_attention() {
                low_stock.push(product);
            }
        }

        uow.commit().await?;
        Ok((order, low_stock))
    }

    fn totals(
        &self,
        form: &CheckoutForm,
        items: &[NewOrderItem],
    ) -> Result<OrderTotals, OrderError> {
        let subtotal = items
            .iter()
            .try_fold(Money::zero(), |acc, item| acc.checked_add(item.subtotal))
            .ok_or(AMOUNT_OUT_OF_RANGE)?;
        let shipping = match form.delivery_method {
            DeliveryMethod::Pickup => Money::zero(),
            DeliveryMethod::Delivery => form.shipping_cost.unwrap_or(self.settings.shipping_fee),
        };

        OrderTotals::checked(
            subtotal,
            shipping,
            form.tax.unwrap_or_default(),
            form.discount.unwrap_or_default(),
        )
        .ok_or(AMOUNT_OUT_OF_RANGE)
    }

    /// Inserts the order under the next free number for today.
    ///
    /// A taken number draws the next sequence value, up to
    /// `max_attempts` numbers in total.
    async fn insert_with_fresh_number(
        &self,
        uow: &mut dyn UnitOfWork,
        mut order: NewOrder,
    ) -> Result<Order, OrderError> {
        let day = Utc::now().date_naive();
        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let sequence = uow.next_order_sequence(day).await?;
            order.order_number =
                format_order_number(&self.settings.order_number_prefix, day, sequence);

            match uow.insert_order(order.clone()).await {
                Ok(inserted) => return Ok(inserted),
                Err(StoreError::OrderNumberConflict(number)) => {
                    metrics::counter!("order_number_conflicts_total").increment(1);
                    if attempt >= max_attempts {
                        tracing::error!(order_number = %number, attempt, "no free order number");
                        return Err(OrderError::Store(StoreError::OrderNumberConflict(number)));
                    }
                    tracing::warn!(order_number = %number, attempt, "order number taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Sends post-commit alerts. Failures are logged only.
    async fn announce(&self, order: &Order, low_stock: &[Product]) {
        for product in low_stock {
            if let Err(e) = self.notifier.notify_low_stock(product).await {
                tracing::warn!(product_id = %product.id, error = %e, "low stock alert failed");
            }
        }
        if let Err(e) = self.notifier.notify_new_order(order).await {
            tracing::warn!(order_id = %order.id, error = %e, "new order alert failed");
        }
    }

    /// Gets an order by id.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, id: OrderId) -> Result<Order, OrderError> {
        self.store
            .find_order(id)
            .await?
            .ok_or(OrderError::OrderNotFound(id))
    }

    #[tracing::instrument(skip(self))]
    pub async fn find_by_number(&self, order_number: &str) -> Result<Option<Order>, OrderError> {
        Ok(self.store.find_order_by_number(order_number).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>, OrderError> {
        Ok(self.store.list_orders(query).await?)
    }

    /// Moves an order to a new status.
    ///
    /// Cancelling returns every item to stock whose product still exists.
    #[tracing::instrument(skip(self))]
    pub async fn update_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<Order, OrderError> {
        let mut uow = self.store.begin().await?;
        let order = uow
            .lock_order(id)
            .await?
            .ok_or(OrderError::OrderNotFound(id))?;

        if !order.status.can_transition_to(status) {
            return Err(OrderError::InvalidStatusTransition {
                from: order.status,
                to: status,
            });
        }

        if status == OrderStatus::Cancelled {
            let mut restock: BTreeMap<ProductId, u32> = BTreeMap::new();
            for item in &order.items {
                if let Some(product_id) = item.product_id {
                    *restock.entry(product_id).or_default() += item.quantity;
                }
            }
            for (product_id, quantity) in restock {
                if uow.lock_product(product_id).await?.is_none() {
                    continue;
                }
                uow.increment_stock(product_id, quantity).await?;
                uow.update_stock_status(product_id).await?;
            }
        }

        let updated = uow.set_order_status(id, status).await?;
        uow.commit().await?;

        metrics::counter!("order_status_changes_total", "status" => status.as_str()).increment(1);
        tracing::info!(
            order_number = %updated.order_number,
            from = %order.status,
            to = %status,
            "order status changed"
        );
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn update_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
    ) -> Result<Order, OrderError> {
        Ok(self.store.update_payment_status(id, status).await?)
    }
}

/// Collapses snapshot lines into one entry per product, in product id order.
///
/// Sorting here fixes the order in which product rows are locked.
const AMOUNT_OUT_OF_RANGE: OrderError = OrderError::InvalidForm {
    field: "totals",
    reason: "amount out of range",
};

fn merge_lines(
    cart_items: &[CartSnapshotLine],
) -> Result<BTreeMap<ProductId, (u32, Money)>, OrderError> {
    if cart_items.is_empty() {
        return Err(OrderError::EmptyCart);
    }

    let mut lines: BTreeMap<ProductId, (u32, Money)> = BTreeMap::new();
    for item in cart_items {
        if item.quantity == 0 {
            return Err(OrderError::InvalidForm {
                field: "items",
                reason: "quantity must be at least 1",
            });
        }
        let entry = lines
            .entry(item.product_id)
            .or_insert((0, Money::zero()));
        entry.0 = entry.0.saturating_add(item.quantity);
        entry.1 = entry.1.checked_add(item.subtotal).ok_or(OrderError::InvalidForm {
            field: "items",
            reason: "amount out of range",
        })?;
    }
    Ok(lines)
}

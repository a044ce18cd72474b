//! Order records and their status enums.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ProductId, UserId};
use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Lifecycle state of an order.
///
/// Checkout only ever creates `Pending` orders. Administrative transitions:
/// ```text
/// Pending ──► Processing ──► Shipped ──► Delivered
///    │            │
///    └────────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    /// Returns true if an administrator may move an order from `self` to `next`.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Processing)
                | (OrderStatus::Pending, OrderStatus::Cancelled)
                | (OrderStatus::Processing, OrderStatus::Shipped)
                | (OrderStatus::Processing, OrderStatus::Cancelled)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        )
    }

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(StoreError::Corrupt(format!("unknown order status '{other}'"))),
        }
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(StoreError::Corrupt(format!(
                "unknown payment status '{other}'"
            ))),
        }
    }
}

/// How the customer receives the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    Pickup,
    Delivery,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Pickup => "pickup",
            DeliveryMethod::Delivery => "delivery",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeliveryMethod {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pickup" => Ok(DeliveryMethod::Pickup),
            "delivery" => Ok(DeliveryMethod::Delivery),
            other => Err(StoreError::Corrupt(format!(
                "unknown delivery method '{other}'"
            ))),
        }
    }
}

/// Where an order is shipped (or the fixed pickup location).
///
/// Field names carry a `shipping_` prefix on the wire so they sit flat next
/// to the other order fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    #[serde(rename = "shipping_address")]
    pub address: Option<String>,
    #[serde(rename = "shipping_city")]
    pub city: Option<String>,
    #[serde(rename = "shipping_region")]
    pub region: Option<String>,
    #[serde(rename = "shipping_neighborhood")]
    pub neighborhood: Option<String>,
    #[serde(rename = "shipping_postal_code")]
    pub postal_code: Option<String>,
}

/// Monetary breakdown of an order.
///
/// `total` is always `subtotal + shipping + tax - discount`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
}

impl OrderTotals {
    /// Builds totals with saturating arithmetic. Checkout uses [`Self::checked`].
    pub fn new(subtotal: Money, shipping: Money, tax: Money, discount: Money) -> Self {
        Self {
            subtotal,
            shipping,
            tax,
            discount,
            total: subtotal + shipping + tax - discount,
        }
    }

    /// Builds totals, or `None` if `subtotal + shipping + tax - discount`
    /// leaves the `i64` range.
    pub fn checked(subtotal: Money, shipping: Money, tax: Money, discount: Money) -> Option<Self> {
        let total = subtotal
            .checked_add(shipping)?
            .checked_add(tax)?
            .checked_sub(discount)?;
        Some(Self {
            subtotal,
            shipping,
            tax,
            discount,
            total,
        })
    }
}

/// Purchase-time snapshot of one order line.
///
/// Name, SKU and price are copied from the product so later catalog edits
/// don't rewrite history. `product_id` becomes `None` if the product is
/// deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: i64,
    pub order_id: OrderId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub sku: String,
    pub price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

/// A placed order with its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub payment_method: String,
    pub delivery_method: DeliveryMethod,
    #[serde(flatten)]
    pub totals: OrderTotals,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    #[serde(flatten)]
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn total_quantity(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }
}

/// One line of an order about to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub sku: String,
    pub price: Money,
    pub quantity: u32,
    pub subtotal: Money,
}

/// An order about to be inserted. Status and payment status start as `pending`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub payment_method: String,
    pub delivery_method: DeliveryMethod,
    pub totals: OrderTotals,
    pub customer_name: String,
    pub customer_email: Option<String>,
    pub customer_phone: String,
    pub shipping_address: ShippingAddress,
    pub notes: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    /// Builds the stored record once ids have been assigned.
    ///
    /// `first_item_id` is the id given to the first line; the rest follow
    /// sequentially.
    pub(crate) fn into_order(self, id: OrderId, first_item_id: i64, now: DateTime<Utc>) -> Order {
        let items = self
            .items
            .into_iter()
            .zip(first_item_id..)
            .map(|(item, item_id)| OrderItem {
                id: item_id,
                order_id: id,
                product_id: Some(item.product_id),
                product_name: item.product_name,
                sku: item.sku,
                price: item.price,
                quantity: item.quantity,
                subtotal: item.subtotal,
            })
            .collect();

        Order {
            id,
            order_number: self.order_number,
            user_id: self.user_id,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            payment_method: self.payment_method,
            delivery_method: self.delivery_method,
            totals: self.totals,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            customer_phone: self.customer_phone,
            shipping_address: self.shipping_address,
            notes: self.notes,
            items,
            created_at: now,
            updated_at: now,
        }
    }
}

//! Catalog records: products and categories.

use chrono::{DateTime, Utc};
use common::{CategoryId, Money, ProductId};
use serde::{Deserialize, Deserializer, Serialize};

use crate::StoreError;

/// Products at or below this quantity are labelled `low_stock`.
pub const LOW_STOCK_THRESHOLD: i32 = 10;

/// Derived availability label of a product.
///
/// Recomputed whenever the stock quantity changes:
/// ```text
/// quantity <= 0   ──► out_of_stock
/// quantity <= 10  ──► low_stock
/// otherwise       ──► in_stock
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    #[default]
    InStock,
    LowStock,
    OutOfStock,
}

impl StockStatus {
    /// Computes the label for a stock quantity.
    pub fn for_quantity(quantity: i32) -> Self {
        if quantity <= 0 {
            StockStatus::OutOfStock
        } else if quantity <= LOW_STOCK_THRESHOLD {
            StockStatus::LowStock
        } else {
            StockStatus::InStock
        }
    }

    /// Returns true for the labels administrators are alerted about.
    pub fn needs_attention(&self) -> bool {
        matches!(self, StockStatus::LowStock | StockStatus::OutOfStock)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StockStatus::InStock => "in_stock",
            StockStatus::LowStock => "low_stock",
            StockStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl std::fmt::Display for StockStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StockStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_stock" => Ok(StockStatus::InStock),
            "low_stock" => Ok(StockStatus::LowStock),
            "out_of_stock" => Ok(StockStatus::OutOfStock),
            other => Err(StoreError::Corrupt(format!("unknown stock status '{other}'"))),
        }
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub sku: String,
    pub description: Option<String>,
    pub price: Money,
    pub discount_price: Option<Money>,
    pub discount_percentage: Option<u8>,
    pub stock_quantity: i32,
    pub stock_status: StockStatus,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Effective sale price after any active discount.
    ///
    /// A fixed discount price wins when it is positive and below the list
    /// price; otherwise a percentage in `1..=99` is applied; otherwise the list
    /// price is returned.
    pub fn final_price(&self) -> Money {
        if let Some(discounted) = self.discount_price
            && discounted.is_positive()
            && discounted < self.price
        {
            return discounted;
        }

        match self.discount_percentage {
            Some(percent) if (1..100).contains(&percent) => self.price.less_percent(percent),
            _ => self.price,
        }
    }

    /// Returns true if a discount changes the price.
    pub fn is_discounted(&self) -> bool {
        self.final_price() < self.price
    }

    /// Returns true if current stock covers the requested quantity.
    pub fn has_stock_for(&self, quantity: u32) -> bool {
        i64::from(self.stock_quantity) >= i64::from(quantity)
    }
}

/// Data for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub sku: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    #[serde(default)]
    pub discount_price: Option<Money>,
    #[serde(default)]
    pub discount_percentage: Option<u8>,
    #[serde(default)]
    pub stock_quantity: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewProduct {
    /// Creates an active product with no stock and no discount.
    pub fn new(name: impl Into<String>, sku: impl Into<String>, price: Money) -> Self {
        Self {
            category_id: None,
            name: name.into(),
            sku: sku.into(),
            description: None,
            price,
            discount_price: None,
            discount_percentage: None,
            stock_quantity: 0,
            is_active: true,
        }
    }

    pub fn with_stock(mut self, quantity: i32) -> Self {
        self.stock_quantity = quantity;
        self
    }

    pub fn with_discount_price(mut self, price: Money) -> Self {
        self.discount_price = Some(price);
        self
    }

    pub fn with_discount_percentage(mut self, percent: u8) -> Self {
        self.discount_percentage = Some(percent);
        self
    }

    pub fn in_category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }

    /// Builds the stored record once an id has been assigned.
    pub(crate) fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        let stock_quantity = self.stock_quantity.max(0);
        Product {
            id,
            category_id: self.category_id,
            name: self.name,
            sku: self.sku,
            description: self.description,
            price: self.price,
            discount_price: self.discount_price,
            discount_percentage: self.discount_percentage,
            stock_quantity,
            stock_status: StockStatus::for_quantity(stock_quantity),
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial administrative edit of a product.
///
/// Doubly-optional fields distinguish "leave as is" (`None`) from
/// "clear the value" (`Some(None)`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub category_id: Option<Option<CategoryId>>,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default, deserialize_with = "double_option")]
    pub discount_price: Option<Option<Money>>,
    #[serde(default, deserialize_with = "double_option")]
    pub discount_percentage: Option<Option<u8>>,
    #[serde(default)]
    pub stock_quantity: Option<i32>,
    #[serde(default)]
    pub is_active: Option<bool>,
}

/// Maps an explicit JSON `null` to `Some(None)`; absent fields stay `None`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl ProductChanges {
    pub fn stock(quantity: i32) -> Self {
        Self {
            stock_quantity: Some(quantity),
            ..Default::default()
        }
    }

    /// Applies the edit, recomputing the stock label when stock changes.
    pub fn apply(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(category_id) = self.category_id {
            product.category_id = category_id;
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(discount_price) = self.discount_price {
            product.discount_price = discount_price;
        }
        if let Some(discount_percentage) = self.discount_percentage {
            product.discount_percentage = discount_percentage;
        }
        if let Some(quantity) = self.stock_quantity {
            product.stock_quantity = quantity.max(0);
            product.stock_status = StockStatus::for_quantity(product.stock_quantity);
        }
        if let Some(active) = self.is_active {
            product.is_active = active;
        }
        product.updated_at = now;
    }
}

/// A catalog category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    pub created_at: DateTime<Utc>,
}

/// Data for creating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<CategoryId>,
}

impl NewCategory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent_id: None,
        }
    }

    /// URL slug derived from the name: lowercase alphanumerics joined by `-`.
    pub fn slug(&self) -> String {
        self.name
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(price: i64) -> Product {
        NewProduct::new("Widget", "W-1", Money::from_cents(price))
            .with_stock(5)
            .into_product(ProductId::new(1), Utc::now())
    }

    #[test]
    fn stock_status_thresholds() {
        assert_eq!(StockStatus::for_quantity(-1), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_quantity(0), StockStatus::OutOfStock);
        assert_eq!(StockStatus::for_quantity(1), StockStatus::LowStock);
        assert_eq!(StockStatus::for_quantity(10), StockStatus::LowStock);
        assert_eq!(StockStatus::for_quantity(11), StockStatus::InStock);
    }

    #[test]
    fn stock_status_round_trips_through_str() {
        for status in [
            StockStatus::InStock,
            StockStatus::LowStock,
            StockStatus::OutOfStock,
        ] {
            assert_eq!(status.as_str().parse::<StockStatus>().unwrap(), status);
        }
        assert!("sold_out".parse::<StockStatus>().is_err());
    }

    #[test]
    fn final_price_prefers_fixed_discount() {
        let mut p = product(10000);
        p.discount_price = Some(Money::from_cents(8000));
        p.discount_percentage = Some(50);
        assert_eq!(p.final_price(), Money::from_cents(8000));
        assert!(p.is_discounted());
    }

    #[test]
    fn final_price_ignores_discount_above_list_price() {
        let mut p = product(10000);
        p.discount_price = Some(Money::from_cents(12000));
        assert_eq!(p.final_price(), Money::from_cents(10000));
        assert!(!p.is_discounted());
    }

    #[test]
    fn final_price_applies_percentage() {
        let mut p = product(10000);
        p.discount_percentage = Some(25);
        assert_eq!(p.final_price(), Money::from_cents(7500));

        p.discount_percentage = Some(100);
        assert_eq!(p.final_price(), Money::from_cents(10000));
    }

    #[test]
    fn new_product_clamps_negative_stock() {
        let p = NewProduct::new("Widget", "W-1", Money::from_cents(100))
            .with_stock(-3)
            .into_product(ProductId::new(1), Utc::now());
        assert_eq!(p.stock_quantity, 0);
        assert_eq!(p.stock_status, StockStatus::OutOfStock);
    }

    #[test]
    fn changes_recompute_stock_status() {
        let mut p = product(1000);
        assert_eq!(p.stock_status, StockStatus::LowStock);

        ProductChanges::stock(40).apply(&mut p, Utc::now());
        assert_eq!(p.stock_quantity, 40);
        assert_eq!(p.stock_status, StockStatus::InStock);
    }

    #[test]
    fn changes_can_clear_optional_fields() {
        let mut p = product(1000);
        p.discount_price = Some(Money::from_cents(900));
        let changes = ProductChanges {
            discount_price: Some(None),
            ..Default::default()
        };
        changes.apply(&mut p, Utc::now());
        assert_eq!(p.discount_price, None);
    }

    #[test]
    fn changes_distinguish_null_from_absent() {
        let changes: ProductChanges =
            serde_json::from_str(r#"{"discount_price": null, "stock_quantity": 3}"#).unwrap();
        assert_eq!(changes.discount_price, Some(None));
        assert_eq!(changes.discount_percentage, None);
        assert_eq!(changes.stock_quantity, Some(3));
    }

    #[test]
    fn category_slug() {
        assert_eq!(NewCategory::new("Home & Garden").slug(), "home-garden");
        assert_eq!(NewCategory::new("  Tools ").slug(), "tools");
    }
}

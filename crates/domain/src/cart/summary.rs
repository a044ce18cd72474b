use common::{Money, ProductId};
use serde::{Deserialize, Serialize};

/// Pricing knobs for the cart view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSettings {
    /// Flat shipping fee shown while the cart is not empty.
    pub shipping_fee: Money,
}

impl Default for CartSettings {
    fn default() -> Self {
        Self {
            shipping_fee: Money::from_cents(5000),
        }
    }
}

/// One priced cart entry, computed from the live product at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub quantity: u32,
    /// The product's final price.
    pub unit_price: Money,
    pub subtotal: Money,
    pub available_stock: i32,
    /// Whether current stock covers the requested quantity.
    pub in_stock: bool,
}

/// Aggregate view of a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSummary {
    pub items: Vec<CartLine>,
    pub distinct_count: usize,
    pub total_quantity: u32,
    pub subtotal: Money,
    pub shipping: Money,
    pub tax: Money,
    pub total: Money,
}

impl CartSummary {
    /// Totals a set of lines. Shipping only applies to a non-empty subtotal
    /// and tax is always zero.
    pub fn from_lines(items: Vec<CartLine>, settings: &CartSettings) -> Self {
        let subtotal: Money = items.iter().map(|line| line.subtotal).sum();
        let shipping = if subtotal.is_positive() {
            settings.shipping_fee
        } else {
            Money::zero()
        };
        let tax = Money::zero();

        Self {
            distinct_count: items.len(),
            total_quantity: items.iter().map(|line| line.quantity).sum(),
            subtotal,
            shipping,
            tax,
            total: subtotal + shipping + tax,
            items,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A cart line as handed to checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartSnapshotLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub subtotal: Money,
}

impl From<&CartLine> for CartSnapshotLine {
    fn from(line: &CartLine) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            subtotal: line.subtotal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: i64, quantity: u32, unit_cents: i64) -> CartLine {
        let unit_price = Money::from_cents(unit_cents);
        CartLine {
            product_id: ProductId::new(id),
            name: format!("Product {id}"),
            sku: format!("SKU-{id}"),
            quantity,
            unit_price,
            subtotal: unit_price.multiply(quantity),
            available_stock: 100,
            in_stock: true,
        }
    }

    #[test]
    fn test_summary_totals() {
        let settings = CartSettings {
            shipping_fee: Money::from_cents(700),
        };
        let summary = CartSummary::from_lines(vec![line(1, 2, 1000), line(2, 1, 550)], &settings);

        assert_eq!(summary.distinct_count, 2);
        assert_eq!(summary.total_quantity, 3);
        assert_eq!(summary.subtotal.cents(), 2550);
        assert_eq!(summary.shipping.cents(), 700);
        assert_eq!(summary.tax, Money::zero());
        assert_eq!(summary.total.cents(), 3250);
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let summary = CartSummary::from_lines(vec![], &CartSettings::default());

        assert!(summary.is_empty());
        assert_eq!(summary.shipping, Money::zero());
        assert_eq!(summary.total, Money::zero());
    }

    #[test]
    fn test_snapshot_from_line() {
        let snapshot = CartSnapshotLine::from(&line(7, 2, 10000));
        assert_eq!(snapshot.product_id, ProductId::new(7));
        assert_eq!(snapshot.quantity, 2);
        assert_eq!(snapshot.subtotal.cents(), 20000);
    }
}

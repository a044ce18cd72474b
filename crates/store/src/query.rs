use chrono::{DateTime, Utc};
use common::{CategoryId, UserId};

use crate::{DeliveryMethod, OrderStatus, PaymentStatus, StockStatus};

/// Filter for catalog listings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,

    /// Only products that can currently be sold.
    pub active_only: bool,

    /// Case-insensitive match on name or SKU.
    pub search: Option<String>,

    pub stock_status: Option<StockStatus>,

    pub limit: Option<usize>,

    pub offset: Option<usize>,
}

impl ProductQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// The storefront view: active products only.
    pub fn storefront() -> Self {
        Self {
            active_only: true,
            ..Default::default()
        }
    }

    pub fn category(mut self, category_id: CategoryId) -> Self {
        self.category_id = Some(category_id);
        self
    }

    pub fn active_only(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn stock_status(mut self, status: StockStatus) -> Self {
        self.stock_status = Some(status);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Whether a product name and SKU satisfy the search term.
    pub(crate) fn matches_search(&self, name: &str, sku: &str) -> bool {
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                name.to_lowercase().contains(&term) || sku.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}

/// Filter for the order listing. Results are newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub delivery_method: Option<DeliveryMethod>,
    pub user_id: Option<UserId>,

    /// Orders placed at or after this instant.
    pub from: Option<DateTime<Utc>>,

    /// Orders placed at or before this instant.
    pub to: Option<DateTime<Utc>>,

    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl OrderQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn payment_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = Some(status);
        self
    }

    pub fn delivery_method(mut self, method: DeliveryMethod) -> Self {
        self.delivery_method = Some(method);
        self
    }

    pub fn user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    pub fn to(mut self, to: DateTime<Utc>) -> Self {
        self.to = Some(to);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = Some(offset);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storefront_query_is_active_only() {
        let query = ProductQuery::storefront();
        assert!(query.active_only);
        assert!(query.category_id.is_none());
    }

    #[test]
    fn search_matches_name_or_sku_ignoring_case() {
        let query = ProductQuery::new().search("MUG");
        assert!(query.matches_search("Coffee mug", "CM-01"));
        assert!(query.matches_search("Cup", "mug-02"));
        assert!(!query.matches_search("Plate", "PL-01"));
        assert!(ProductQuery::new().matches_search("anything", "x"));
    }

    #[test]
    fn order_query_builder_chain() {
        let query = OrderQuery::new()
            .status(OrderStatus::Pending)
            .delivery_method(DeliveryMethod::Pickup)
            .limit(20)
            .offset(40);

        assert_eq!(query.status, Some(OrderStatus::Pending));
        assert_eq!(query.delivery_method, Some(DeliveryMethod::Pickup));
        assert_eq!(query.limit, Some(20));
        assert_eq!(query.offset, Some(40));
        assert!(query.payment_status.is_none());
    }
}

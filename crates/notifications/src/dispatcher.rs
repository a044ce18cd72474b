use common::{NotificationId, UserId};
use serde_json::json;
use store::{
    NewNotification, Notification, NotificationKind, NotificationStore, Order, Product,
    StockStatus, UserDirectory,
};

use crate::error::{NotifyError, Result};

/// Writes notifications for single users and fans storefront events out to
/// every administrator.
#[derive(Clone)]
pub struct NotificationDispatcher<S> {
    store: S,
}

impl<S> NotificationDispatcher<S>
where
    S: NotificationStore + UserDirectory,
{
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stores one unread notification for a user.
    #[tracing::instrument(skip(self, message, data))]
    pub async fn notify(
        &self,
        user_id: UserId,
        title: &str,
        message: &str,
        kind: NotificationKind,
        data: serde_json::Value,
    ) -> Result<Notification> {
        let notification = self
            .store
            .insert_notification(NewNotification {
                user_id,
                title: title.to_string(),
                message: message.to_string(),
                kind,
                data,
            })
            .await?;

        metrics::counter!("notifications_sent_total", "kind" => kind.as_str()).increment(1);
        Ok(notification)
    }

    /// Sends the same notification to every administrator.
    ///
    /// A failure for one administrator is logged and counted, and the
    /// remaining administrators are still notified. Returns how many
    /// notifications were stored. Only a failure to resolve the
    /// administrators is returned as an error.
    #[tracing::instrument(skip(self, message, data))]
    pub async fn notify_admins(
        &self,
        title: &str,
        message: &str,
        kind: NotificationKind,
        data: serde_json::Value,
    ) -> Result<usize> {
        let admins = self.store.admins().await?;
        let mut delivered = 0;

        for admin in &admins {
            match self.notify(admin.id, title, message, kind, data.clone()).await {
                Ok(_) => delivered += 1,
                Err(e) => {
                    metrics::counter!("notifications_failed_total", "kind" => kind.as_str())
                        .increment(1);
                    tracing::warn!(user_id = %admin.id, error = %e, "notification delivery failed");
                }
            }
        }

        tracing::debug!(delivered, recipients = admins.len(), "admin fan-out finished");
        Ok(delivered)
    }

    /// Tells administrators an order was placed.
    pub async fn notify_new_order(&self, order: &Order) -> Result<usize> {
        let message = format!(
            "Order {} from {} for {} ({} items)",
            order.order_number,
            order.customer_name,
            order.totals.total,
            order.total_quantity()
        );
        let data = json!({
            "order_id": order.id,
            "order_number": order.order_number,
            "customer_name": order.customer_name,
            "total": order.totals.total,
            "delivery_method": order.delivery_method,
        });

        self.notify_admins("New order received", &message, NotificationKind::Order, data)
            .await
    }

    /// Tells administrators a product is running low or has sold out.
    pub async fn notify_low_stock(&self, product: &Product) -> Result<usize> {
        let (title, message) = match product.stock_status {
            StockStatus::OutOfStock => (
                "Product out of stock",
                format!("{} ({}) is out of stock", product.name, product.sku),
            ),
            _ => (
                "Low stock alert",
                format!(
                    "{} ({}) has {} units left",
                    product.name, product.sku, product.stock_quantity
                ),
            ),
        };
        let data = json!({
            "product_id": product.id,
            "sku": product.sku,
            "stock_quantity": product.stock_quantity,
            "stock_status": product.stock_status,
        });

        self.notify_admins(title, &message, NotificationKind::Stock, data)
            .await
    }

    pub async fn notifications_for(
        &self,
        user_id: UserId,
        unread_only: bool,
    ) -> Result<Vec<Notification>> {
        Ok(self.store.notifications_for(user_id, unread_only).await?)
    }

    pub async fn mark_read(&self, id: NotificationId) -> Result<Notification> {
        self.store
            .mark_read(id)
            .await?
            .ok_or(NotifyError::NotFound(id))
    }

    pub async fn mark_all_read(&self, user_id: UserId) -> Result<u64> {
        Ok(self.store.mark_all_read(user_id).await?)
    }

    pub async fn unread_count(&self, user_id: UserId) -> Result<u64> {
        Ok(self.store.unread_count(user_id).await?)
    }
}

//! Integration tests for checkout and order administration.
//!
//! These run the full workflow against the in-memory store: cart snapshot,
//! stock locking and decrement, order numbering, and post-commit alerts.

use std::sync::Arc;

use chrono::Utc;
use common::{Money, ProductId, SessionId};
use domain::{
    CartService, CartSettings, CartSnapshotLine, CheckoutForm, CheckoutSettings, OrderError,
    OrderService, PICKUP_ADDRESS, format_order_number,
};
use store::{
    CatalogStore, DeliveryMethod, InMemoryStore, NewOrder, NewOrderItem, NewProduct, NewUser,
    NotificationKind, NotificationStore, OrderQuery, OrderStatus, OrderStore, OrderTotals,
    PaymentStatus, Product, Role, ShippingAddress, StockStatus, TransactionalStore,
    UserDirectory,
};

fn create_service(store: &InMemoryStore) -> OrderService<InMemoryStore> {
    OrderService::new(store.clone(), CheckoutSettings::default())
}

async fn create_product(store: &InMemoryStore, sku: &str, price: i64, stock: i32) -> Product {
    let new =
        NewProduct::new(format!("Item {sku}"), sku, Money::from_cents(price)).with_stock(stock);
    store.create_product(new).await.unwrap()
}

fn snapshot(product: &Product, quantity: u32) -> CartSnapshotLine {
    CartSnapshotLine {
        product_id: product.id,
        quantity,
        subtotal: product.final_price().multiply(quantity),
    }
}

fn delivery_form(shipping_cents: i64) -> CheckoutForm {
    let mut form =
        CheckoutForm::delivery("Julia Pérez", "555-0123", "card", "Av. Siempre Viva 742", "Cali");
    form.shipping_cost = Some(Money::from_cents(shipping_cents));
    form
}

async fn stock_of(store: &InMemoryStore, id: ProductId) -> i32 {
    store.find_product(id).await.unwrap().unwrap().stock_quantity
}

mod scenarios {
    use super::*;

    #[tokio::test]
    async fn delivery_order_with_explicit_shipping() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = create_product(&store, "P-7", 10000, 5).await;

        let order = service
            .create_order(
                delivery_form(5000),
                &[CartSnapshotLine {
                    product_id: product.id,
                    quantity: 2,
                    subtotal: Money::from_cents(20000),
                }],
            )
            .await
            .unwrap();

        assert_eq!(order.totals.subtotal.cents(), 20000);
        assert_eq!(order.totals.shipping.cents(), 5000);
        assert_eq!(order.totals.tax.cents(), 0);
        assert_eq!(order.totals.discount.cents(), 0);
        assert_eq!(order.totals.total.cents(), 25000);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);

        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].quantity, 2);
        assert_eq!(order.items[0].price.cents(), 10000);
        assert_eq!(order.items[0].subtotal.cents(), 20000);

        assert_eq!(stock_of(&store, product.id).await, 3);
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_nothing_behind() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = create_product(&store, "P-7", 10000, 1).await;

        let result = service
            .create_order(delivery_form(5000), &[snapshot(&product, 2)])
            .await;

        match result {
            Err(OrderError::InsufficientStock {
                product_name,
                requested,
                available,
                ..
            }) => {
                assert_eq!(product_name, "Item P-7");
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }

        assert_eq!(store.order_count().await, 0);
        assert_eq!(stock_of(&store, product.id).await, 1);
    }
}

mod validation {
    use super::*;

    #[tokio::test]
    async fn empty_cart_is_rejected() {
        let store = InMemoryStore::new();
        let service = create_service(&store);

        let result = service.create_order(delivery_form(0), &[]).await;
        assert!(matches!(result, Err(OrderError::EmptyCart)));
    }

    #[tokio::test]
    async fn invalid_form_is_rejected_before_touching_stock() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = create_product(&store, "V-1", 1000, 5).await;

        let form = CheckoutForm::pickup("Ana", "", "cash");
        let result = service.create_order(form, &[snapshot(&product, 1)]).await;

        assert!(matches!(
            result,
            Err(OrderError::InvalidForm { field: "customer_phone", .. })
        ));
        assert_eq!(stock_of(&store, product.id).await, 5);
    }

    #[tokio::test]
    async fn deleted_product_fails_whole_checkout() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let kept = create_product(&store, "K-1", 1000, 5).await;
        let gone = create_product(&store, "G-1", 1000, 5).await;
        let lines = [snapshot(&kept, 1), snapshot(&gone, 1)];
        store.delete_product(gone.id).await.unwrap();

        let result = service.create_order(delivery_form(0), &lines).await;

        assert!(matches!(result, Err(OrderError::ProductNotFound(id)) if id == gone.id));
        assert_eq!(stock_of(&store, kept.id).await, 5);
        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn second_line_short_rolls_back_first_line() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let plenty = create_product(&store, "A-1", 1000, 50).await;
        let scarce = create_product(&store, "B-1", 1000, 1).await;

        let result = service
            .create_order(
                delivery_form(0),
                &[snapshot(&plenty, 10), snapshot(&scarce, 2)],
            )
            .await;

        assert!(matches!(result, Err(OrderError::InsufficientStock { .. })));
        assert_eq!(stock_of(&store, plenty.id).await, 50);
        assert_eq!(stock_of(&store, scarce.id).await, 1);
        assert_eq!(store.order_count().await, 0);
    }
}

mod totals {
    use super::*;

    #[tokio::test]
    async fn pickup_forces_zero_shipping_and_store_address() {
        let store = InMemoryStore::new();
        let service = OrderService::new(
            store.clone(),
            CheckoutSettings {
                pickup_city: "Bogotá".to_string(),
                ..Default::default()
            },
        );
        let product = create_product(&store, "PK-1", 2500, 10).await;

        let mut form = CheckoutForm::pickup("Ana", "555", "cash");
        form.shipping_cost = Some(Money::from_cents(9999));
        form.shipping_address = Some("Ignored 1".to_string());
        form.shipping_region = Some("Ignored".to_string());

        let order = service
            .create_order(form, &[snapshot(&product, 2)])
            .await
            .unwrap();

        assert_eq!(order.delivery_method, DeliveryMethod::Pickup);
        assert_eq!(order.totals.shipping, Money::zero());
        assert_eq!(order.totals.total.cents(), 5000);
        assert_eq!(order.shipping_address.address.as_deref(), Some(PICKUP_ADDRESS));
        assert_eq!(order.shipping_address.city.as_deref(), Some("Bogotá"));
        assert_eq!(order.shipping_address.region, None);
    }

    #[tokio::test]
    async fn delivery_without_shipping_cost_uses_configured_fee() {
        let store = InMemoryStore::new();
        let service = OrderService::new(
            store.clone(),
            CheckoutSettings {
                shipping_fee: Money::from_cents(1200),
                ..Default::default()
            },
        );
        let product = create_product(&store, "D-1", 1000, 10).await;

        let mut form = delivery_form(0);
        form.shipping_cost = None;
        let order = service
            .create_order(form, &[snapshot(&product, 1)])
            .await
            .unwrap();

        assert_eq!(order.totals.shipping.cents(), 1200);
        assert_eq!(order.totals.total.cents(), 2200);
    }

    #[tokio::test]
    async fn total_includes_tax_and_discount() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let a = create_product(&store, "T-1", 1999, 10).await;
        let b = create_product(&store, "T-2", 501, 10).await;

        let mut form = delivery_form(700);
        form.tax = Some(Money::from_cents(300));
        form.discount = Some(Money::from_cents(1000));

        let order = service
            .create_order(form, &[snapshot(&a, 3), snapshot(&b, 2)])
            .await
            .unwrap();

        let item_sum: Money = order.items.iter().map(|i| i.subtotal).sum();
        assert_eq!(order.totals.subtotal, item_sum);
        assert_eq!(order.totals.subtotal.cents(), 6999);
        assert_eq!(
            order.totals.total,
            order.totals.subtotal + order.totals.shipping + order.totals.tax
                - order.totals.discount
        );
        assert_eq!(order.totals.total.cents(), 6999);
    }

    #[tokio::test]
    async fn items_snapshot_the_discounted_price() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = store
            .create_product(
                NewProduct::new("Sale lamp", "SL-1", Money::from_cents(8000))
                    .with_stock(10)
                    .with_discount_price(Money::from_cents(6000)),
            )
            .await
            .unwrap();

        let order = service
            .create_order(delivery_form(0), &[snapshot(&product, 1)])
            .await
            .unwrap();

        assert_eq!(order.items[0].price.cents(), 6000);
        assert_eq!(order.items[0].sku, "SL-1");
        assert_eq!(order.items[0].product_name, "Sale lamp");
    }

    #[tokio::test]
    async fn tax_beyond_money_range_is_rejected_before_any_write() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = create_product(&store, "OV-1", 1000, 5).await;

        let mut form = CheckoutForm::pickup("Ana", "555", "cash");
        form.tax = Some(Money::from_cents(i64::MAX));

        let result = service.create_order(form, &[snapshot(&product, 1)]).await;

        assert!(matches!(
            result,
            Err(OrderError::InvalidForm { field: "totals", .. })
        ));
        assert_eq!(stock_of(&store, product.id).await, 5);
        assert!(store.list_orders(OrderQuery::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn shipping_plus_tax_overflow_is_rejected() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = create_product(&store, "OV-2", 1000, 5).await;

        let mut form = delivery_form(i64::MAX - 500);
        form.tax = Some(Money::from_cents(400));

        let result = service.create_order(form, &[snapshot(&product, 1)]).await;

        assert!(matches!(
            result,
            Err(OrderError::InvalidForm { field: "totals", .. })
        ));
        assert_eq!(stock_of(&store, product.id).await, 5);
    }
}

mod numbering {
    use super::*;

    fn placeholder_order(number: String, product: &Product) -> NewOrder {
        NewOrder {
            order_number: number,
            user_id: None,
            payment_method: "cash".to_string(),
            delivery_method: DeliveryMethod::Pickup,
            totals: OrderTotals::default(),
            customer_name: "Legacy".to_string(),
            customer_email: None,
            customer_phone: "000".to_string(),
            shipping_address: ShippingAddress::default(),
            notes: None,
            items: vec![NewOrderItem {
                product_id: product.id,
                product_name: product.name.clone(),
                sku: product.sku.clone(),
                price: product.price,
                quantity: 1,
                subtotal: product.price,
            }],
        }
    }

    #[tokio::test]
    async fn numbers_follow_daily_sequence() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = create_product(&store, "N-1", 1000, 10).await;
        let today = Utc::now().date_naive();

        let first = service
            .create_order(delivery_form(0), &[snapshot(&product, 1)])
            .await
            .unwrap();
        let second = service
            .create_order(delivery_form(0), &[snapshot(&product, 1)])
            .await
            .unwrap();

        assert_eq!(first.order_number, format_order_number("ORD", today, 1));
        assert_eq!(second.order_number, format_order_number("ORD", today, 2));
    }

    #[tokio::test]
    async fn taken_number_is_skipped() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let product = create_product(&store, "N-2", 1000, 10).await;
        let today = Utc::now().date_naive();

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(placeholder_order(format_order_number("ORD", today, 1), &product))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let order = service
            .create_order(delivery_form(0), &[snapshot(&product, 1)])
            .await
            .unwrap();

        assert_eq!(order.order_number, format_order_number("ORD", today, 2));
    }

    #[tokio::test]
    async fn exhausted_attempts_fail_without_side_effects() {
        let store = InMemoryStore::new();
        let service = OrderService::new(
            store.clone(),
            CheckoutSettings {
                max_attempts: 1,
                ..Default::default()
            },
        );
        let product = create_product(&store, "N-3", 1000, 10).await;
        let today = Utc::now().date_naive();

        let mut uow = store.begin().await.unwrap();
        uow.insert_order(placeholder_order(format_order_number("ORD", today, 1), &product))
            .await
            .unwrap();
        uow.commit().await.unwrap();

        let result = service
            .create_order(delivery_form(0), &[snapshot(&product, 1)])
            .await;

        assert!(matches!(result, Err(OrderError::Store(_))));
        assert_eq!(store.order_count().await, 1);
        assert_eq!(stock_of(&store, product.id).await, 10);
    }
}

mod concurrency {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_checkouts_never_oversell() {
        let store = InMemoryStore::new();
        let service = Arc::new(create_service(&store));
        let product = create_product(&store, "HOT-1", 1000, 10).await;

        let handles: Vec<_> = (0..25)
            .map(|_| {
                let service = Arc::clone(&service);
                let line = snapshot(&product, 1);
                tokio::spawn(async move { service.create_order(delivery_form(0), &[line]).await })
            })
            .collect();

        let results = futures_util::future::join_all(handles).await;
        let placed: Vec<_> = results
            .into_iter()
            .map(|joined| joined.unwrap())
            .filter_map(Result::ok)
            .collect();

        assert_eq!(placed.len(), 10);
        assert_eq!(stock_of(&store, product.id).await, 0);

        let mut numbers: Vec<_> = placed.iter().map(|o| o.order_number.clone()).collect();
        numbers.sort();
        numbers.dedup();
        assert_eq!(numbers.len(), 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_multi_product_checkouts_keep_stock_consistent() {
        let store = InMemoryStore::new();
        let service = Arc::new(create_service(&store));
        let a = create_product(&store, "MA-1", 500, 12).await;
        let b = create_product(&store, "MB-1", 700, 7).await;

        let handles: Vec<_> = (0..10)
            .map(|i| {
                let service = Arc::clone(&service);
                // Alternate line order; locking is by product id either way.
                let lines = if i % 2 == 0 {
                    vec![snapshot(&a, 2), snapshot(&b, 1)]
                } else {
                    vec![snapshot(&b, 1), snapshot(&a, 2)]
                };
                tokio::spawn(async move { service.create_order(delivery_form(0), &lines).await })
            })
            .collect();

        let placed = futures_util::future::join_all(handles)
            .await
            .into_iter()
            .filter(|joined| matches!(joined, Ok(Ok(_))))
            .count() as i32;

        assert_eq!(placed, 6);
        assert_eq!(stock_of(&store, a.id).await, 12 - 2 * placed);
        assert_eq!(stock_of(&store, b.id).await, 7 - placed);
        assert_eq!(store.order_count().await, placed as usize);
    }
}

mod alerts {
    use super::*;

    async fn admin(store: &InMemoryStore, email: &str) -> common::UserId {
        store
            .create_user(NewUser::new("Admin", email, Role::Admin))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn checkout_notifies_admins_of_order_and_low_stock() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let admin_id = admin(&store, "admin@example.com").await;
        let product = create_product(&store, "L-1", 1000, 12).await;

        service
            .create_order(delivery_form(0), &[snapshot(&product, 3)])
            .await
            .unwrap();

        let inbox = store.notifications_for(admin_id, true).await.unwrap();
        assert_eq!(inbox.len(), 2);
        // Newest first: the order alert is sent after the stock alert.
        assert_eq!(inbox[0].kind, NotificationKind::Order);
        assert_eq!(inbox[1].kind, NotificationKind::Stock);

        let product = store.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock_status, StockStatus::LowStock);
    }

    #[tokio::test]
    async fn healthy_stock_sends_only_order_alert() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let admin_id = admin(&store, "admin@example.com").await;
        let product = create_product(&store, "H-1", 1000, 100).await;

        service
            .create_order(delivery_form(0), &[snapshot(&product, 1)])
            .await
            .unwrap();

        let inbox = store.notifications_for(admin_id, false).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].kind, NotificationKind::Order);
    }

    #[tokio::test]
    async fn failed_alerts_do_not_fail_checkout() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let broken = admin(&store, "broken@example.com").await;
        let working = admin(&store, "working@example.com").await;
        store.set_reject_notifications_for(broken).await;
        let product = create_product(&store, "F-1", 1000, 5).await;

        let order = service
            .create_order(delivery_form(0), &[snapshot(&product, 5)])
            .await
            .unwrap();

        assert!(store.find_order(order.id).await.unwrap().is_some());
        assert!(store.notifications_for(broken, false).await.unwrap().is_empty());
        assert_eq!(store.notifications_for(working, false).await.unwrap().len(), 2);
        assert_eq!(stock_of(&store, product.id).await, 0);
    }
}

mod administration {
    use super::*;

    async fn placed_order(
        store: &InMemoryStore,
        service: &OrderService<InMemoryStore>,
    ) -> (store::Order, Product) {
        let product = create_product(store, "ADM-1", 1000, 10).await;
        let order = service
            .create_order(delivery_form(0), &[snapshot(&product, 4)])
            .await
            .unwrap();
        (order, product)
    }

    #[tokio::test]
    async fn status_moves_through_lifecycle() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let (order, _) = placed_order(&store, &service).await;

        for status in [OrderStatus::Processing, OrderStatus::Shipped, OrderStatus::Delivered] {
            let updated = service.update_status(order.id, status).await.unwrap();
            assert_eq!(updated.status, status);
        }

        let result = service.update_status(order.id, OrderStatus::Cancelled).await;
        assert!(matches!(
            result,
            Err(OrderError::InvalidStatusTransition {
                from: OrderStatus::Delivered,
                to: OrderStatus::Cancelled
            })
        ));
    }

    #[tokio::test]
    async fn cancelling_restocks_items() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let (order, product) = placed_order(&store, &service).await;
        assert_eq!(stock_of(&store, product.id).await, 6);

        service
            .update_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let product = store.find_product(product.id).await.unwrap().unwrap();
        assert_eq!(product.stock_quantity, 10);
        assert_eq!(product.stock_status, StockStatus::LowStock);
    }

    #[tokio::test]
    async fn cancelling_skips_deleted_products() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let (order, product) = placed_order(&store, &service).await;
        store.delete_product(product.id).await.unwrap();

        let cancelled = service
            .update_status(order.id, OrderStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.items[0].product_id, None);
    }

    #[tokio::test]
    async fn unknown_order() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let missing = common::OrderId::new(404);

        assert!(matches!(
            service.get_order(missing).await,
            Err(OrderError::OrderNotFound(_))
        ));
        assert!(matches!(
            service.update_status(missing, OrderStatus::Processing).await,
            Err(OrderError::OrderNotFound(_))
        ));
        assert!(matches!(
            service.update_payment_status(missing, PaymentStatus::Paid).await,
            Err(OrderError::OrderNotFound(_))
        ));
    }

    #[tokio::test]
    async fn payment_status_and_listing() {
        let store = InMemoryStore::new();
        let service = create_service(&store);
        let (order, _) = placed_order(&store, &service).await;

        let paid = service
            .update_payment_status(order.id, PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);

        let found = service.find_by_number(&order.order_number).await.unwrap().unwrap();
        assert_eq!(found.id, order.id);

        let paid_orders = service
            .list_orders(OrderQuery::new().payment_status(PaymentStatus::Paid))
            .await
            .unwrap();
        assert_eq!(paid_orders.len(), 1);
        assert!(
            service
                .list_orders(OrderQuery::new().status(OrderStatus::Shipped))
                .await
                .unwrap()
                .is_empty()
        );
        assert_eq!(store.list_orders(OrderQuery::new()).await.unwrap().len(), 1);
    }
}

mod cart_to_order {
    use super::*;

    #[tokio::test]
    async fn cart_snapshot_drives_checkout() {
        let store = InMemoryStore::new();
        let carts = CartService::new(store.clone(), CartSettings::default());
        let orders = create_service(&store);
        let mug = create_product(&store, "MUG", 1500, 20).await;
        let plate = create_product(&store, "PLT", 2200, 20).await;

        let cart = carts.for_session(SessionId::new("checkout-session"));
        cart.add(mug.id, 2).await.unwrap();
        cart.add(plate.id, 1).await.unwrap();
        let summary = cart.summary().await.unwrap();

        let order = orders
            .create_order(delivery_form(0), &cart.snapshot().await.unwrap())
            .await
            .unwrap();

        assert_eq!(order.totals.subtotal, summary.subtotal);
        assert_eq!(order.item_count(), 2);
        assert_eq!(order.total_quantity(), 3);
        assert_eq!(stock_of(&store, mug.id).await, 18);
        assert_eq!(stock_of(&store, plate.id).await, 19);
    }

    #[tokio::test]
    async fn stale_cart_entries_are_dropped_before_checkout() {
        let store = InMemoryStore::new();
        let carts = CartService::new(store.clone(), CartSettings::default());
        let orders = create_service(&store);
        let kept = create_product(&store, "KEEP", 1000, 5).await;
        let removed = create_product(&store, "DROP", 1000, 5).await;

        let cart = carts.for_session(SessionId::new("stale"));
        cart.add(kept.id, 1).await.unwrap();
        cart.add(removed.id, 1).await.unwrap();
        store.delete_product(removed.id).await.unwrap();

        let lines = cart.snapshot().await.unwrap();
        assert_eq!(lines.len(), 1);

        let order = orders.create_order(delivery_form(0), &lines).await.unwrap();
        assert_eq!(order.items.len(), 1);
        assert_eq!(order.items[0].product_id, Some(kept.id));
    }
}

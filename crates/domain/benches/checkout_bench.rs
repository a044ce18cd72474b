use common::{Money, SessionId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    CartService, CartSettings, CartSnapshotLine, CheckoutForm, CheckoutSettings, OrderService,
};
use store::{CatalogStore, InMemoryStore, NewProduct, Product};

fn seed_products(
    rt: &tokio::runtime::Runtime,
    store: &InMemoryStore,
    count: usize,
) -> Vec<Product> {
    rt.block_on(async {
        let mut products = Vec::with_capacity(count);
        for i in 0..count {
            let product = NewProduct::new(
                format!("Bench product {i}"),
                format!("BENCH-{i}"),
                Money::from_cents(1000 + i as i64),
            )
            .with_stock(i32::MAX);
            products.push(store.create_product(product).await.unwrap());
        }
        products
    })
}

fn snapshot(products: &[Product]) -> Vec<CartSnapshotLine> {
    products
        .iter()
        .map(|p| CartSnapshotLine {
            product_id: p.id,
            quantity: 1,
            subtotal: p.final_price(),
        })
        .collect()
}

fn bench_checkout_single_line(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = seed_products(&rt, &store, 1);
    let service = OrderService::new(store, CheckoutSettings::default());
    let lines = snapshot(&products);

    c.bench_function("checkout/single_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                let form = CheckoutForm::pickup("Bench", "555", "cash");
                service.create_order(form, &lines).await.unwrap();
            });
        });
    });
}

fn bench_checkout_ten_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = seed_products(&rt, &store, 10);
    let service = OrderService::new(store, CheckoutSettings::default());
    let lines = snapshot(&products);

    c.bench_function("checkout/ten_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                let form = CheckoutForm::delivery("Bench", "555", "card", "Main St 1", "Town");
                service.create_order(form, &lines).await.unwrap();
            });
        });
    });
}

fn bench_cart_summary(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = seed_products(&rt, &store, 20);
    let carts = CartService::new(store, CartSettings::default());
    let cart = carts.for_session(SessionId::new("bench"));
    rt.block_on(async {
        for product in &products {
            cart.add(product.id, 1).await.unwrap();
        }
    });

    c.bench_function("cart/summary_twenty_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                cart.summary().await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_checkout_single_line,
    bench_checkout_ten_lines,
    bench_cart_summary,
);
criterion_main!(benches);

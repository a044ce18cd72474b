//! Storefront domain layer.
//!
//! - [`cart`]: session-scoped carts priced against the live catalog
//! - [`order`]: checkout (stock validation, atomic decrement, order numbering,
//!   totals, post-commit notifications) and administrative order changes

pub mod cart;
pub mod order;

pub use cart::{
    Cart, CartError, CartLine, CartService, CartSettings, CartSnapshotLine, CartSummary,
};
pub use order::{
    CheckoutForm, CheckoutSettings, OrderError, OrderService, PICKUP_ADDRESS, format_order_number,
};

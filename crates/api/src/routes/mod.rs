pub mod cart;
pub mod health;
pub mod metrics;
pub mod notifications;
pub mod orders;
pub mod products;

pub mod catalog;
pub mod error;
pub mod memory;
pub mod notification;
pub mod order;
pub mod postgres;
pub mod query;
pub mod store;
pub mod user;

pub use catalog::{
    Category, LOW_STOCK_THRESHOLD, NewCategory, NewProduct, Product, ProductChanges, StockStatus,
};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use notification::{NewNotification, Notification, NotificationKind};
pub use order::{
    DeliveryMethod, NewOrder, NewOrderItem, Order, OrderItem, OrderStatus, OrderTotals,
    PaymentStatus, ShippingAddress,
};
pub use postgres::PostgresStore;
pub use query::{OrderQuery, ProductQuery};
pub use store::{
    CartContents, CartSessionStore, CatalogStore, NotificationStore, OrderStore, Store,
    TransactionalStore, UnitOfWork, UserDirectory,
};
pub use user::{NewUser, Role, User};

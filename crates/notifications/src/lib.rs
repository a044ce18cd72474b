//! Notification dispatcher.
//!
//! Turns storefront events (new orders, stock running low) into one
//! notification record per administrator. Delivery is best effort: a failed
//! write for one recipient is logged and the fan-out moves on.

pub mod dispatcher;
pub mod error;

pub use dispatcher::NotificationDispatcher;
pub use error::{NotifyError, Result};

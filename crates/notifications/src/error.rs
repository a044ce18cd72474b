//! Notification error types.

use common::NotificationId;
use store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification not found: {0}")]
    NotFound(NotificationId),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, NotifyError>;

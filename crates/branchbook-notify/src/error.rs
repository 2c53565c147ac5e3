//! Notification error types.

use thiserror::Error;

use branchbook_db::DbError;

#[derive(Debug, Error)]
pub enum NotifyError {
    /// The sink could not deliver the notice. Retried with backoff.
    #[error("Delivery failed: {0}")]
    Delivery(String),

    /// The recipient or sender address is not a valid mailbox.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// An outbox payload is not an invoice notice.
    #[error("Invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Outbox error: {0}")]
    Outbox(#[from] DbError),

    #[error("Channel error: {0}")]
    ChannelError(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

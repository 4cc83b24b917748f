use thiserror::Error;

use crate::domain::OrderStatus;
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid status '{status}'. Must be one of: {}", OrderStatus::valid_values())]
    InvalidStatus { status: String },

    #[error("Order with ID {0} does not exist")]
    OrderNotFound(String),

    #[error("Order with ID {0} already exists")]
    OrderAlreadyExists(String),

    #[error("Order {order_id} cannot move from '{from}' to '{to}'")]
    InvalidTransition {
        order_id: String,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("Failed to write to ledger: {0}")]
    StoreWrite(String),

    #[error("Failed to read from ledger: {0}")]
    StoreRead(String),

    #[error("Failed to query ledger: {0}")]
    StoreQuery(String),

    #[error("Failed to serialize response: {0}")]
    Serialization(String),
}

impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Write(msg) => LedgerError::StoreWrite(msg),
            StoreError::Read(msg) => LedgerError::StoreRead(msg),
            StoreError::Query(msg) => LedgerError::StoreQuery(msg),
        }
    }
}

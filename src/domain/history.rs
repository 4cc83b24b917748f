use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Order;

/// A past version of an order, as recorded by the ledger store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Transaction that wrote this version
    pub tx_id: String,
    /// When the store committed the version
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
    /// Snapshot of the order as written by that transaction
    pub value: Order,
}

//! Versioned key-value ledger storage.
//!
//! The order service talks to persistence only through [`LedgerStore`]. Every write is
//! recorded as a new version of its key, so the full modification history of a key can
//! be read back. Two backends ship with the crate: an in-memory store for tests and
//! embedding, and a SQLite store for the CLI.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod memory;
mod query;
mod sqlite;

pub use memory::MemoryLedgerStore;
pub use query::*;
pub use sqlite::SqliteLedgerStore;

/// SQL migration for the world-state and key-history tables
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Write failed: {0}")]
    Write(String),

    #[error("Read failed: {0}")]
    Read(String),

    #[error("Query failed: {0}")]
    Query(String),
}

/// One committed version of a key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyModification {
    pub tx_id: String,
    pub timestamp: DateTime<Utc>,
    pub is_delete: bool,
    /// Empty for deletions
    pub value: Vec<u8>,
}

/// A key/value pair returned by a rich query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub key: String,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryResponse {
    pub records: Vec<QueryRecord>,
    pub fetched_records_count: usize,
    /// Continuation token for the next page
    pub bookmark: String,
}

/// Low-level interface every ledger backend implements.
///
/// Results are fully materialized before returning, so backends own the lifetime of
/// any cursor they open and release it on every path, including errors.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Write a new version of `key`.
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    /// Current value of `key`, or `None` if it was never written or has been deleted.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove the current value and record a deletion in the key's history.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Every version of `key`, oldest first. Unknown keys yield an empty list.
    async fn get_history(&self, key: &str) -> Result<Vec<KeyModification>, StoreError>;

    /// Run a rich query over current values, returning at most `page_size` records
    /// starting at `bookmark` (empty for the first page).
    async fn query_paginated(
        &self,
        query: &RichQuery,
        page_size: usize,
        bookmark: &str,
    ) -> Result<QueryResponse, StoreError>;
}

/// Fresh transaction id for a committed write.
pub(crate) fn new_tx_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

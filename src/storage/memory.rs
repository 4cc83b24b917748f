//! In-memory ledger store.
//!
//! Keeps every version of every key in a map guarded by a read-write lock.
//! Nothing survives the process, which makes it the store of choice for tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{
    new_tx_id, Bookmark, Cursor, KeyModification, LedgerStore, QueryRecord, QueryResponse, RichQuery,
    StoreError,
};

#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    versions: Arc<RwLock<HashMap<String, Vec<KeyModification>>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, value: Vec<u8>, is_delete: bool) -> KeyModification {
        KeyModification {
            tx_id: new_tx_id(),
            timestamp: Utc::now(),
            is_delete,
            value,
        }
    }
}

fn current_value(versions: &[KeyModification]) -> Option<&Vec<u8>> {
    versions
        .last()
        .filter(|latest| !latest.is_delete && !latest.value.is_empty())
        .map(|latest| &latest.value)
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        if key.is_empty() {
            return Err(StoreError::Write("Key must not be empty".to_string()));
        }

        let modification = self.record(value, false);
        let mut versions = self.versions.write().await;
        versions
            .entry(key.to_string())
            .or_default()
            .push(modification);
        tracing::debug!(key, "memory store put");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let versions = self.versions.read().await;
        Ok(versions
            .get(key)
            .and_then(|history| current_value(history))
            .cloned())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let modification = self.record(Vec::new(), true);
        let mut versions = self.versions.write().await;
        if let Some(history) = versions.get_mut(key) {
            history.push(modification);
            tracing::debug!(key, "memory store delete");
        }
        Ok(())
    }

    async fn get_history(&self, key: &str) -> Result<Vec<KeyModification>, StoreError> {
        let versions = self.versions.read().await;
        Ok(versions.get(key).cloned().unwrap_or_default())
    }

    async fn query_paginated(
        &self,
        query: &RichQuery,
        page_size: usize,
        bookmark: &str,
    ) -> Result<QueryResponse, StoreError> {
        query.validate()?;
        let start = Bookmark::decode(bookmark, query)?;

        let versions = self.versions.read().await;
        let mut matching: Vec<(&String, Value, &Vec<u8>)> = versions
            .iter()
            .filter_map(|(key, history)| {
                let bytes = current_value(history)?;
                // Values that are not JSON documents are invisible to rich queries.
                let document: Value = serde_json::from_slice(bytes).ok()?;
                query
                    .matches(&document)
                    .then_some((key, document, bytes))
            })
            .collect();

        matching.sort_by(|(key_a, doc_a, _), (key_b, doc_b, _)| {
            query.compare(doc_a, doc_b).then_with(|| key_a.cmp(key_b))
        });

        let page: Vec<(&String, Value, &Vec<u8>)> = matching
            .into_iter()
            .filter(|(key, document, _)| {
                start.position(query, document, key) == std::cmp::Ordering::Greater
            })
            .take(page_size)
            .collect();

        let next = match page.last() {
            Some((key, document, _)) => Bookmark::after(query, Cursor::of(query, document, key)),
            None => start,
        };

        let records: Vec<QueryRecord> = page
            .into_iter()
            .map(|(key, _, bytes)| QueryRecord {
                key: key.clone(),
                value: bytes.clone(),
            })
            .collect();

        Ok(QueryResponse {
            fetched_records_count: records.len(),
            records,
            bookmark: next.encode(),
        })
    }
}

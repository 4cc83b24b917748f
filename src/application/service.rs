use serde::de::DeserializeOwned;

use crate::config::{DuplicatePolicy, LedgerConfig};
use crate::domain::{
    build_integrity_report, HistoryEntry, IntegrityIssue, IntegrityReport, Order,
    OrderCreateRequest, OrderPage, OrderRecord, OrderStatus, OrderStatusUpdate, PageMetadata,
    StatusEvent,
};
use crate::storage::{
    LedgerStore, MemoryLedgerStore, QueryRecord, RichQuery, SortOrder, SqliteLedgerStore,
};

use super::LedgerError;

/// Field every order record carries; the listing query selects on it.
const ORDER_ID_FIELD: &str = "orderId";

/// Parameters of one listing call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page_size: usize,
    /// Empty for the first page
    pub bookmark: String,
    pub sort_field: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            bookmark: String::new(),
            sort_field: None,
            sort_order: None,
        }
    }

    pub fn after(mut self, bookmark: impl Into<String>) -> Self {
        self.bookmark = bookmark.into();
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_field = Some(field.into());
        self.sort_order = Some(order);
        self
    }

    /// Build a request from caller text. Empty sort arguments fall back to the defaults.
    pub fn parse(
        page_size: &str,
        bookmark: &str,
        sort_field: &str,
        sort_order: &str,
    ) -> Result<Self, LedgerError> {
        let size: i64 = page_size.trim().parse().map_err(|_| {
            LedgerError::MalformedInput(format!(
                "pageSize must be a valid integer, got '{}'",
                page_size
            ))
        })?;
        if size < 1 {
            return Err(LedgerError::MalformedInput(format!(
                "pageSize must be positive, got {}",
                size
            )));
        }

        let sort_order = match sort_order.trim() {
            "" => None,
            s => Some(SortOrder::from_str(s).ok_or_else(|| {
                LedgerError::MalformedInput(format!(
                    "sortOrder must be 'asc' or 'desc', got '{}'",
                    s
                ))
            })?),
        };
        let sort_field = Some(sort_field.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string);

        Ok(Self {
            page_size: usize::try_from(size).unwrap_or(usize::MAX),
            bookmark: bookmark.to_string(),
            sort_field,
            sort_order,
        })
    }
}

/// Parse a JSON text payload into `T`, reporting failures as malformed input.
pub fn parse_payload<T: DeserializeOwned>(input: &str, what: &str) -> Result<T, LedgerError> {
    serde_json::from_str(input)
        .map_err(|e| LedgerError::MalformedInput(format!("Failed to parse {}: {}", what, e)))
}

/// Order lifecycle service on top of a versioned ledger store.
/// This is the primary interface for any client (CLI, contract surface, tests).
///
/// The service keeps no state between calls: every operation is a function of the
/// store contents and its input.
pub struct OrderLedger {
    store: Box<dyn LedgerStore>,
    config: LedgerConfig,
}

impl OrderLedger {
    pub fn new(store: Box<dyn LedgerStore>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// Service backed by a fresh in-memory store.
    pub fn in_memory(config: LedgerConfig) -> Self {
        Self::new(Box::new(MemoryLedgerStore::new()), config)
    }

    /// Initialize a new SQLite ledger at the given path.
    pub async fn init(database_path: &str, config: LedgerConfig) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}?mode=rwc", database_path);
        let store = SqliteLedgerStore::init(&db_url).await?;
        Ok(Self::new(Box::new(store), config))
    }

    /// Connect to an existing SQLite ledger.
    pub async fn connect(database_path: &str, config: LedgerConfig) -> Result<Self, LedgerError> {
        let db_url = format!("sqlite:{}", database_path);
        let store = SqliteLedgerStore::connect(&db_url).await?;
        Ok(Self::new(Box::new(store), config))
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Direct access to the underlying store, for administrative operations.
    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    // ========================
    // Writes
    // ========================

    /// Create an order and persist it under its `orderId`.
    pub async fn create_order(&self, request: OrderCreateRequest) -> Result<Order, LedgerError> {
        if request.order_id.trim().is_empty() {
            return Err(LedgerError::MalformedInput(
                "orderId must not be empty".to_string(),
            ));
        }
        let status = parse_status(&request.status)?;

        if self.config.duplicate_policy == DuplicatePolicy::Reject
            && self.order_exists(&request.order_id).await?
        {
            return Err(LedgerError::OrderAlreadyExists(request.order_id));
        }

        let order = Order::from_request(request, status);
        self.write_order(&order).await?;

        tracing::info!(order_id = %order.order_id, status = %status, "order created");
        Ok(order)
    }

    /// Append a status event to an existing order and make it current.
    pub async fn update_order_status(
        &self,
        update: OrderStatusUpdate,
    ) -> Result<Order, LedgerError> {
        let status = parse_status(&update.status)?;
        let mut order = self.get_order(&update.order_id).await?;

        if self.config.enforce_transitions && !order.current_status.can_transition_to(status) {
            tracing::warn!(
                order_id = %order.order_id,
                from = %order.current_status,
                to = %status,
                "transition rejected"
            );
            return Err(LedgerError::InvalidTransition {
                order_id: order.order_id,
                from: order.current_status,
                to: status,
            });
        }

        order.record_status(StatusEvent::from_update(update, status));
        self.write_order(&order).await?;

        tracing::info!(
            order_id = %order.order_id,
            status = %status,
            history_len = order.status_history.len(),
            "order status updated"
        );
        Ok(order)
    }

    async fn write_order(&self, order: &Order) -> Result<(), LedgerError> {
        let bytes = order
            .to_json_bytes()
            .map_err(|e| LedgerError::Serialization(e.to_string()))?;
        self.store.put(&order.order_id, bytes).await?;
        Ok(())
    }

    // ========================
    // Reads
    // ========================

    /// Get the current record of an order.
    pub async fn get_order(&self, order_id: &str) -> Result<Order, LedgerError> {
        let bytes = self
            .store
            .get(order_id)
            .await?
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| LedgerError::OrderNotFound(order_id.to_string()))?;

        Order::from_json_bytes(&bytes).map_err(|e| {
            LedgerError::StoreRead(format!("Stored value for order {} is invalid: {}", order_id, e))
        })
    }

    pub async fn order_exists(&self, order_id: &str) -> Result<bool, LedgerError> {
        let value = self.store.get(order_id).await?;
        Ok(value.is_some_and(|bytes| !bytes.is_empty()))
    }

    /// Every stored version of an order, in store order.
    /// Deleted or empty versions are skipped; an unknown id yields an empty list.
    pub async fn get_order_history(&self, order_id: &str) -> Result<Vec<HistoryEntry>, LedgerError> {
        let modifications = self.store.get_history(order_id).await?;
        tracing::debug!(order_id, versions = modifications.len(), "read order history");

        modifications
            .into_iter()
            .filter(|modification| !modification.value.is_empty())
            .map(|modification| {
                let value = Order::from_json_bytes(&modification.value).map_err(|e| {
                    LedgerError::StoreRead(format!(
                        "History value of order {} in tx {} is invalid: {}",
                        order_id, modification.tx_id, e
                    ))
                })?;
                Ok(HistoryEntry {
                    tx_id: modification.tx_id,
                    timestamp: modification.timestamp,
                    is_delete: modification.is_delete,
                    value,
                })
            })
            .collect()
    }

    /// List orders one page at a time, sorted by the requested field.
    pub async fn list_orders(&self, request: PageRequest) -> Result<OrderPage, LedgerError> {
        if request.page_size == 0 {
            return Err(LedgerError::MalformedInput(
                "pageSize must be positive".to_string(),
            ));
        }
        let page_size = request.page_size.min(self.config.max_page_size);
        let sort_field = request
            .sort_field
            .unwrap_or_else(|| self.config.default_sort_field.clone());
        let sort_order = request
            .sort_order
            .unwrap_or(self.config.default_sort_order);

        let query = RichQuery::new()
            .field_exists(ORDER_ID_FIELD)
            .sort_by(sort_field, sort_order);
        tracing::debug!(query = %query.to_json_string(), page_size, "listing orders");

        let response = self
            .store
            .query_paginated(&query, page_size, &request.bookmark)
            .await?;

        let data = response
            .records
            .into_iter()
            .map(|QueryRecord { key, value }| {
                let record = Order::from_json_bytes(&value).map_err(|e| {
                    LedgerError::StoreQuery(format!("Record at key {} is not an order: {}", key, e))
                })?;
                Ok(OrderRecord { key, record })
            })
            .collect::<Result<Vec<_>, LedgerError>>()?;

        Ok(OrderPage {
            data,
            metadata: PageMetadata {
                fetched_records_count: response.fetched_records_count,
                bookmark: response.bookmark,
            },
        })
    }

    /// Listing entry point taking caller text, as exposed on the contract surface.
    pub async fn get_all_orders_with_pagination(
        &self,
        page_size: &str,
        bookmark: &str,
        sort_field: &str,
        sort_order: &str,
    ) -> Result<OrderPage, LedgerError> {
        let request = PageRequest::parse(page_size, bookmark, sort_field, sort_order)?;
        self.list_orders(request).await
    }

    /// Every order in the ledger, walking pages sorted by id.
    pub async fn list_all_orders(&self) -> Result<Vec<OrderRecord>, LedgerError> {
        let mut all = Vec::new();
        for QueryRecord { key, value } in self.scan_orders().await? {
            let record = Order::from_json_bytes(&value).map_err(|e| {
                LedgerError::StoreQuery(format!("Record at key {} is not an order: {}", key, e))
            })?;
            all.push(OrderRecord { key, record });
        }
        Ok(all)
    }

    // ========================
    // Integrity
    // ========================

    /// Walk every stored order and check the history invariants.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let mut unreadable = Vec::new();
        let mut orders = Vec::new();

        for QueryRecord { key, value } in self.scan_orders().await? {
            match Order::from_json_bytes(&value) {
                Ok(order) => orders.push((key, order)),
                Err(e) => unreadable.push(IntegrityIssue::Unreadable {
                    key,
                    reason: e.to_string(),
                }),
            }
        }

        let mut report =
            build_integrity_report(orders.iter().map(|(key, order)| (key.as_str(), order)));
        report.order_count += unreadable.len();
        report.issues.extend(unreadable);

        if !report.is_healthy() {
            tracing::warn!(issues = report.issues.len(), "integrity check found issues");
        }
        Ok(report)
    }

    /// Raw records of every order, fetched page by page.
    async fn scan_orders(&self) -> Result<Vec<QueryRecord>, LedgerError> {
        let page_size = self.config.max_page_size;
        let query = RichQuery::new()
            .field_exists(ORDER_ID_FIELD)
            .sort_by(ORDER_ID_FIELD, SortOrder::Asc);

        let mut records = Vec::new();
        let mut bookmark = String::new();
        loop {
            let response = self
                .store
                .query_paginated(&query, page_size, &bookmark)
                .await?;
            let fetched = response.fetched_records_count;
            records.extend(response.records);

            if fetched < page_size {
                break;
            }
            bookmark = response.bookmark;
        }
        Ok(records)
    }
}

fn parse_status(status: &str) -> Result<OrderStatus, LedgerError> {
    OrderStatus::from_str(status).ok_or_else(|| {
        tracing::warn!(status, "rejected unknown order status");
        LedgerError::InvalidStatus {
            status: status.to_string(),
        }
    })
}

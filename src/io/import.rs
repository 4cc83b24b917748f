use anyhow::{Context, Result};
use std::io::Read;

use crate::application::{LedgerError, OrderLedger};
use crate::domain::{OrderCreateRequest, OrderStatus};

/// Result of an import operation
#[derive(Debug, Clone, Default)]
pub struct ImportResult {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<ImportError>,
}

/// Error for a single entry of the input
#[derive(Debug, Clone)]
pub struct ImportError {
    /// Zero-based position in the input array
    pub index: usize,
    pub order_id: Option<String>,
    pub error: String,
}

/// Options for import operations
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Validate every entry without writing
    pub dry_run: bool,
    /// Leave orders that already exist untouched
    pub skip_existing: bool,
}

/// Importer for loading order creation requests into the ledger
pub struct Importer<'a> {
    ledger: &'a OrderLedger,
}

impl<'a> Importer<'a> {
    pub fn new(ledger: &'a OrderLedger) -> Self {
        Self { ledger }
    }

    /// Import a JSON array of creation requests.
    /// Bad entries are collected as errors; the rest are still imported.
    pub async fn import_orders_json<R: Read>(
        &self,
        reader: R,
        options: ImportOptions,
    ) -> Result<ImportResult> {
        let entries: Vec<serde_json::Value> =
            serde_json::from_reader(reader).context("Input must be a JSON array of orders")?;

        let mut result = ImportResult::default();

        for (index, entry) in entries.into_iter().enumerate() {
            let order_id = entry
                .get("orderId")
                .and_then(|v| v.as_str())
                .map(str::to_string);

            let request: OrderCreateRequest = match serde_json::from_value(entry) {
                Ok(request) => request,
                Err(e) => {
                    result.errors.push(ImportError {
                        index,
                        order_id,
                        error: format!("Malformed order: {}", e),
                    });
                    continue;
                }
            };

            if OrderStatus::from_str(&request.status).is_none() {
                let error = LedgerError::InvalidStatus {
                    status: request.status.clone(),
                };
                result.errors.push(ImportError {
                    index,
                    order_id,
                    error: error.to_string(),
                });
                continue;
            }

            if options.skip_existing && self.ledger.order_exists(&request.order_id).await? {
                result.skipped += 1;
                continue;
            }

            if options.dry_run {
                result.imported += 1;
                continue;
            }

            match self.ledger.create_order(request).await {
                Ok(_) => result.imported += 1,
                Err(e) => result.errors.push(ImportError {
                    index,
                    order_id,
                    error: e.to_string(),
                }),
            }
        }

        tracing::info!(
            imported = result.imported,
            skipped = result.skipped,
            errors = result.errors.len(),
            dry_run = options.dry_run,
            "order import finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::config::LedgerConfig;

    fn input() -> Vec<u8> {
        json!([
            {"orderId": "A", "status": "draft", "createdBy": "x", "statusTimestamp": "t0"},
            {"orderId": "B", "status": "lost", "createdBy": "x", "statusTimestamp": "t0"},
            {"orderId": "C", "status": "draft"},
            {"orderId": "D", "status": "therapy_requested", "createdBy": "x", "statusTimestamp": "t0"}
        ])
        .to_string()
        .into_bytes()
    }

    #[tokio::test]
    async fn test_import_collects_errors_and_continues() {
        let ledger = OrderLedger::in_memory(LedgerConfig::default());
        let result = Importer::new(&ledger)
            .import_orders_json(input().as_slice(), ImportOptions::default())
            .await
            .unwrap();

        assert_eq!(result.imported, 2);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].order_id.as_deref(), Some("B"));
        assert!(ledger.order_exists("A").await.unwrap());
        assert!(ledger.order_exists("D").await.unwrap());
    }

    #[tokio::test]
    async fn test_dry_run_writes_nothing() {
        let ledger = OrderLedger::in_memory(LedgerConfig::default());
        let options = ImportOptions {
            dry_run: true,
            ..Default::default()
        };
        let result = Importer::new(&ledger)
            .import_orders_json(input().as_slice(), options)
            .await
            .unwrap();

        assert_eq!(result.imported, 2);
        assert!(!ledger.order_exists("A").await.unwrap());
    }

    #[tokio::test]
    async fn test_skip_existing() {
        let ledger = OrderLedger::in_memory(LedgerConfig::default());
        let options = ImportOptions {
            skip_existing: true,
            ..Default::default()
        };
        let importer = Importer::new(&ledger);
        importer
            .import_orders_json(input().as_slice(), options.clone())
            .await
            .unwrap();

        let second = importer
            .import_orders_json(input().as_slice(), options)
            .await
            .unwrap();
        assert_eq!(second.imported, 0);
        assert_eq!(second.skipped, 2);
        assert_eq!(ledger.get_order_history("A").await.unwrap().len(), 1);
    }
}

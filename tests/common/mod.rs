// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use orderledger::application::OrderLedger;
use orderledger::config::LedgerConfig;
use orderledger::domain::{OrderCreateRequest, OrderStatus, OrderStatusUpdate};
use tempfile::TempDir;

/// Helper to create a ledger backed by a temporary SQLite database
pub async fn sqlite_ledger(config: LedgerConfig) -> Result<(OrderLedger, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let ledger = OrderLedger::init(db_path.to_str().unwrap(), config).await?;
    Ok((ledger, temp_dir))
}

/// Every backend under test, each with its own empty store.
/// The TempDir must be kept alive for the SQLite ledger.
pub async fn all_ledgers(config: LedgerConfig) -> Result<Vec<(&'static str, OrderLedger, Option<TempDir>)>> {
    let (sqlite, temp) = sqlite_ledger(config.clone()).await?;
    Ok(vec![
        ("memory", OrderLedger::in_memory(config), None),
        ("sqlite", sqlite, Some(temp)),
    ])
}

/// Standard creation payload with all descriptive fields filled in
pub fn order_request(order_id: &str, created_at: &str) -> OrderCreateRequest {
    OrderCreateRequest::new(order_id, OrderStatus::Draft, "hospital-admin", created_at)
        .with_therapy_type("car-t")
        .with_parties("MFR-1", "HOSP-1", "LOG-1")
        .with_slot_id(format!("SLOT-{}", order_id))
        .with_created_at(created_at)
        .with_certification("CCN-100", "CMS-200")
}

pub fn status_update(order_id: &str, status: OrderStatus, timestamp: &str) -> OrderStatusUpdate {
    OrderStatusUpdate::new(order_id, status.as_str(), "operator", timestamp)
}

/// Create `count` orders ORD-1..ORD-n with increasing createdAt dates
pub async fn seed_orders(ledger: &OrderLedger, count: usize) -> Result<()> {
    for i in 1..=count {
        let created_at = format!("2024-01-{:02}T08:00:00Z", i);
        ledger
            .create_order(order_request(&format!("ORD-{}", i), &created_at))
            .await?;
    }
    Ok(())
}

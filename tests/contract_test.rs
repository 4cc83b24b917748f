mod common;

use anyhow::Result;
use common::all_ledgers;
use orderledger::application::contract::{
    CREATE_ORDER, GET_ALL_ORDERS, GET_ALL_ORDERS_WITH_PAGINATION, GET_ORDER_HISTORY,
    UPDATE_ORDER_STATUS,
};
use orderledger::application::{LedgerError, OrderContract};
use orderledger::config::LedgerConfig;
use serde_json::{json, Value};

fn create_payload(order_id: &str, created_at: &str) -> String {
    json!({
        "orderId": order_id,
        "therapyType": "car-t",
        "manufacturerId": "MFR-1",
        "hospitalId": "HOSP-1",
        "logisticsId": "LOG-1",
        "slotId": "SLOT-1",
        "status": "draft",
        "createdBy": "hospital-admin",
        "statusTimestamp": created_at,
        "createdAt": created_at,
        "ccnCode": "CCN-1",
        "cmsCertNumber": "CMS-1"
    })
    .to_string()
}

#[tokio::test]
async fn test_text_payload_lifecycle() -> Result<()> {
    for (backend, ledger, _temp) in all_ledgers(LedgerConfig::default()).await? {
        let contract = OrderContract::new(&ledger);

        let created: Value = serde_json::from_str(
            &contract
                .invoke(CREATE_ORDER, &[create_payload("ORD-1", "2024-01-01T08:00:00Z")])
                .await?,
        )?;
        assert_eq!(created["currentStatus"], "draft", "{backend}");
        assert_eq!(
            created["statusHistory"],
            json!([{"status": "draft", "updatedBy": "hospital-admin", "timestamp": "2024-01-01T08:00:00Z"}])
        );

        let update = json!({
            "orderId": "ORD-1",
            "status": "entered-in-error",
            "updatedBy": "auditor",
            "timestamp": "2024-01-02T08:00:00Z",
            "reason": "duplicate booking"
        })
        .to_string();
        let updated: Value =
            serde_json::from_str(&contract.invoke(UPDATE_ORDER_STATUS, &[update]).await?)?;
        assert_eq!(updated["currentStatus"], "entered-in-error", "{backend}");
        assert_eq!(updated["statusHistory"][1]["reason"], "duplicate booking");

        let history: Value = serde_json::from_str(
            &contract
                .invoke(GET_ORDER_HISTORY, &["ORD-1".to_string()])
                .await?,
        )?;
        assert_eq!(history.as_array().map(Vec::len), Some(2), "{backend}");
    }
    Ok(())
}

#[tokio::test]
async fn test_paginated_listing_wire_shape() -> Result<()> {
    for (backend, ledger, _temp) in all_ledgers(LedgerConfig::default()).await? {
        let contract = OrderContract::new(&ledger);
        contract.create_order(&create_payload("A", "2024-01-01")).await?;
        contract.create_order(&create_payload("B", "2024-01-02")).await?;

        let page: Value = serde_json::from_str(
            &contract
                .invoke(
                    GET_ALL_ORDERS_WITH_PAGINATION,
                    &["1".to_string(), String::new()],
                )
                .await?,
        )?;

        assert_eq!(page["data"][0]["Key"], "B", "{backend}");
        assert_eq!(page["data"][0]["Record"]["orderId"], "B");
        assert_eq!(page["metadata"]["fetchedRecordsCount"], 1);
        assert!(page["metadata"]["bookmark"].is_string());
    }
    Ok(())
}

#[tokio::test]
async fn test_update_with_invalid_status_text() -> Result<()> {
    for (backend, ledger, _temp) in all_ledgers(LedgerConfig::default()).await? {
        let contract = OrderContract::new(&ledger);
        contract
            .create_order(&create_payload("ORD-1", "2024-01-01"))
            .await?;

        let update = json!({
            "orderId": "ORD-1",
            "status": "Shipped",
            "updatedBy": "x",
            "timestamp": "t"
        })
        .to_string();
        let result = contract.update_order_status(&update).await;
        assert!(
            matches!(result, Err(LedgerError::InvalidStatus { ref status }) if status == "Shipped"),
            "{backend}"
        );
    }
    Ok(())
}

#[tokio::test]
async fn test_get_all_orders_returns_every_record_unpaged() -> Result<()> {
    for (backend, ledger, _temp) in all_ledgers(LedgerConfig::default().with_max_page_size(2)).await? {
        let contract = OrderContract::new(&ledger);
        for id in ["C", "A", "B"] {
            contract.create_order(&create_payload(id, "2024-01-01")).await?;
        }

        let orders: Value = serde_json::from_str(&contract.invoke(GET_ALL_ORDERS, &[]).await?)?;
        let ids: Vec<_> = orders
            .as_array()
            .map(|list| list.iter().map(|o| o["orderId"].clone()).collect())
            .unwrap_or_default();
        assert_eq!(ids, vec![json!("A"), json!("B"), json!("C")], "{backend}");

        let result = contract
            .invoke(GET_ALL_ORDERS, &["extra".to_string()])
            .await;
        assert!(matches!(result, Err(LedgerError::MalformedInput(_))), "{backend}");
    }
    Ok(())
}

use anyhow::Result;
use std::io::Write;

use crate::application::OrderLedger;
use crate::domain::OrderRecord;

/// Exporter for writing every stored order in bulk formats
pub struct Exporter<'a> {
    ledger: &'a OrderLedger,
}

impl<'a> Exporter<'a> {
    pub fn new(ledger: &'a OrderLedger) -> Self {
        Self { ledger }
    }

    /// Export full order records (history included) as a JSON array
    pub async fn export_orders_json<W: Write>(&self, mut writer: W) -> Result<usize> {
        let records = self.ledger.list_all_orders().await?;
        let orders: Vec<_> = records.iter().map(|r| &r.record).collect();

        serde_json::to_writer_pretty(&mut writer, &orders)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(orders.len())
    }

    /// Export one summary row per order to CSV format
    pub async fn export_orders_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let records = self.ledger.list_all_orders().await?;
        write_orders_csv(&records, writer)
    }
}

fn write_orders_csv<W: Write>(records: &[OrderRecord], writer: W) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "order_id",
        "therapy_type",
        "manufacturer_id",
        "hospital_id",
        "logistics_id",
        "slot_id",
        "current_status",
        "created_at",
        "ccn_code",
        "cms_cert_number",
        "history_length",
        "last_updated_by",
        "last_timestamp",
    ])?;

    for OrderRecord { record: order, .. } in records {
        let last = order.last_event();
        csv_writer.write_record([
            order.order_id.clone(),
            order.therapy_type.clone().unwrap_or_default(),
            order.manufacturer_id.clone().unwrap_or_default(),
            order.hospital_id.clone().unwrap_or_default(),
            order.logistics_id.clone().unwrap_or_default(),
            order.slot_id.clone().unwrap_or_default(),
            order.current_status.to_string(),
            order.created_at.clone().unwrap_or_default(),
            order.ccn_code.clone().unwrap_or_default(),
            order.cms_cert_number.clone().unwrap_or_default(),
            order.status_history.len().to_string(),
            last.map(|e| e.updated_by.clone()).unwrap_or_default(),
            last.map(|e| e.timestamp.clone()).unwrap_or_default(),
        ])?;
    }

    csv_writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::domain::{OrderCreateRequest, OrderStatus, OrderStatusUpdate};

    async fn seeded_ledger() -> OrderLedger {
        let ledger = OrderLedger::in_memory(LedgerConfig::default());
        ledger
            .create_order(
                OrderCreateRequest::new("ORD-1", OrderStatus::Draft, "admin", "t0")
                    .with_therapy_type("car-t")
                    .with_created_at("2024-01-01"),
            )
            .await
            .unwrap();
        ledger
            .update_order_status(OrderStatusUpdate::new(
                "ORD-1",
                "therapy_requested",
                "doctor",
                "t1",
            ))
            .await
            .unwrap();
        ledger
    }

    #[tokio::test]
    async fn test_export_csv() {
        let ledger = seeded_ledger().await;
        let mut buffer = Vec::new();

        let count = Exporter::new(&ledger)
            .export_orders_csv(&mut buffer)
            .await
            .unwrap();

        assert_eq!(count, 1);
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        assert!(lines.next().unwrap().starts_with("order_id,therapy_type"));
        assert_eq!(
            lines.next().unwrap(),
            "ORD-1,car-t,,,,,therapy_requested,2024-01-01,,,2,doctor,t1"
        );
    }

    #[tokio::test]
    async fn test_export_json() {
        let ledger = seeded_ledger().await;
        let mut buffer = Vec::new();

        let count = Exporter::new(&ledger)
            .export_orders_json(&mut buffer)
            .await
            .unwrap();

        assert_eq!(count, 1);
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
        assert_eq!(value[0]["orderId"], "ORD-1");
        assert_eq!(value[0]["statusHistory"].as_array().unwrap().len(), 2);
    }
}

use std::collections::BTreeMap;

use serde::Serialize;

use super::{Order, OrderStatus};

/// Problems found while walking the stored orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum IntegrityIssue {
    Unreadable {
        key: String,
        reason: String,
    },
    EmptyHistory {
        order_id: String,
    },
    StatusMismatch {
        order_id: String,
        current: OrderStatus,
        last_recorded: OrderStatus,
    },
    KeyMismatch {
        key: String,
        order_id: String,
    },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::Unreadable { key, reason } => {
                write!(f, "Key {} does not hold a readable order: {}", key, reason)
            }
            IntegrityIssue::EmptyHistory { order_id } => {
                write!(f, "Order {} has an empty status history", order_id)
            }
            IntegrityIssue::StatusMismatch {
                order_id,
                current,
                last_recorded,
            } => write!(
                f,
                "Order {} has current status '{}' but last recorded status '{}'",
                order_id, current, last_recorded
            ),
            IntegrityIssue::KeyMismatch { key, order_id } => {
                write!(f, "Key {} holds order {}", key, order_id)
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub order_count: usize,
    pub status_counts: BTreeMap<OrderStatus, usize>,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Check every (key, order) pair against the history invariants.
pub fn build_integrity_report<'a, I>(records: I) -> IntegrityReport
where
    I: IntoIterator<Item = (&'a str, &'a Order)>,
{
    let mut report = IntegrityReport::default();

    for (key, order) in records {
        report.order_count += 1;
        *report.status_counts.entry(order.current_status).or_insert(0) += 1;

        if key != order.order_id {
            report.issues.push(IntegrityIssue::KeyMismatch {
                key: key.to_string(),
                order_id: order.order_id.clone(),
            });
        }

        match order.last_event() {
            None => report.issues.push(IntegrityIssue::EmptyHistory {
                order_id: order.order_id.clone(),
            }),
            Some(last) if last.status != order.current_status => {
                report.issues.push(IntegrityIssue::StatusMismatch {
                    order_id: order.order_id.clone(),
                    current: order.current_status,
                    last_recorded: last.status,
                })
            }
            Some(_) => {}
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderCreateRequest, StatusEvent};

    fn make_order(id: &str) -> Order {
        Order::from_request(
            OrderCreateRequest::new(id, OrderStatus::Draft, "admin", "t0"),
            OrderStatus::Draft,
        )
    }

    #[test]
    fn test_healthy_orders() {
        let a = make_order("A");
        let mut b = make_order("B");
        b.record_status(StatusEvent::new(OrderStatus::TherapyRequested, "doc", "t1"));

        let report = build_integrity_report([("A", &a), ("B", &b)]);

        assert!(report.is_healthy());
        assert_eq!(report.order_count, 2);
        assert_eq!(report.status_counts.get(&OrderStatus::Draft), Some(&1));
        assert_eq!(
            report.status_counts.get(&OrderStatus::TherapyRequested),
            Some(&1)
        );
    }

    #[test]
    fn test_detects_status_mismatch() {
        let mut order = make_order("A");
        order.current_status = OrderStatus::Completed;

        let report = build_integrity_report([("A", &order)]);

        assert_eq!(
            report.issues,
            vec![IntegrityIssue::StatusMismatch {
                order_id: "A".into(),
                current: OrderStatus::Completed,
                last_recorded: OrderStatus::Draft,
            }]
        );
    }

    #[test]
    fn test_detects_empty_history_and_key_mismatch() {
        let mut order = make_order("A");
        order.status_history.clear();

        let report = build_integrity_report([("other-key", &order)]);

        assert!(!report.is_healthy());
        assert_eq!(report.issues.len(), 2);
        assert!(matches!(report.issues[0], IntegrityIssue::KeyMismatch { .. }));
        assert!(matches!(report.issues[1], IntegrityIssue::EmptyHistory { .. }));
    }
}

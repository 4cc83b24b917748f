//! Text-payload operation surface.
//!
//! A transaction layer invokes operations by name with string arguments and receives
//! JSON text back, the way a smart-contract runtime calls into chaincode.

use serde::Serialize;

use crate::domain::{OrderCreateRequest, OrderStatusUpdate};

use super::{parse_payload, LedgerError, OrderLedger};

pub const CREATE_ORDER: &str = "createOrder";
pub const UPDATE_ORDER_STATUS: &str = "updateOrderStatus";
pub const GET_ORDER: &str = "getOrder";
pub const ORDER_EXISTS: &str = "orderExists";
pub const GET_ORDER_HISTORY: &str = "getOrderHistory";
pub const GET_ALL_ORDERS: &str = "getAllOrders";
pub const GET_ALL_ORDERS_WITH_PAGINATION: &str = "getAllOrdersWithPagination";
pub const CHECK_INTEGRITY: &str = "checkIntegrity";

/// Every function name accepted by [`OrderContract::invoke`].
pub const FUNCTIONS: [&str; 8] = [
    CREATE_ORDER,
    UPDATE_ORDER_STATUS,
    GET_ORDER,
    ORDER_EXISTS,
    GET_ORDER_HISTORY,
    GET_ALL_ORDERS,
    GET_ALL_ORDERS_WITH_PAGINATION,
    CHECK_INTEGRITY,
];

pub struct OrderContract<'a> {
    ledger: &'a OrderLedger,
}

impl<'a> OrderContract<'a> {
    pub fn new(ledger: &'a OrderLedger) -> Self {
        Self { ledger }
    }

    /// Dispatch `function` with its text arguments and return the JSON response.
    pub async fn invoke(&self, function: &str, args: &[String]) -> Result<String, LedgerError> {
        tracing::debug!(function, args = args.len(), "contract invoke");

        match function {
            CREATE_ORDER => self.create_order(single_arg(function, args)?).await,
            UPDATE_ORDER_STATUS => self.update_order_status(single_arg(function, args)?).await,
            GET_ORDER => {
                let order = self.ledger.get_order(single_arg(function, args)?).await?;
                to_payload(&order)
            }
            ORDER_EXISTS => {
                let exists = self.ledger.order_exists(single_arg(function, args)?).await?;
                to_payload(&exists)
            }
            GET_ORDER_HISTORY => {
                let history = self
                    .ledger
                    .get_order_history(single_arg(function, args)?)
                    .await?;
                to_payload(&history)
            }
            GET_ALL_ORDERS => {
                if !args.is_empty() {
                    return Err(arity_error(function, "0", args.len()));
                }
                let orders: Vec<_> = self
                    .ledger
                    .list_all_orders()
                    .await?
                    .into_iter()
                    .map(|record| record.record)
                    .collect();
                to_payload(&orders)
            }
            GET_ALL_ORDERS_WITH_PAGINATION => {
                if args.is_empty() || args.len() > 4 {
                    return Err(arity_error(function, "1 to 4", args.len()));
                }
                let arg = |i: usize| args.get(i).map(String::as_str).unwrap_or("");
                let page = self
                    .ledger
                    .get_all_orders_with_pagination(arg(0), arg(1), arg(2), arg(3))
                    .await?;
                to_payload(&page)
            }
            CHECK_INTEGRITY => {
                if !args.is_empty() {
                    return Err(arity_error(function, "0", args.len()));
                }
                let report = self.ledger.check_integrity().await?;
                to_payload(&report)
            }
            _ => Err(LedgerError::MalformedInput(format!(
                "Unknown function '{}'. Must be one of: {}",
                function,
                FUNCTIONS.join(", ")
            ))),
        }
    }

    pub async fn create_order(&self, input: &str) -> Result<String, LedgerError> {
        let request: OrderCreateRequest = parse_payload(input, "order data")?;
        let order = self.ledger.create_order(request).await?;
        to_payload(&order)
    }

    pub async fn update_order_status(&self, input: &str) -> Result<String, LedgerError> {
        let update: OrderStatusUpdate = parse_payload(input, "status update data")?;
        let order = self.ledger.update_order_status(update).await?;
        to_payload(&order)
    }
}

fn single_arg<'s>(function: &str, args: &'s [String]) -> Result<&'s str, LedgerError> {
    match args {
        [arg] => Ok(arg.as_str()),
        _ => Err(arity_error(function, "1", args.len())),
    }
}

fn arity_error(function: &str, expected: &str, got: usize) -> LedgerError {
    LedgerError::MalformedInput(format!(
        "{} expects {} argument(s), got {}",
        function, expected, got
    ))
}

fn to_payload<T: Serialize + ?Sized>(value: &T) -> Result<String, LedgerError> {
    serde_json::to_string(value).map_err(|e| LedgerError::Serialization(e.to_string()))
}

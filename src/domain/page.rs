use serde::{Deserialize, Serialize};

use super::Order;

/// An order paired with the store key it was read from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    #[serde(rename = "Key")]
    pub key: String,
    #[serde(rename = "Record")]
    pub record: Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub fetched_records_count: usize,
    /// Pass back to fetch the following page
    pub bookmark: String,
}

/// One page of a sorted order listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPage {
    pub data: Vec<OrderRecord>,
    pub metadata: PageMetadata,
}

impl OrderPage {
    pub fn keys(&self) -> Vec<&str> {
        self.data.iter().map(|r| r.key.as_str()).collect()
    }
}

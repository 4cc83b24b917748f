//! Runtime configuration for the order service.
//!
//! Resolved once at startup (from CLI flags and environment in the binary) and passed
//! into [`OrderLedger`](crate::application::OrderLedger).

use crate::storage::SortOrder;

/// What creating an order does when the key is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Replace the stored record, history included
    #[default]
    Overwrite,
    /// Fail with `OrderAlreadyExists`
    Reject,
}

impl DuplicatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicatePolicy::Overwrite => "overwrite",
            DuplicatePolicy::Reject => "reject",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "overwrite" => Some(DuplicatePolicy::Overwrite),
            "reject" => Some(DuplicatePolicy::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    pub duplicate_policy: DuplicatePolicy,
    /// Check updates against the status transition graph
    pub enforce_transitions: bool,
    pub default_sort_field: String,
    pub default_sort_order: SortOrder,
    /// Upper bound applied to requested page sizes
    pub max_page_size: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            duplicate_policy: DuplicatePolicy::Overwrite,
            enforce_transitions: false,
            default_sort_field: "createdAt".to_string(),
            default_sort_order: SortOrder::Desc,
            max_page_size: 1000,
        }
    }
}

impl LedgerConfig {
    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn with_enforced_transitions(mut self, enforce: bool) -> Self {
        self.enforce_transitions = enforce;
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: usize) -> Self {
        self.max_page_size = max_page_size.max(1);
        self
    }
}

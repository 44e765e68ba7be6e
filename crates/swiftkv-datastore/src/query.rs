//! Query descriptions and result entries.

use crate::error::{DatastoreError, DatastoreResult};
use crate::key::Key;

/// Comparison operator used by filters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

/// Result filter. Expressible, never evaluated: listing cannot filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    KeyCompare { op: CompareOp, key: Key },
    KeyPrefix(String),
    ValueCompare { op: CompareOp, value: Vec<u8> },
}

/// Result ordering. Expressible, never evaluated: results come in listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    KeyAscending,
    KeyDescending,
    ValueAscending,
    ValueDescending,
}

/// A prefix scan with offset/limit pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    /// Raw key prefix, e.g. `/a/`; matched as a plain string prefix
    pub prefix: String,
    /// Entries to skip before emitting
    pub offset: usize,
    /// Maximum entries to emit; 0 means unbounded
    pub limit: usize,
    /// Skip value fetches
    pub keys_only: bool,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
}

impl Query {
    /// Query every key under `prefix`.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), ..Default::default() }
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn keys_only(mut self) -> Self {
        self.keys_only = true;
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    /// Reject features the listing API cannot provide.
    pub fn check_supported(&self) -> DatastoreResult<()> {
        if !self.filters.is_empty() || !self.orders.is_empty() {
            return Err(DatastoreError::UnsupportedQuery(format!(
                "swift datastore supports neither filters ({}) nor orders ({})",
                self.filters.len(),
                self.orders.len()
            )));
        }
        Ok(())
    }
}

/// One query result. `value` is `None` for keys-only queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: Key,
    pub value: Option<Vec<u8>>,
}

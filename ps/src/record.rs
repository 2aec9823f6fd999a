//! Record trait and query filters

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Current time as Unix milliseconds
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A value stored in the secondary index table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexValue {
    String(String),
    Int(i64),
    Bool(bool),
}

impl IndexValue {
    /// Column of `record_indexes` holding this kind of value
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::String(_) => "value_str",
            Self::Int(_) => "value_int",
            Self::Bool(_) => "value_bool",
        }
    }

    pub(crate) fn to_sql_value(&self) -> rusqlite::types::Value {
        match self {
            Self::String(s) => rusqlite::types::Value::Text(s.clone()),
            Self::Int(i) => rusqlite::types::Value::Integer(*i),
            Self::Bool(b) => rusqlite::types::Value::Integer(i64::from(*b)),
        }
    }
}

impl From<&str> for IndexValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for IndexValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<bool> for IndexValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// Comparison operator for a filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Lt,
}

impl FilterOp {
    pub(crate) fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
        }
    }
}

/// Filter on an indexed field
#[derive(Debug, Clone)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: IndexValue,
}

impl Filter {
    /// Equality filter, the common case
    pub fn eq(field: impl Into<String>, value: impl Into<IndexValue>) -> Self {
        Self {
            field: field.into(),
            op: FilterOp::Eq,
            value: value.into(),
        }
    }
}

/// A document that can be persisted in the store
///
/// Records are serialized as JSON. `indexed_fields` returns the values that
/// `Store::list` can filter on; anything not returned there is only reachable
/// by loading the document.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique id within the collection
    fn id(&self) -> &str;

    /// Last modification time (Unix milliseconds)
    fn updated_at(&self) -> i64;

    /// Collection (table namespace) for this record type
    fn collection_name() -> &'static str;

    /// Secondary index values
    fn indexed_fields(&self) -> HashMap<String, IndexValue>;
}

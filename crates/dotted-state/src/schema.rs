//! Record schema as persisted by the store
//!
//! One flat collection of `{ ID, data }` documents. ID uniqueness is the
//! store's job; no version metadata is kept.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection used when none is configured.
pub const DEFAULT_COLLECTION: &str = "json";

/// A top-level entry: unique ID plus an arbitrary nested document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    #[serde(rename = "ID")]
    pub id: String,
    pub data: Value,
}

impl Record {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }
}

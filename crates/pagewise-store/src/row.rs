//! Rows returned by a store.

use pagewise_core::{Identified, PageResult, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Rows of one read plus the exact total, when it was requested.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub rows: Vec<Value>,
    pub total: Option<u64>,
}

impl RowSet {
    pub fn new(rows: Vec<Value>, total: Option<u64>) -> Self {
        Self { rows, total }
    }

    /// Deserializes every row into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<PageResult<T>> {
        let items = self
            .rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<T>, _>>()?;

        let mut page = PageResult::new(items);
        page.total_count = self.total;
        Ok(page)
    }
}

/// An untyped row identified by its `id` column.
///
/// Rows without an `id` are identified by their full JSON text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Value);

impl Record {
    /// Returns the value of `column`.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.get(column)
    }

    pub fn into_inner(self) -> Value {
        self.0
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl Identified for Record {
    type Id = String;

    fn id(&self) -> String {
        match self.0.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Null) | None => self.0.to_string(),
            Some(other) => other.to_string(),
        }
    }
}

//! In-process tables evaluating [`ListQuery`] semantics.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use pagewise_core::{Error, Result};
use serde_json::{Map, Value};

use crate::{
    CompareOp, CountMode, Filter, ListQuery, RowSet, RowStore, SortBy, SortOrder,
    TRACING_TARGET_MEMORY,
};

/// Tables of JSON rows held in memory.
///
/// Ties in the requested sort are broken by `id`, so paging over an
/// unchanged table never repeats or skips rows. Cheap to clone; clones share
/// the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<Value>>> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<Value>>> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a row to `table`.
    pub fn insert(&self, table: &str, row: Value) {
        self.write().entry(table.to_owned()).or_default().push(row);
    }

    /// Appends rows to `table`.
    pub fn extend(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
        self.write().entry(table.to_owned()).or_default().extend(rows);
    }

    /// Merges the fields of `patch` into the row whose `id` equals `id`.
    ///
    /// Returns false when no such row exists.
    pub fn update(&self, table: &str, id: &Value, patch: Map<String, Value>) -> bool {
        let mut tables = self.write();
        let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row.get("id") == Some(id)))
        else {
            return false;
        };

        if let Value::Object(fields) = row {
            fields.extend(patch);
        }
        true
    }

    /// Removes the row whose `id` equals `id`.
    pub fn remove(&self, table: &str, id: &Value) -> bool {
        let mut tables = self.write();
        let Some(rows) = tables.get_mut(table) else {
            return false;
        };
        let before = rows.len();
        rows.retain(|row| row.get("id") != Some(id));
        rows.len() != before
    }

    /// Returns the number of rows in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.read().get(table).map_or(0, Vec::len)
    }

    /// Returns whether `table` holds no rows.
    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

#[async_trait::async_trait]
impl RowStore for MemoryStore {
    async fn select(&self, query: &ListQuery) -> Result<RowSet> {
        let tables = self.read();
        let mut rows: Vec<&Value> = Vec::new();
        if let Some(table) = tables.get(&query.table) {
            rows.extend(
                table
                    .iter()
                    .filter(|row| query.filters.iter().all(|filter| matches(row, filter))),
            );
        }
        rows.sort_by(|a, b| order(a, b, &query.sort));

        let total = rows.len() as u64;
        let selected: Vec<Value> = match query.range {
            Some((from, to)) if to < from => {
                return Err(Error::invalid_input()
                    .with_message(format!("Invalid range {from}-{to}"))
                    .with_context(query.table.clone()));
            }
            Some((from, _)) if from > 0 && from >= total => {
                tracing::debug!(
                    target: TRACING_TARGET_MEMORY,
                    table = %query.table,
                    from,
                    total,
                    "Range starts past the last row"
                );
                return Err(Error::range_not_satisfiable()
                    .with_message(format!("Requested range starts at {from}, {total} rows match"))
                    .with_context(query.table.clone()));
            }
            Some((from, to)) => rows
                .into_iter()
                .skip(from as usize)
                .take((to - from + 1) as usize)
                .map(|row| project(row, &query.select))
                .collect(),
            None => rows
                .into_iter()
                .map(|row| project(row, &query.select))
                .collect(),
        };

        tracing::debug!(
            target: TRACING_TARGET_MEMORY,
            table = %query.table,
            rows = selected.len(),
            total,
            "Selected rows"
        );

        let total = (query.count == CountMode::Exact).then_some(total);
        Ok(RowSet::new(selected, total))
    }
}

/// Returns the non-null value of `column`.
fn column<'a>(row: &'a Value, column: &str) -> Option<&'a Value> {
    row.get(column).filter(|value| !value.is_null())
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Number(a), Value::String(b)) => a.as_f64()?.partial_cmp(&b.parse::<f64>().ok()?),
        (Value::String(a), Value::Number(b)) => a.parse::<f64>().ok()?.partial_cmp(&b.as_f64()?),
        _ => None,
    }
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn matches(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Compare { column: name, op, value } => column(row, name)
            .and_then(|actual| compare_values(actual, value))
            .is_some_and(|ordering| match op {
                CompareOp::Eq => ordering.is_eq(),
                CompareOp::Neq => ordering.is_ne(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Gte => ordering.is_ge(),
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Lte => ordering.is_le(),
            }),
        Filter::ILike { column: name, pattern } => {
            column(row, name).is_some_and(|actual| ilike(&text(actual), pattern))
        }
        Filter::In { column: name, values } => column(row, name).is_some_and(|actual| {
            values
                .iter()
                .any(|value| compare_values(actual, value).is_some_and(Ordering::is_eq))
        }),
        Filter::IsNull { column: name, negated } => column(row, name).is_none() != *negated,
        Filter::Search { columns, term } => {
            let pattern = format!("%{term}%");
            columns.iter().any(|name| {
                column(row, name).is_some_and(|actual| ilike(&text(actual), &pattern))
            })
        }
    }
}

/// Case-insensitive SQL `ILIKE`: `%` matches any run, `_` one character.
fn ilike(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern: Vec<char> = pattern.to_lowercase().chars().collect();

    let (mut t, mut p) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            backtrack = Some((p, t));
            p += 1;
        } else if let Some((star, resume)) = backtrack {
            p = star + 1;
            t = resume + 1;
            backtrack = Some((star, resume + 1));
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == '%')
}

/// Postgres ordering: nulls sort last ascending and first descending.
fn order(a: &Value, b: &Value, sort: &[SortBy]) -> Ordering {
    for key in sort {
        let ordering = match (column(a, &key.field), column(b, &key.field)) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => compare_values(a, b).unwrap_or(Ordering::Equal),
        };
        let ordering = match key.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        };
        if ordering.is_ne() {
            return ordering;
        }
    }

    match (column(a, "id"), column(b, "id")) {
        (Some(a), Some(b)) => compare_values(a, b).unwrap_or_else(|| text(a).cmp(&text(b))),
        _ => Ordering::Equal,
    }
}

/// Applies a comma-separated column list; `*` keeps the whole row.
/// Embedded resources are not resolved.
fn project(row: &Value, select: &str) -> Value {
    let columns: Vec<&str> = select.split(',').map(str::trim).collect();
    if columns.contains(&"*") {
        return row.clone();
    }

    let fields = columns
        .into_iter()
        .filter(|name| !name.contains('('))
        .filter_map(|name| row.get(name).map(|value| (name.to_owned(), value.clone())))
        .collect::<Map<String, Value>>();
    Value::Object(fields)
}

//! User-facing list filters.

use std::collections::BTreeMap;

use jiff::civil::Date;
use pagewise_store::{Filter, SortBy};
use serde::{Deserialize, Serialize};

use crate::ListResource;

/// Equality value meaning "do not filter on this column".
pub const MATCH_ALL: &str = "all";

/// Filter state of one list screen.
///
/// The whole value is serialized into the query key, so any change yields a
/// different key. Equality filters live in a sorted map to keep that
/// serialization stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilter {
    /// Free-text search over the resource's searchable columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    /// Column equality filters. [`MATCH_ALL`] disables a column.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub equals: BTreeMap<String, String>,
    /// Inclusive lower bound on the date column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<Date>,
    /// Inclusive upper bound on the date column.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<Date>,
    /// Overrides the resource's default sort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortBy>,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = Some(search.into());
        self
    }

    #[must_use]
    pub fn with_equals(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.equals.insert(column.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_date_range(mut self, from: Option<Date>, to: Option<Date>) -> Self {
        self.date_from = from;
        self.date_to = to;
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: SortBy) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Returns the trimmed search term, if any.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }

    /// Translates the filter into store predicates for `resource`.
    pub fn predicates(&self, resource: &ListResource) -> Vec<Filter> {
        let mut filters = Vec::new();

        if let Some(term) = self.search_term() {
            filters.push(Filter::search(resource.search_columns.iter().copied(), term));
        }

        for (column, value) in &self.equals {
            if value.is_empty() || value == MATCH_ALL {
                continue;
            }
            filters.push(Filter::eq(column.as_str(), value.as_str()));
        }

        if let Some(from) = self.date_from {
            filters.push(Filter::gte(resource.date_column, from.to_string()));
        }
        if let Some(to) = self.date_to {
            // Timestamps on the last day compare greater than the bare date.
            match to.tomorrow() {
                Ok(next) => filters.push(Filter::lt(resource.date_column, next.to_string())),
                Err(_) => filters.push(Filter::lte(resource.date_column, to.to_string())),
            }
        }

        filters
    }

    /// Returns the effective sort for `resource`.
    pub fn sort_for(&self, resource: &ListResource) -> SortBy {
        self.sort.clone().unwrap_or_else(|| resource.default_sort())
    }
}

//! Store-agnostic description of one bounded list read.

use pagewise_core::PageWindow;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// One row predicate. All filters of a query must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    /// `column <op> value`. Rows where the column is missing or null never
    /// match.
    Compare {
        column: String,
        op: CompareOp,
        value: Value,
    },
    /// Case-insensitive pattern match; `%` matches any run, `_` one character.
    ILike { column: String, pattern: String },
    /// Column equals one of `values`.
    In { column: String, values: Vec<Value> },
    /// Column is null (or, when `negated`, is not null).
    IsNull { column: String, negated: bool },
    /// Free-text search: any of `columns` contains `term`, case-insensitively.
    Search { columns: Vec<String>, term: String },
}

impl Filter {
    fn compare(column: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self::Compare {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, value)
    }

    pub fn neq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Neq, value)
    }

    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, value)
    }

    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gte, value)
    }

    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, value)
    }

    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lte, value)
    }

    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::ILike {
            column: column.into(),
            pattern: pattern.into(),
        }
    }

    pub fn is_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        Self::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: false,
        }
    }

    pub fn not_null(column: impl Into<String>) -> Self {
        Self::IsNull {
            column: column.into(),
            negated: true,
        }
    }

    /// Matches rows where any of `columns` contains `term`.
    pub fn search<C: Into<String>>(
        columns: impl IntoIterator<Item = C>,
        term: impl Into<String>,
    ) -> Self {
        Self::Search {
            columns: columns.into_iter().map(Into::into).collect(),
            term: term.into(),
        }
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, AsRefStr, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortBy {
    pub field: String,
    pub order: SortOrder,
}

impl SortBy {
    pub fn new(field: impl Into<String>, order: SortOrder) -> Self {
        Self {
            field: field.into(),
            order,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Asc)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Desc)
    }
}

/// Whether the store should report the total number of matching rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum CountMode {
    #[default]
    None,
    Exact,
}

/// A bounded read: table, projection, filters, sort, row range and count mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListQuery {
    pub table: String,
    /// Projection; `*` selects every column.
    pub select: String,
    pub filters: Vec<Filter>,
    pub sort: Vec<SortBy>,
    /// Inclusive `(from, to)` row range.
    pub range: Option<(u64, u64)>,
    pub count: CountMode,
}

impl ListQuery {
    /// Creates an unfiltered query selecting every column of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            select: "*".to_owned(),
            filters: Vec::new(),
            sort: Vec::new(),
            range: None,
            count: CountMode::None,
        }
    }

    #[must_use]
    pub fn select(mut self, select: impl Into<String>) -> Self {
        self.select = select.into();
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn filters(mut self, filters: impl IntoIterator<Item = Filter>) -> Self {
        self.filters.extend(filters);
        self
    }

    #[must_use]
    pub fn order(mut self, sort: SortBy) -> Self {
        self.sort.push(sort);
        self
    }

    /// Restricts the read to rows `from..=to`.
    #[must_use]
    pub fn range(mut self, from: u64, to: u64) -> Self {
        self.range = Some((from, to));
        self
    }

    /// Restricts the read to the rows of one page.
    #[must_use]
    pub fn window(self, window: PageWindow) -> Self {
        let (from, to) = window.range();
        self.range(from, to)
    }

    #[must_use]
    pub fn count(mut self, count: CountMode) -> Self {
        self.count = count;
        self
    }
}

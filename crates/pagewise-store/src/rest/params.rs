//! PostgREST request encoding and response header parsing.

use serde_json::Value;

use crate::{CountMode, Filter, ListQuery};

/// Characters that must be quoted inside PostgREST filter values.
const RESERVED: &[char] = &[',', '.', ':', '(', ')', '"', ' '];

/// Renders a scalar filter value.
fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_owned(),
        other => other.to_string(),
    }
}

/// Wraps values holding reserved characters in double quotes.
fn quoted(text: &str) -> String {
    if text.contains(RESERVED) {
        format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        text.to_owned()
    }
}

/// `%` is written as `*` in URLs.
fn pattern(pattern: &str) -> String {
    pattern.replace('%', "*")
}

/// Returns the `(name, value)` query parameter for one filter.
pub(crate) fn filter_param(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Compare { column, op, value } => {
            (column.clone(), format!("{}.{}", op.as_ref(), scalar(value)))
        }
        Filter::ILike { column, pattern: p } => (column.clone(), format!("ilike.{}", pattern(p))),
        Filter::In { column, values } => {
            let list = values
                .iter()
                .map(|value| quoted(&scalar(value)))
                .collect::<Vec<_>>()
                .join(",");
            (column.clone(), format!("in.({list})"))
        }
        Filter::IsNull { column, negated: false } => (column.clone(), "is.null".to_owned()),
        Filter::IsNull { column, negated: true } => (column.clone(), "not.is.null".to_owned()),
        Filter::Search { columns, term } => {
            let term = quoted(&format!("*{term}*"));
            let alternatives = columns
                .iter()
                .map(|column| format!("{column}.ilike.{term}"))
                .collect::<Vec<_>>()
                .join(",");
            ("or".to_owned(), format!("({alternatives})"))
        }
    }
}

/// Returns every query parameter for `query`.
pub(crate) fn query_params(query: &ListQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_owned(), query.select.clone())];
    params.extend(
        query
            .filters
            .iter()
            .filter(|filter| !matches!(filter, Filter::Search { term, .. } if term.is_empty()))
            .map(filter_param),
    );

    if !query.sort.is_empty() {
        let order = query
            .sort
            .iter()
            .map(|sort| format!("{}.{}", sort.field, sort.order))
            .collect::<Vec<_>>()
            .join(",");
        params.push(("order".to_owned(), order));
    }
    params
}

/// Returns the range and count headers for `query`.
pub(crate) fn query_headers(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut headers = Vec::new();
    if let Some((from, to)) = query.range {
        headers.push(("Range-Unit", "items".to_owned()));
        headers.push(("Range", format!("{from}-{to}")));
    }
    if query.count == CountMode::Exact {
        headers.push(("Prefer", "count=exact".to_owned()));
    }
    headers
}

/// A parsed `Content-Range` header: `0-19/45`, `*/45` or `0-19/*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub range: Option<(u64, u64)>,
    pub total: Option<u64>,
}

impl ContentRange {
    /// Parses a header value, returning `None` when malformed.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        let value = value.strip_prefix("items ").unwrap_or(value);
        let (range, total) = value.split_once('/')?;

        let range = match range {
            "*" => None,
            range => {
                let (from, to) = range.split_once('-')?;
                Some((from.parse().ok()?, to.parse().ok()?))
            }
        };
        let total = match total {
            "*" => None,
            total => Some(total.parse().ok()?),
        };
        Some(Self { range, total })
    }
}

#[cfg(test)]
mod tests {
    use pagewise_core::PageWindow;
    use serde_json::json;

    use super::*;
    use crate::SortBy;

    #[test]
    fn renders_comparisons() {
        assert_eq!(
            filter_param(&Filter::eq("company_id", "c1")),
            ("company_id".into(), "eq.c1".into())
        );
        assert_eq!(
            filter_param(&Filter::gte("created_at", "2024-01-01")),
            ("created_at".into(), "gte.2024-01-01".into())
        );
        assert_eq!(
            filter_param(&Filter::neq("archived", true)),
            ("archived".into(), "neq.true".into())
        );
    }

    #[test]
    fn renders_lists_and_nulls() {
        assert_eq!(
            filter_param(&Filter::is_in("status", ["open", "on hold"])).1,
            r#"in.(open,"on hold")"#
        );
        assert_eq!(filter_param(&Filter::is_null("deleted_at")).1, "is.null");
        assert_eq!(filter_param(&Filter::not_null("deleted_at")).1, "not.is.null");
        assert_eq!(filter_param(&Filter::ilike("name", "%bolt%")).1, "ilike.*bolt*");
    }

    #[test]
    fn renders_search_as_or() {
        let (name, value) = filter_param(&Filter::search(["name", "email"], "ann"));
        assert_eq!(name, "or");
        assert_eq!(value, "(name.ilike.*ann*,email.ilike.*ann*)");

        let (_, value) = filter_param(&Filter::search(["name"], "a, b"));
        assert_eq!(value, r#"(name.ilike."*a, b*")"#);
    }

    #[test]
    fn empty_search_is_dropped() {
        let query = ListQuery::new("customers").filter(Filter::search(["name"], ""));
        assert_eq!(query_params(&query), vec![("select".into(), "*".into())]);
    }

    #[test]
    fn params_and_headers_for_page() {
        let query = ListQuery::new("orders")
            .filter(Filter::eq("company_id", json!("c1")))
            .order(SortBy::desc("created_at"))
            .order(SortBy::asc("id"))
            .window(PageWindow::new(2, 20))
            .count(CountMode::Exact);

        assert_eq!(
            query_params(&query),
            vec![
                ("select".into(), "*".into()),
                ("company_id".into(), "eq.c1".into()),
                ("order".into(), "created_at.desc,id.asc".into()),
            ]
        );
        assert_eq!(
            query_headers(&query),
            vec![
                ("Range-Unit", "items".to_owned()),
                ("Range", "20-39".to_owned()),
                ("Prefer", "count=exact".to_owned()),
            ]
        );
    }

    #[test]
    fn parses_content_range() {
        assert_eq!(
            ContentRange::parse("0-19/45"),
            Some(ContentRange {
                range: Some((0, 19)),
                total: Some(45)
            })
        );
        assert_eq!(
            ContentRange::parse("*/0"),
            Some(ContentRange {
                range: None,
                total: Some(0)
            })
        );
        assert_eq!(ContentRange::parse("20-39/*").and_then(|r| r.total), None);
        assert_eq!(ContentRange::parse("garbage"), None);
        assert_eq!(ContentRange::parse("0-x/10"), None);
    }
}

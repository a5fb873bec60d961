//! Reqwest-based PostgREST client.

use std::sync::Arc;

use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use url::Url;

use super::error::{Error, status_error};
use super::params::{ContentRange, query_headers, query_params};
use super::{RestConfig, TRACING_TARGET};
use crate::{CountMode, ListQuery, RowSet, RowStore};

/// Inner client that holds the HTTP client and configuration.
struct RestStoreInner {
    http: Client,
    config: RestConfig,
    base: Url,
}

/// Row store backed by a PostgREST-compatible HTTP endpoint.
///
/// Each `select` issues one `GET {base}/{table}` with filters as query
/// parameters, the row range in the `Range` header and, for exact counts,
/// `Prefer: count=exact`. The total is read back from `Content-Range`.
#[derive(Clone)]
pub struct RestStore {
    inner: Arc<RestStoreInner>,
}

impl std::fmt::Debug for RestStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestStore")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl RestStore {
    /// Creates a client from a validated configuration.
    pub fn new(config: RestConfig) -> crate::Result<Self> {
        config.validate()?;
        let base = config.base()?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(key) = &config.api_key {
            let mut api_key = HeaderValue::from_str(key).map_err(Error::from)?;
            api_key.set_sensitive(true);
            let mut bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(Error::from)?;
            bearer.set_sensitive(true);
            headers.insert("apikey", api_key);
            headers.insert(AUTHORIZATION, bearer);
        }

        let timeout = config.effective_timeout();
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(config.effective_user_agent())
            .default_headers(headers)
            .build()
            .map_err(Error::from)?;

        tracing::debug!(
            target: TRACING_TARGET,
            base = %base,
            timeout_ms = timeout.as_millis(),
            "Created REST store"
        );

        Ok(Self {
            inner: Arc::new(RestStoreInner { http, config, base }),
        })
    }

    /// Gets the client configuration.
    pub fn config(&self) -> &RestConfig {
        &self.inner.config
    }

    /// Builds the request for `query` without sending it.
    pub(crate) fn request(&self, query: &ListQuery) -> crate::Result<RequestBuilder> {
        let mut url = self.inner.base.join(&query.table).map_err(|error| {
            crate::Error::invalid_input()
                .with_message(format!("Invalid table name '{}'", query.table))
                .with_source(error)
        })?;
        url.query_pairs_mut().extend_pairs(query_params(query));

        let mut request = self.inner.http.get(url);
        for (name, value) in query_headers(query) {
            request = request.header(name, value);
        }
        Ok(request)
    }
}

#[async_trait::async_trait]
impl RowStore for RestStore {
    async fn select(&self, query: &ListQuery) -> crate::Result<RowSet> {
        let request = self.request(query)?;
        tracing::debug!(
            target: TRACING_TARGET,
            table = %query.table,
            range = ?query.range,
            "Selecting rows"
        );

        let response = request.send().await.map_err(Error::from)?;
        let status = response.status();
        let content_range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|value| value.to_str().ok())
            .and_then(ContentRange::parse);

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let error = status_error(status, &body, &query.table);
            tracing::debug!(
                target: TRACING_TARGET,
                table = %query.table,
                status = status.as_u16(),
                error = %error,
                "Select rejected"
            );
            return Err(error);
        }

        let rows: Vec<Value> = response.json().await.map_err(Error::from)?;
        let total = content_range
            .and_then(|range| range.total)
            .filter(|_| query.count == CountMode::Exact);

        tracing::debug!(
            target: TRACING_TARGET,
            table = %query.table,
            rows = rows.len(),
            total = ?total,
            "Selected rows"
        );

        Ok(RowSet::new(rows, total))
    }
}

#[cfg(test)]
mod tests {
    use pagewise_core::PageWindow;

    use super::*;
    use crate::{Filter, SortBy};

    fn store() -> RestStore {
        let config = RestConfig::new("https://db.example.com/rest/v1").with_api_key("anon-key");
        RestStore::new(config).unwrap()
    }

    #[test]
    fn rejects_invalid_config() {
        assert!(RestStore::new(RestConfig::new("nope")).is_err());
    }

    #[test]
    fn builds_page_request() {
        let query = ListQuery::new("purchase_orders")
            .filter(Filter::eq("company_id", "c1"))
            .filter(Filter::search(["order_number"], "PO-1"))
            .order(SortBy::desc("created_at"))
            .window(PageWindow::new(3, 20))
            .count(CountMode::Exact);

        let request = store().request(&query).unwrap().build().unwrap();
        let url = request.url();
        assert_eq!(url.path(), "/rest/v1/purchase_orders");

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("company_id".into(), "eq.c1".into())));
        assert!(pairs.contains(&("or".into(), "(order_number.ilike.*PO-1*)".into())));
        assert!(pairs.contains(&("order".into(), "created_at.desc".into())));

        let headers = request.headers();
        assert_eq!(headers["Range"], "40-59");
        assert_eq!(headers["Range-Unit"], "items");
        assert_eq!(headers["Prefer"], "count=exact");
    }

    #[test]
    fn unranged_request_has_no_range_headers() {
        let request = store()
            .request(&ListQuery::new("budgets"))
            .unwrap()
            .build()
            .unwrap();

        assert!(request.headers().get("Range").is_none());
        assert!(request.headers().get("Prefer").is_none());
    }
}

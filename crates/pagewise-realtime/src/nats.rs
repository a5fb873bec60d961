//! Change feed over NATS subjects.
//!
//! Events are JSON-encoded [`ChangeEvent`]s published on
//! `{prefix}.{table}.{tenant}`. Unscoped events use the tenant token
//! `global`; an unscoped subscription listens on `{prefix}.{table}.>`.

use std::sync::Arc;

use async_nats::{Client, ConnectOptions};
#[cfg(feature = "config")]
use clap::Args;
use futures::StreamExt;
use pagewise_core::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{ChangeEvent, ChangeFeed, ChannelFilter, DEFAULT_CAPACITY, Error, Subscription};

/// Tracing target for NATS feed operations.
pub const TRACING_TARGET: &str = "pagewise_realtime::nats";

/// Default server URL.
pub const DEFAULT_NATS_URL: &str = "nats://127.0.0.1:4222";

/// Default subject prefix.
pub const DEFAULT_SUBJECT_PREFIX: &str = "pagewise.changes";

/// Tenant token for events that carry no tenant.
const GLOBAL_TENANT: &str = "global";

/// Configuration for [`NatsFeed`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "config", derive(Args))]
pub struct NatsFeedConfig {
    /// NATS server URL (comma-separated for clustering)
    #[cfg_attr(
        feature = "config",
        arg(long = "nats-url", env = "NATS_URL", default_value = DEFAULT_NATS_URL)
    )]
    pub nats_url: String,

    /// Authentication token
    #[cfg_attr(feature = "config", arg(long = "nats-token", env = "NATS_TOKEN"))]
    #[serde(default)]
    pub nats_token: Option<String>,

    /// Subject prefix for change events
    #[cfg_attr(
        feature = "config",
        arg(
            long = "nats-subject-prefix",
            env = "NATS_SUBJECT_PREFIX",
            default_value = DEFAULT_SUBJECT_PREFIX
        )
    )]
    #[serde(default = "default_subject_prefix")]
    pub subject_prefix: String,
}

fn default_subject_prefix() -> String {
    DEFAULT_SUBJECT_PREFIX.to_owned()
}

impl Default for NatsFeedConfig {
    fn default() -> Self {
        Self::new(DEFAULT_NATS_URL)
    }
}

impl NatsFeedConfig {
    /// Creates a configuration for `nats_url` with the default prefix.
    pub fn new(nats_url: impl Into<String>) -> Self {
        Self {
            nats_url: nats_url.into(),
            nats_token: None,
            subject_prefix: default_subject_prefix(),
        }
    }

    /// Set the authentication token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.nats_token = Some(token.into());
        self
    }

    /// Set the subject prefix.
    #[must_use]
    pub fn with_subject_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.subject_prefix = prefix.into();
        self
    }

    /// Returns the server URLs (splits comma-separated URLs).
    pub fn servers(&self) -> Vec<&str> {
        self.nats_url.split(',').map(str::trim).collect()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        for server in self.servers() {
            if !server.starts_with("nats://") && !server.starts_with("tls://") {
                return Err(pagewise_core::Error::configuration()
                    .with_message(format!("Invalid NATS server URL: '{server}'")));
            }
        }

        let prefix = self.subject_prefix.trim();
        if prefix.is_empty() || prefix.contains(['*', '>', ' ']) {
            return Err(pagewise_core::Error::configuration()
                .with_message(format!("Invalid subject prefix: '{}'", self.subject_prefix)));
        }
        Ok(())
    }

    /// Returns the subject a filter subscribes to.
    pub fn filter_subject(&self, filter: &ChannelFilter) -> String {
        match &filter.tenant {
            Some(tenant) => format!("{}.{}.{tenant}", self.subject_prefix, filter.table),
            None => format!("{}.{}.>", self.subject_prefix, filter.table),
        }
    }

    /// Returns the subject an event is published on.
    pub fn event_subject(&self, event: &ChangeEvent) -> String {
        let tenant = event.tenant.as_deref().unwrap_or(GLOBAL_TENANT);
        format!("{}.{}.{tenant}", self.subject_prefix, event.table)
    }
}

struct NatsFeedInner {
    client: Client,
    config: NatsFeedConfig,
}

/// Change feed backed by NATS core subjects.
#[derive(Clone)]
pub struct NatsFeed {
    inner: Arc<NatsFeedInner>,
}

impl std::fmt::Debug for NatsFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsFeed")
            .field("servers", &self.inner.config.servers())
            .field("subject_prefix", &self.inner.config.subject_prefix)
            .finish_non_exhaustive()
    }
}

impl NatsFeed {
    /// Connects to the configured servers.
    pub async fn connect(config: NatsFeedConfig) -> Result<Self> {
        config.validate()?;
        tracing::info!(
            target: TRACING_TARGET,
            servers = %config.nats_url,
            "Connecting to NATS"
        );

        let mut options = ConnectOptions::new().name("pagewise");
        if let Some(token) = &config.nats_token {
            options = options.token(token.clone());
        }
        let client = async_nats::connect_with_options(&config.nats_url, options)
            .await
            .map_err(Error::from)?;

        Ok(Self::from_client(client, config))
    }

    /// Wraps an existing connection.
    pub fn from_client(client: Client, config: NatsFeedConfig) -> Self {
        Self {
            inner: Arc::new(NatsFeedInner { client, config }),
        }
    }

    /// Gets the feed configuration.
    pub fn config(&self) -> &NatsFeedConfig {
        &self.inner.config
    }

    /// Publishes `event` on its subject.
    pub async fn publish(&self, event: &ChangeEvent) -> Result<()> {
        let subject = self.inner.config.event_subject(event);
        let payload = serde_json::to_vec(event).map_err(Error::from)?;
        self.inner
            .client
            .publish(subject.clone(), payload.into())
            .await
            .map_err(Error::from)?;

        tracing::debug!(target: TRACING_TARGET, subject = %subject, "Published change");
        Ok(())
    }
}

#[async_trait::async_trait]
impl ChangeFeed for NatsFeed {
    async fn subscribe(&self, filter: ChannelFilter) -> Result<Subscription> {
        let subject = self.inner.config.filter_subject(&filter);
        let mut subscriber = self
            .inner
            .client
            .subscribe(subject.clone())
            .await
            .map_err(Error::from)?;

        tracing::debug!(target: TRACING_TARGET, subject = %subject, "Subscribed");

        let (sender, receiver) = mpsc::channel(DEFAULT_CAPACITY);
        let forward_filter = filter.clone();
        let task = tokio::spawn(async move {
            while let Some(message) = subscriber.next().await {
                let event = match serde_json::from_slice::<ChangeEvent>(&message.payload) {
                    Ok(event) if forward_filter.matches(&event) => event,
                    Ok(_) => continue,
                    Err(error) => {
                        tracing::warn!(
                            target: TRACING_TARGET,
                            subject = %message.subject,
                            error = %error,
                            "Dropping malformed change event"
                        );
                        continue;
                    }
                };

                if sender.send(event).await.is_err() {
                    break;
                }
            }
        });

        let abort = task.abort_handle();
        Ok(Subscription::new(filter, receiver, move || abort.abort()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChangeKind;

    #[test]
    fn subjects() {
        let config = NatsFeedConfig::new("nats://localhost:4222");

        let scoped = ChannelFilter::new("orders").with_tenant("c1");
        assert_eq!(config.filter_subject(&scoped), "pagewise.changes.orders.c1");
        assert_eq!(
            config.filter_subject(&ChannelFilter::new("orders")),
            "pagewise.changes.orders.>"
        );

        let event = ChangeEvent::new("orders", ChangeKind::Insert);
        assert_eq!(config.event_subject(&event), "pagewise.changes.orders.global");
        let event = event.with_tenant("c1");
        assert_eq!(config.event_subject(&event), "pagewise.changes.orders.c1");
    }

    #[test]
    fn validation() {
        assert!(NatsFeedConfig::new("nats://a:4222, nats://b:4222").validate().is_ok());
        assert!(NatsFeedConfig::new("http://a:4222").validate().is_err());
        assert!(
            NatsFeedConfig::new("nats://a:4222")
                .with_subject_prefix("bad.*")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn servers_are_split() {
        let config = NatsFeedConfig::new("nats://a:4222,nats://b:4222").with_token("t");
        assert_eq!(config.servers(), vec!["nats://a:4222", "nats://b:4222"]);
        assert_eq!(config.nats_token.as_deref(), Some("t"));
    }
}

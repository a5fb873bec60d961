//! Change events and subscription filters.

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Kind of row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(AsRefStr, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row change on a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub table: String,
    /// Tenant owning the changed row, when scoped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
    #[serde(rename = "eventType", alias = "kind")]
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default = "Timestamp::now")]
    pub occurred_at: Timestamp,
}

impl ChangeEvent {
    /// Creates an unscoped event for `table`.
    pub fn new(table: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            table: table.into(),
            tenant: None,
            kind,
            record_id: None,
            occurred_at: Timestamp::now(),
        }
    }

    #[must_use]
    pub fn with_tenant(mut self, tenant: impl ToString) -> Self {
        self.tenant = Some(tenant.to_string());
        self
    }

    #[must_use]
    pub fn with_record_id(mut self, record_id: impl ToString) -> Self {
        self.record_id = Some(record_id.to_string());
        self
    }
}

/// Which events a subscription receives: one table, optionally one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelFilter {
    pub table: String,
    pub tenant: Option<String>,
}

impl ChannelFilter {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            tenant: None,
        }
    }

    /// Restricts the filter to one tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant: impl ToString) -> Self {
        self.tenant = Some(tenant.to_string());
        self
    }

    /// Returns whether `event` passes this filter.
    ///
    /// A tenant-scoped filter never receives unscoped events.
    pub fn matches(&self, event: &ChangeEvent) -> bool {
        if event.table != self.table {
            return false;
        }
        match &self.tenant {
            Some(tenant) => event.tenant.as_ref() == Some(tenant),
            None => true,
        }
    }

    /// Returns a stable channel name, e.g. `orders:company_id=eq.<tenant>`.
    pub fn channel_name(&self) -> String {
        match &self.tenant {
            Some(tenant) => format!("{}:company_id=eq.{tenant}", self.table),
            None => self.table.clone(),
        }
    }
}

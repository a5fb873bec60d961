//! Explicit tenant scoping.
//!
//! Every list query filters by tenant. The tenant is resolved asynchronously
//! (after authentication and profile lookup), so the unresolved state is a
//! first-class value instead of an ambient lookup.

use derive_more::{Display, From, Into};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::KeyToken;

/// Identifier of the company/organization that scopes all queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Serialize, Deserialize, Display, From, Into)]
#[serde(transparent)]
pub struct TenantId(Uuid);

impl TenantId {
    /// Wraps an existing identifier.
    #[inline]
    pub const fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Returns the inner identifier.
    #[inline]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl std::str::FromStr for TenantId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<TenantId> for KeyToken {
    fn from(value: TenantId) -> Self {
        KeyToken::Text(value.to_string())
    }
}

/// Resolution state of the current tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TenantContext {
    /// Authentication or profile lookup is still in progress.
    #[default]
    Pending,
    /// The current user is not attached to any tenant.
    Unassigned,
    /// The tenant is known.
    Resolved(TenantId),
}

impl TenantContext {
    /// Returns the tenant id when resolved.
    #[inline]
    pub fn tenant_id(&self) -> Option<TenantId> {
        match self {
            Self::Resolved(id) => Some(*id),
            Self::Pending | Self::Unassigned => None,
        }
    }

    /// Returns whether the tenant is known.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

impl From<TenantId> for TenantContext {
    fn from(value: TenantId) -> Self {
        Self::Resolved(value)
    }
}

impl From<Option<TenantId>> for TenantContext {
    fn from(value: Option<TenantId>) -> Self {
        value.map_or(Self::Unassigned, Self::Resolved)
    }
}

impl From<TenantContext> for KeyToken {
    fn from(value: TenantContext) -> Self {
        value.tenant_id().into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unresolved_contexts_have_no_id() {
        assert_eq!(TenantContext::Pending.tenant_id(), None);
        assert_eq!(TenantContext::Unassigned.tenant_id(), None);
        assert!(!TenantContext::default().is_resolved());
    }

    #[test]
    fn resolved_context_renders_key_token() {
        let id = TenantId::new(Uuid::nil());
        let context = TenantContext::from(id);

        assert!(context.is_resolved());
        assert_eq!(
            KeyToken::from(context),
            KeyToken::Text("00000000-0000-0000-0000-000000000000".to_owned())
        );
        assert_eq!(KeyToken::from(TenantContext::Pending), KeyToken::Null);
    }

    #[test]
    fn parses_from_string() {
        let id: TenantId = "67e55044-10b1-426f-9247-bb680e5fe0c8".parse().unwrap();
        assert_eq!(id.to_string(), "67e55044-10b1-426f-9247-bb680e5fe0c8");
        assert!("not-a-uuid".parse::<TenantId>().is_err());
    }
}

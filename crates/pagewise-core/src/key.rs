//! Query keys addressing one logical, filtered and sorted collection.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::Result;

/// A single primitive token inside a [`QueryKey`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum KeyToken {
    /// Resource names, serialized filters, tenant identifiers.
    Text(String),
    /// Numeric discriminators.
    Number(i64),
    /// Boolean switches.
    Bool(bool),
    /// Page scope appended to a collection key for one cached page.
    Page { page: u32, size: u32 },
    /// Explicit absence, e.g. a tenant that is not resolved yet.
    Null,
}

impl fmt::Display for KeyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Number(number) => write!(f, "{number}"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Page { page, size } => write!(f, "page={page},size={size}"),
            Self::Null => f.write_str("null"),
        }
    }
}

impl From<&str> for KeyToken {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for KeyToken {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for KeyToken {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

impl From<u32> for KeyToken {
    fn from(value: u32) -> Self {
        Self::Number(i64::from(value))
    }
}

impl From<bool> for KeyToken {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<T: Into<KeyToken>> From<Option<T>> for KeyToken {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Ordered list of tokens that uniquely addresses one collection.
///
/// Two fetches with equal keys read the same logical dataset. Any change to a
/// filter token yields a different key, so pages cached for one filter
/// context are never merged into another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryKey(Vec<KeyToken>);

impl QueryKey {
    /// Creates a key rooted at the given resource name.
    pub fn new(resource: impl Into<String>) -> Self {
        Self(vec![KeyToken::Text(resource.into())])
    }

    /// Appends a token, returning the extended key.
    #[must_use]
    pub fn with(mut self, token: impl Into<KeyToken>) -> Self {
        self.0.push(token.into());
        self
    }

    /// Appends the JSON serialization of `value` as a text token.
    ///
    /// Object fields serialize in declaration order, so equal filter values
    /// always produce equal tokens.
    pub fn with_json<S: Serialize + ?Sized>(self, value: &S) -> Result<Self> {
        let encoded = serde_json::to_string(value)?;
        Ok(self.with(encoded))
    }

    /// Returns the key of one page within this collection.
    #[must_use]
    pub fn page(&self, page: u32, size: u32) -> Self {
        self.clone().with(KeyToken::Page { page, size })
    }

    /// Returns whether `self` begins with every token of `prefix`.
    pub fn starts_with(&self, prefix: &QueryKey) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// Returns the resource name (first token), if it is text.
    pub fn resource(&self) -> Option<&str> {
        match self.0.first() {
            Some(KeyToken::Text(name)) => Some(name),
            _ => None,
        }
    }

    /// Returns the tokens of this key.
    #[inline]
    pub fn tokens(&self) -> &[KeyToken] {
        &self.0
    }

    /// Returns the number of tokens.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns whether the key has no tokens.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, token) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{token}")?;
        }
        f.write_str("]")
    }
}

impl FromIterator<KeyToken> for QueryKey {
    fn from_iter<I: IntoIterator<Item = KeyToken>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

//! File identifiers
//!
//! An [`Identifier`] names one file of a library: a content hash in
//! [`LibraryMode::Lazer`](super::LibraryMode::Lazer) libraries, a
//! `/`-separated path relative to `Songs/` in
//! [`LibraryMode::Stable`](super::LibraryMode::Stable) libraries.
//!
//! Manifests are newline-separated on the wire, so an identifier may never
//! contain `\n` or `\r`. That constraint is enforced here, at construction.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Opaque, newline-free, non-empty file identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate and wrap an identifier.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into();
        if value.is_empty() || value.contains(['\n', '\r']) {
            return Err(DomainError::InvalidIdentifier(value));
        }
        Ok(Self(value))
    }

    /// Borrow the identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of bytes in the identifier.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the identifier is empty; never true for a constructed value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Identifier {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

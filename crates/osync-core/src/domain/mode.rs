//! Library layout selector
//!
//! Both peers of a session must run in the same mode. The server announces
//! its mode on `/ping` using the wire tag (`"LAZER"` / `"STABLE"`) and the
//! client refuses to continue when the tags differ.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::address::{AddressScheme, ContentAddressed, PathAddressed};
use super::errors::DomainError;

/// The two library layouts a peer can serve or sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryMode {
    /// Files stored under `files/` by content hash, plus a `client.realm` database
    #[serde(alias = "LAZER")]
    Lazer,
    /// Files stored under `Songs/` at their natural relative path
    #[serde(alias = "STABLE")]
    Stable,
}

impl LibraryMode {
    /// Tag exchanged on the wire by `/ping`.
    #[must_use]
    pub const fn as_wire(&self) -> &'static str {
        match self {
            LibraryMode::Lazer => "LAZER",
            LibraryMode::Stable => "STABLE",
        }
    }

    /// Address scheme used to lay out files in this mode.
    #[must_use]
    pub fn scheme(&self) -> &'static dyn AddressScheme {
        match self {
            LibraryMode::Lazer => &ContentAddressed,
            LibraryMode::Stable => &PathAddressed,
        }
    }

    /// Whether this layout carries a mutable database file next to its content.
    #[must_use]
    pub const fn has_database(&self) -> bool {
        matches!(self, LibraryMode::Lazer)
    }
}

impl Default for LibraryMode {
    fn default() -> Self {
        LibraryMode::Lazer
    }
}

impl Display for LibraryMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

impl FromStr for LibraryMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LAZER" => Ok(LibraryMode::Lazer),
            "STABLE" => Ok(LibraryMode::Stable),
            other => Err(DomainError::UnknownMode(other.to_string())),
        }
    }
}

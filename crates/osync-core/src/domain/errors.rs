//! Domain error types
//!
//! Errors raised while validating identifiers, resolving them to disk
//! locations, or parsing wire values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Identifier is empty or contains a line break
    #[error("Invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// Identifier would resolve outside of the library root
    #[error("Identifier escapes library root: {0}")]
    UnsafeIdentifier(String),

    /// Unknown library mode tag
    #[error("Unknown library mode: {0}")]
    UnknownMode(String),
}

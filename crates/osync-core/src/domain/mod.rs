//! Domain entities and pure logic
//!
//! - [`mode`] - The two library layouts and their wire tags
//! - [`identifier`] - Validated file identifiers (content hash or relative path)
//! - [`address`] - Mapping identifiers to disk locations and request paths
//! - [`manifest`] - Library scans, wire encoding and set difference
//! - [`errors`] - Domain-specific error types

pub mod address;
pub mod errors;
pub mod identifier;
pub mod manifest;
pub mod mode;

// Re-export commonly used types
pub use address::{
    AddressScheme, ContentAddressed, PathAddressed, BACKUP_SUFFIX, CONTENT_DIR, DATABASE_FILE,
    DATABASE_TEMP_SUFFIX, PARTIAL_SUFFIX, SONGS_DIR,
};
pub use errors::DomainError;
pub use identifier::Identifier;
pub use manifest::Manifest;
pub use mode::LibraryMode;

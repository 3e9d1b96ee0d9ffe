//! Osync Core - Library layouts, manifests and configuration
//!
//! This crate contains everything both peers of a sync agree on:
//! - **Domain types** - `LibraryMode`, `Identifier`, `Manifest`
//! - **Address schemes** - `ContentAddressed` and `PathAddressed` file placement
//! - **Configuration** - YAML-backed `Config` with validation and a builder
//! - **Port definitions** - Traits for collaborators owned by the host shell:
//!   `ProgressSink`, `LibraryLocator`, `LocalAddressProvider`
//!
//! Nothing in here performs network I/O. The server and client crates build on
//! these types so that both sides resolve identifiers identically.

pub mod config;
pub mod domain;
pub mod ports;

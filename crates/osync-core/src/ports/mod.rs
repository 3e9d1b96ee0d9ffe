//! Port definitions
//!
//! Interfaces to collaborators that live in the host shell rather than in
//! the sync engine. The engine depends on these traits only.
//!
//! ## Ports Overview
//!
//! - [`ProgressSink`] - Receives human-readable progress lines for a session
//! - [`LibraryLocator`] - Suggests a default library root per mode
//! - [`LocalAddressProvider`] - Reports the LAN-facing address of this host

pub mod discovery;
pub mod progress;

pub use discovery::{LibraryLocator, LocalAddressProvider, SystemLibraryLocator, SystemLocalAddress};
pub use progress::{NullSink, ProgressSink};

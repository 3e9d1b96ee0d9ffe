//! Osync Server - Read-only HTTP view of a local library
//!
//! Serves the routes a peer needs to pull this library:
//!
//! | Route | Mode | Response |
//! |---|---|---|
//! | `GET /ping` | both | mode tag (`LAZER` / `STABLE`) |
//! | `GET /realm` | `Lazer` | database file, or `404` |
//! | `GET /manifest` | both | newline-separated identifiers |
//! | `GET /file/{hash}` | `Lazer` | content file, or `404` |
//! | `GET /stable-file?path=` | `Stable` | content file, or `404` |
//!
//! ## Modules
//!
//! - [`server`] - Listener lifecycle and the [`ServerHandle`]
//! - [`routes`] - Request routing and file streaming

pub mod routes;
pub mod server;

use std::net::SocketAddr;

use thiserror::Error;

pub use server::{ServerHandle, SyncServer};

/// Errors that can occur while starting the server
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// Address that was requested
        addr: SocketAddr,
        /// Underlying socket error
        #[source]
        source: std::io::Error,
    },

    /// The library root is missing or not a directory
    #[error("Library root is not a directory: {0}")]
    InvalidRoot(std::path::PathBuf),
}

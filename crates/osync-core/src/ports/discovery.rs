//! Host discovery ports
//!
//! Default library locations and the local network address are platform
//! questions the sync engine never asks itself; the shell resolves them
//! through these traits and passes plain values down.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::PathBuf;

use tracing::debug;

use crate::domain::LibraryMode;

/// Supplies a default library root for a mode.
pub trait LibraryLocator: Send + Sync {
    /// Conventional install location for `mode` on this host, if known.
    fn default_root(&self, mode: LibraryMode) -> Option<PathBuf>;
}

/// Supplies the address peers should use to reach this host.
pub trait LocalAddressProvider: Send + Sync {
    /// LAN-facing IP address, if one can be determined.
    fn local_ip(&self) -> Option<IpAddr>;
}

// ============================================================================
// System adapters
// ============================================================================

/// Platform data directories, as the game installs itself.
///
/// - `Lazer`: `<data_dir>/osu` (`~/.local/share/osu`, `~/Library/Application Support/osu`,
///   `%APPDATA%\osu`)
/// - `Stable`: `<data_local_dir>/osu!`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLibraryLocator;

impl LibraryLocator for SystemLibraryLocator {
    fn default_root(&self, mode: LibraryMode) -> Option<PathBuf> {
        match mode {
            LibraryMode::Lazer => dirs::data_dir().map(|d| d.join("osu")),
            LibraryMode::Stable => dirs::data_local_dir().map(|d| d.join("osu!")),
        }
    }
}

/// Determines the outbound IPv4 address by asking the OS which interface
/// would route to a public address. Connecting a UDP socket sends nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemLocalAddress;

/// Any routable address works; nothing is sent to it.
const ROUTE_PROBE: (Ipv4Addr, u16) = (Ipv4Addr::new(192, 0, 2, 1), 9);

impl LocalAddressProvider for SystemLocalAddress {
    fn local_ip(&self) -> Option<IpAddr> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).ok()?;
        if let Err(err) = socket.connect(ROUTE_PROBE) {
            debug!(%err, "No route for local address probe");
            return None;
        }
        let ip = socket.local_addr().ok()?.ip();
        (!ip.is_loopback() && !ip.is_unspecified()).then_some(ip)
    }
}

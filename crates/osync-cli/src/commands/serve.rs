//! Serve command - Share the local library on the LAN
//!
//! Starts the HTTP server, prints the address clients should use, and runs
//! until Ctrl+C or SIGTERM.

use std::{net::IpAddr, path::PathBuf};

use anyhow::{Context as _, Result};
use osync_core::{
    domain::LibraryMode,
    ports::{LocalAddressProvider, SystemLocalAddress},
};
use osync_server::SyncServer;
use tracing::info;

use super::{resolve_root_for_system, Context};
use crate::shutdown;

/// Arguments for the serve subcommand
#[derive(Debug, clap::Args)]
pub struct ServeCommand {
    /// Library folder to serve (defaults to the configured or detected one)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Library mode: lazer or stable
    #[arg(long)]
    pub mode: Option<LibraryMode>,

    /// Port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Address to bind
    #[arg(long)]
    pub bind: Option<IpAddr>,
}

impl ServeCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let formatter = ctx.formatter();
        let mode = self.mode.unwrap_or(ctx.config.library.mode);
        let root = resolve_root_for_system(self.root.clone(), &ctx.config, mode)?;

        let mut server_config = ctx.config.server.clone();
        if let Some(port) = self.port {
            server_config.port = port;
        }
        if let Some(bind) = self.bind {
            server_config.bind = bind;
        }

        let mut handle = SyncServer::new(root.clone(), mode, &server_config)
            .start()
            .await
            .context("Failed to start server")?;
        let addr = handle.local_addr();
        let lan = SystemLocalAddress.local_ip();
        info!(%addr, mode = %mode, root = %root.display(), "Serving library");

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "status": "serving",
                "mode": mode,
                "root": root.display().to_string(),
                "listen": addr.to_string(),
                "lan_address": lan.map(|ip| ip.to_string()),
                "port": addr.port(),
            }));
        } else {
            formatter.success(&format!("Serving {mode} library from {}", root.display()));
            formatter.info(&format!("Listening on {addr}"));
            match lan {
                Some(ip) => formatter.info(&format!("Clients connect to {ip}:{}", addr.port())),
                None => formatter.warn("Could not determine the LAN address of this machine"),
            }
            formatter.info("Press Ctrl+C to stop");
        }

        shutdown::wait_for_signal().await;
        handle.stop().await;
        formatter.success("Server stopped");
        Ok(())
    }
}

//! Info command - Show what this machine would serve or sync into

use anyhow::Result;
use osync_core::{
    domain::LibraryMode,
    ports::{LibraryLocator, LocalAddressProvider, SystemLibraryLocator, SystemLocalAddress},
};

use super::Context;

/// Arguments for the info subcommand
#[derive(Debug, clap::Args)]
pub struct InfoCommand {}

impl InfoCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<()> {
        let formatter = ctx.formatter();
        let lan = SystemLocalAddress.local_ip();
        let roots: Vec<(LibraryMode, Option<String>)> = [LibraryMode::Lazer, LibraryMode::Stable]
            .into_iter()
            .map(|mode| {
                let root = SystemLibraryLocator
                    .default_root(mode)
                    .map(|p| p.display().to_string());
                (mode, root)
            })
            .collect();

        if ctx.format.is_json() {
            let defaults: serde_json::Map<String, serde_json::Value> = roots
                .iter()
                .map(|(mode, root)| (mode.to_string().to_lowercase(), serde_json::json!(root)))
                .collect();
            formatter.print_json(&serde_json::json!({
                "lan_address": lan.map(|ip| ip.to_string()),
                "port": ctx.config.server.port,
                "configured_mode": ctx.config.library.mode,
                "configured_root": ctx.config.library.root,
                "default_roots": defaults,
                "config_path": ctx.config_path.display().to_string(),
            }));
            return Ok(());
        }

        match lan {
            Some(ip) => formatter.success(&format!("LAN address: {ip}:{}", ctx.config.server.port)),
            None => formatter.warn("Could not determine the LAN address of this machine"),
        }
        formatter.info(&format!("Configured mode: {}", ctx.config.library.mode));
        if let Some(root) = &ctx.config.library.root {
            formatter.info(&format!("Configured folder: {}", root.display()));
        }
        for (mode, root) in &roots {
            let shown = root.as_deref().unwrap_or("(unknown on this platform)");
            formatter.info(&format!("Default {mode} folder: {shown}"));
        }
        formatter.info(&format!("Config file: {}", ctx.config_path.display()));
        Ok(())
    }
}

//! Config command - View and manage Osync configuration
//!
//! Provides the `osync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Writes a default configuration file
//! 3. Sets individual values via dotted keys
//! 4. Validates the configuration file and reports errors

use std::{net::IpAddr, path::PathBuf, process::ExitCode};

use anyhow::{Context as _, Result};
use clap::Subcommand;
use osync_core::{config::Config, domain::LibraryMode};
use tracing::info;

use super::Context;

/// Keys accepted by `config set`
const SUPPORTED_KEYS: &[(&str, &str)] = &[
    ("library.mode", "lazer|stable"),
    ("library.root", "Library folder (\"none\" to auto-detect)"),
    ("server.bind", "Address the server listens on"),
    ("server.port", "Port the server listens on"),
    ("server.shutdown_grace_ms", "Grace period for open connections"),
    ("server.shutdown_timeout_ms", "Hard stop deadline"),
    ("client.default_port", "Port used for bare host names"),
    ("client.concurrency", "Maximum simultaneous downloads"),
    ("client.progress_stride", "Report progress every N files"),
    ("client.connect_timeout_secs", "Connection timeout"),
    ("logging.level", "trace|debug|info|warn|error"),
];

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,
    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "client.concurrency")
        key: String,
        /// New value
        value: String,
    },
    /// Validate configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, ctx: &Context) -> Result<ExitCode> {
        match self {
            ConfigCommand::Show => self.execute_show(ctx),
            ConfigCommand::Init { force } => self.execute_init(ctx, *force),
            ConfigCommand::Set { key, value } => self.execute_set(ctx, key, value),
            ConfigCommand::Validate => self.execute_validate(ctx),
        }
    }

    fn execute_show(&self, ctx: &Context) -> Result<ExitCode> {
        let formatter = ctx.formatter();
        info!(config_path = %ctx.config_path.display(), "Showing configuration");

        if ctx.format.is_json() {
            let json = serde_json::to_value(&ctx.config)
                .context("Failed to serialize configuration to JSON")?;
            formatter.print_json(&json);
        } else {
            formatter.success(&format!("Configuration ({})", ctx.config_path.display()));
            formatter.info("");
            let yaml = serde_yaml::to_string(&ctx.config)
                .context("Failed to serialize configuration to YAML")?;
            for line in yaml.lines() {
                formatter.info(line);
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn execute_init(&self, ctx: &Context, force: bool) -> Result<ExitCode> {
        let formatter = ctx.formatter();
        let path = &ctx.config_path;

        if path.exists() && !force {
            formatter.error(&format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            ));
            return Ok(ExitCode::FAILURE);
        }

        Config::default()
            .save(path)
            .context("Failed to write configuration file")?;
        info!(config_path = %path.display(), "Wrote default configuration");

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "config_path": path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Wrote {}", path.display()));
        }
        Ok(ExitCode::SUCCESS)
    }

    fn execute_set(&self, ctx: &Context, key: &str, value: &str) -> Result<ExitCode> {
        let formatter = ctx.formatter();
        let mut config = ctx.config.clone();

        info!(key = %key, value = %value, "Setting configuration value");

        if let Err(e) = apply_config_value(&mut config, key, value) {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "error": e.to_string(),
                }));
            } else {
                formatter.error(&format!("Failed to set '{key}': {e}"));
                formatter.info("");
                formatter.info("Supported keys:");
                for (name, help) in SUPPORTED_KEYS {
                    formatter.info(&format!("  {name:<30} - {help}"));
                }
            }
            return Ok(ExitCode::FAILURE);
        }

        let errors = config.validate();
        if !errors.is_empty() {
            let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "success": false,
                    "key": key,
                    "value": value,
                    "errors": messages,
                }));
            } else {
                formatter.error(&format!("Invalid value for '{key}': {}", messages.join("; ")));
            }
            return Ok(ExitCode::FAILURE);
        }

        config
            .save(&ctx.config_path)
            .context("Failed to write configuration file")?;

        if ctx.format.is_json() {
            formatter.print_json(&serde_json::json!({
                "success": true,
                "key": key,
                "value": value,
                "config_path": ctx.config_path.display().to_string(),
            }));
        } else {
            formatter.success(&format!("Set {key} = {value}"));
            formatter.info(&format!("Saved to {}", ctx.config_path.display()));
        }
        Ok(ExitCode::SUCCESS)
    }

    fn execute_validate(&self, ctx: &Context) -> Result<ExitCode> {
        let formatter = ctx.formatter();
        let path = &ctx.config_path;

        if !path.exists() {
            if ctx.format.is_json() {
                formatter.print_json(&serde_json::json!({
                    "valid": true,
                    "config_path": path.display().to_string(),
                    "errors": [],
                    "note": "Configuration file not found. Using defaults.",
                }));
            } else {
                formatter.info(&format!("Configuration file not found at {}", path.display()));
                formatter.info("Using default configuration. Run 'osync config init' to create one.");
            }
            return Ok(ExitCode::SUCCESS);
        }

        let config = match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                if ctx.format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "valid": false,
                        "config_path": path.display().to_string(),
                        "errors": [format!("Failed to parse configuration: {e}")],
                    }));
                } else {
                    formatter.error(&format!("Failed to parse configuration: {e}"));
                    formatter.info(&format!("File: {}", path.display()));
                }
                return Ok(ExitCode::FAILURE);
            }
        };

        info!(config_path = %path.display(), "Validating configuration");
        let errors = config.validate();

        if ctx.format.is_json() {
            let error_strings: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
            formatter.print_json(&serde_json::json!({
                "valid": errors.is_empty(),
                "config_path": path.display().to_string(),
                "errors": error_strings,
            }));
        } else if errors.is_empty() {
            formatter.success("Configuration is valid");
            formatter.info(&format!("File: {}", path.display()));
        } else {
            formatter.error(&format!(
                "Configuration has {} error{}:",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" }
            ));
            formatter.info(&format!("File: {}", path.display()));
            formatter.info("");
            for error in &errors {
                formatter.info(&format!("  {} - {}", error.field, error.message));
            }
        }

        Ok(if errors.is_empty() {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        })
    }
}

/// Apply a dotted key/value pair to a Config
fn apply_config_value(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        // --- library ---
        "library.mode" => {
            config.library.mode = value.parse::<LibraryMode>()?;
        }
        "library.root" => {
            config.library.root = if value.is_empty() || value == "none" {
                None
            } else {
                Some(PathBuf::from(value))
            };
        }

        // --- server ---
        "server.bind" => {
            config.server.bind = value
                .parse::<IpAddr>()
                .context("Expected an IP address")?;
        }
        "server.port" => {
            config.server.port = value.parse::<u16>().context("Expected a port number")?;
        }
        "server.shutdown_grace_ms" => {
            config.server.shutdown_grace_ms = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }
        "server.shutdown_timeout_ms" => {
            config.server.shutdown_timeout_ms = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }

        // --- client ---
        "client.default_port" => {
            config.client.default_port = value.parse::<u16>().context("Expected a port number")?;
        }
        "client.concurrency" => {
            let n = value
                .parse::<usize>()
                .context("Expected a positive integer")?;
            config.client.concurrency = n;
            config.client.pool_max_idle_per_host = config.client.pool_max_idle_per_host.max(n);
        }
        "client.progress_stride" => {
            config.client.progress_stride = value
                .parse::<usize>()
                .context("Expected a positive integer")?;
        }
        "client.connect_timeout_secs" => {
            config.client.connect_timeout_secs = value
                .parse::<u64>()
                .context("Expected a positive integer")?;
        }

        // --- logging ---
        "logging.level" => {
            config.logging.level = value.to_string();
        }

        _ => {
            anyhow::bail!("Unknown configuration key: '{}'", key);
        }
    }

    Ok(())
}

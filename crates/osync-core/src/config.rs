//! Configuration module for Osync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::LibraryMode;

/// Port used by both peers unless overridden.
pub const DEFAULT_PORT: u16 = 8085;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Osync.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub logging: LoggingConfig,
}

/// Which library this peer serves or syncs into.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Layout of the library: `lazer` or `stable`.
    pub mode: LibraryMode,
    /// Library root. `None` means "ask the platform locator".
    pub root: Option<PathBuf>,
}

/// Settings for serving the local library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind: IpAddr,
    /// TCP port to listen on.
    pub port: u16,
    /// Milliseconds in-flight requests get to finish after a stop request.
    pub shutdown_grace_ms: u64,
    /// Milliseconds after which remaining connections are dropped.
    pub shutdown_timeout_ms: u64,
}

/// Settings for pulling from a remote library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Port appended to bare host names.
    pub default_port: u16,
    /// Maximum simultaneous file fetches.
    pub concurrency: usize,
    /// Report progress every this many completed files.
    pub progress_stride: usize,
    /// Idle connections kept per host; must be at least `concurrency`.
    pub pool_max_idle_per_host: usize,
    /// Seconds allowed to establish a connection. Transfers themselves are unbounded.
    pub connect_timeout_secs: u64,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

// ---------------------------------------------------------------------------
// Config::load()
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }

    /// Write the configuration as YAML, creating parent directories.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/osync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("osync")
            .join("config.yaml")
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            shutdown_grace_ms: 1000,
            shutdown_timeout_ms: 2000,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            concurrency: 50,
            progress_stride: 10,
            pool_max_idle_per_host: 64,
            connect_timeout_secs: 10,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"client.concurrency"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- library ---
        if let Some(root) = &self.library.root {
            if root.exists() && !root.is_dir() {
                errors.push(ValidationError {
                    field: "library.root".into(),
                    message: format!("not a directory: {}", root.display()),
                });
            }
        }

        // --- server ---
        if self.server.shutdown_grace_ms > self.server.shutdown_timeout_ms {
            errors.push(ValidationError {
                field: "server.shutdown_grace_ms".into(),
                message: format!(
                    "grace period ({}) must not exceed shutdown_timeout_ms ({})",
                    self.server.shutdown_grace_ms, self.server.shutdown_timeout_ms
                ),
            });
        }

        // --- client ---
        if self.client.default_port == 0 {
            errors.push(ValidationError {
                field: "client.default_port".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.client.concurrency == 0 {
            errors.push(ValidationError {
                field: "client.concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.client.progress_stride == 0 {
            errors.push(ValidationError {
                field: "client.progress_stride".into(),
                message: "must be greater than 0".into(),
            });
        }
        if self.client.pool_max_idle_per_host < self.client.concurrency {
            errors.push(ValidationError {
                field: "client.pool_max_idle_per_host".into(),
                message: format!(
                    "pool size ({}) must be at least client.concurrency ({})",
                    self.client.pool_max_idle_per_host, self.client.concurrency
                ),
            });
        }
        if self.client.connect_timeout_secs == 0 {
            errors.push(ValidationError {
                field: "client.connect_timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        errors
    }
}

// ---------------------------------------------------------------------------
// ConfigBuilder
// ---------------------------------------------------------------------------

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust,no_run
/// use osync_core::config::ConfigBuilder;
/// use osync_core::domain::LibraryMode;
/// use std::path::PathBuf;
///
/// let config = ConfigBuilder::new()
///     .library_mode(LibraryMode::Stable)
///     .library_root(PathBuf::from("/games/osu!"))
///     .client_concurrency(16)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Start from an existing configuration.
    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    // --- library ---

    pub fn library_mode(mut self, mode: LibraryMode) -> Self {
        self.config.library.mode = mode;
        self
    }

    pub fn library_root(mut self, root: PathBuf) -> Self {
        self.config.library.root = Some(root);
        self
    }

    // --- server ---

    pub fn server_bind(mut self, bind: IpAddr) -> Self {
        self.config.server.bind = bind;
        self
    }

    pub fn server_port(mut self, port: u16) -> Self {
        self.config.server.port = port;
        self
    }

    pub fn server_shutdown(mut self, grace_ms: u64, timeout_ms: u64) -> Self {
        self.config.server.shutdown_grace_ms = grace_ms;
        self.config.server.shutdown_timeout_ms = timeout_ms;
        self
    }

    // --- client ---

    pub fn client_default_port(mut self, port: u16) -> Self {
        self.config.client.default_port = port;
        self
    }

    /// Also grows the connection pool so it never falls below the fetch ceiling.
    pub fn client_concurrency(mut self, n: usize) -> Self {
        self.config.client.concurrency = n;
        if self.config.client.pool_max_idle_per_host < n {
            self.config.client.pool_max_idle_per_host = n;
        }
        self
    }

    pub fn client_progress_stride(mut self, n: usize) -> Self {
        self.config.client.progress_stride = n;
        self
    }

    pub fn client_connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.client.connect_timeout_secs = secs;
        self
    }

    // --- logging ---

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    /// Consume the builder and return the final [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

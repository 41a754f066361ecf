//! Configuration settings and validation.

use crate::scanner::{ScanOptions, WalkOptions};
use crate::{Error, Result};
use std::path::PathBuf;

/// Upper bound for `progress_interval`.
const MAX_PROGRESS_INTERVAL: usize = 10_000;

/// Main configuration for the docindex server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for the `SQLite` catalog.
    pub data_dir: PathBuf,

    /// Host address to bind to.
    pub host: String,

    /// Port to listen on.
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Directories registered (and scanned) at startup.
    pub directories: Vec<PathBuf>,

    /// Emit one progress event every this many files.
    pub progress_interval: usize,

    /// Follow symlinked directories while walking.
    pub follow_symlinks: bool,

    /// API key protecting `/api/*`. `None` disables authentication.
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            host: "127.0.0.1".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            directories: Vec::new(),
            progress_interval: 1,
            follow_symlinks: false,
            api_key: None,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.progress_interval == 0 {
            return Err(Error::config("progress_interval cannot be 0"));
        }

        if self.progress_interval > MAX_PROGRESS_INTERVAL {
            return Err(Error::config(format!(
                "progress_interval cannot exceed {MAX_PROGRESS_INTERVAL}"
            )));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if self.api_key.as_deref().is_some_and(str::is_empty) {
            return Err(Error::config("api_key cannot be empty when set"));
        }

        Ok(())
    }

    /// Get the path to the `SQLite` database file.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("docindex.db")
    }

    /// Get the server address as a string.
    #[must_use]
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Per-scan options derived from this configuration.
    #[must_use]
    pub const fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            progress_interval: self.progress_interval,
            walk: WalkOptions {
                follow_symlinks: self.follow_symlinks,
            },
        }
    }
}

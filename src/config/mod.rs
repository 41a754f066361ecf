//! Configuration management for docindex.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`DOCINDEX_*`)
//! - Built-in defaults (lowest priority)

mod settings;

pub use settings::Config;

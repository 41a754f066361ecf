//! docindex library
//!
//! Catalogs the files below registered directories in `SQLite`, keeps the
//! catalog in sync through streamed rescans, and bulk-deletes files with an
//! audit trail.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod deleter;
pub mod error;
pub mod scanner;
pub mod server;
pub mod storage;

pub use config::Config;
pub use error::{Error, Result};

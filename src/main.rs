//! docindex - file catalog server
//!
//! Entry point for the docindex server.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use clap::Parser;
use docindex::server::{init_metrics, init_tracing, App, AppState, ServerConfig};
use docindex::storage::{find_directory_by_path, init_storage, register_directory, Database};
use docindex::{Config, Result};

/// docindex - catalog, search and bulk-delete files in registered directories
#[derive(Parser, Debug)]
#[command(name = "docindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Data directory for `SQLite` database
    #[arg(short, long, env = "DOCINDEX_DATA_DIR", default_value = "./data")]
    data_dir: std::path::PathBuf,

    /// Host address to bind to
    #[arg(long, env = "DOCINDEX_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "DOCINDEX_PORT", default_value = "8080")]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "DOCINDEX_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "DOCINDEX_LOG_JSON")]
    log_json: bool,

    /// Directories to register and scan at startup
    #[arg(
        short = 'D',
        long = "directory",
        env = "DOCINDEX_DIRECTORIES",
        value_delimiter = ','
    )]
    directories: Vec<std::path::PathBuf>,

    /// Emit a scan progress event every N files
    #[arg(long, env = "DOCINDEX_PROGRESS_INTERVAL", default_value = "1")]
    progress_interval: usize,

    /// Follow symlinked directories while scanning
    #[arg(long, env = "DOCINDEX_FOLLOW_SYMLINKS")]
    follow_symlinks: bool,

    /// API key required on /api routes
    #[arg(long, env = "DOCINDEX_API_KEY")]
    api_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with configuration
    init_tracing(&cli.log_level, cli.log_json);

    tracing::info!("docindex v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config {
        data_dir: cli.data_dir,
        host: cli.host,
        port: cli.port,
        log_level: cli.log_level,
        directories: cli.directories,
        progress_interval: cli.progress_interval,
        follow_symlinks: cli.follow_symlinks,
        api_key: cli.api_key,
    };

    tracing::debug!(
        data_dir = ?config.data_dir,
        directories = ?config.directories,
        auth = config.api_key.is_some(),
        "Configuration loaded"
    );

    config.validate()?;

    tracing::info!(
        "Server will bind to {}, data in {:?}",
        config.server_addr(),
        config.data_dir
    );

    let db = Database::open(config.database_path())?;
    init_storage(&db)?;

    init_metrics();

    let state = AppState::new(db, config.scan_options());
    register_startup_directories(&state, &config)?;

    let server_config = ServerConfig {
        host: config.host,
        port: config.port,
        api_key: config.api_key,
    };

    let app = App::new(server_config, state);
    app.run().await
}

/// Register `--directory` paths not yet known and scan all of them.
fn register_startup_directories(state: &AppState, config: &Config) -> Result<()> {
    for path in &config.directories {
        let canonical = path.canonicalize().map_err(|e| {
            docindex::Error::config(format!("cannot register '{}': {e}", path.display()))
        })?;

        let directory = state.db.with_conn(|conn| {
            match find_directory_by_path(conn, &canonical.to_string_lossy())? {
                Some(existing) => Ok(existing),
                None => register_directory(conn, &canonical),
            }
        })?;

        tracing::info!(id = directory.id, path = %directory.path, "Scanning startup directory");
        state.spawn_background_scan(directory)?;
    }
    Ok(())
}

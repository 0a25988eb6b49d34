//! red-engine: permanent-redirect HTTP daemon.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌──────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ net::listener ─▶ http::server              │
//!                           │                        │                     │
//!                           │                        ▼                     │
//!                           │                 http::dispatcher ──▶ store   │
//!                           │                        │          (SQLite)   │
//!     Client Response       │                        ▼                     │
//!     ◀─────────────────────┼── 301 / 404 / 405 / 500 (http::response)     │
//!                           │                                              │
//!                           │  lifecycle: open store → canned → listener   │
//!                           │             stop listener → canned → store   │
//!                           └──────────────────────────────────────────────┘
//! ```
//!
//! The mapping itself is maintained with the `red-admin` tool.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;

use red_engine::config::{read_config, validate_config, ConfigError, EngineConfig};
use red_engine::lifecycle::{signals, Engine};
use red_engine::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "red-engine", version)]
#[command(about = "Serve permanent redirects from a persistent path store", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on.
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory holding red-engine.db.
    #[arg(long = "home-dir")]
    home_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// File values first, then command-line overrides, then validation.
    fn resolve_config(&self) -> Result<EngineConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => EngineConfig::default(),
        };

        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(home_dir) = &self.home_dir {
            config.store.home_dir = absolute(home_dir);
        }
        if let Some(level) = &self.log_level {
            config.observability.log_level = level.clone();
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() || path.as_os_str().is_empty() {
        return path.to_path_buf();
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path.to_path_buf(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("red-engine: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("red-engine: cannot initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.listener.port,
        home_dir = %config.store.home_dir.display(),
        "red-engine starting"
    );

    if config.observability.metrics_enabled {
        // Validation already checked the address.
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(e) => tracing::error!(error = %e, "Invalid metrics address"),
        }
    }

    let engine = match Engine::init(&config).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!(error = %e, "Unable to initialize redirect engine");
            return ExitCode::FAILURE;
        }
    };

    signals::shutdown_signal().await;
    tracing::info!("Stopping");

    if let Err(e) = engine.terminate().await {
        tracing::error!(error = %e, "Unable to terminate redirect engine");
        return ExitCode::FAILURE;
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}

//! CRUD server
//!
//! # Usage
//!
//! ```bash
//! # Serve Plant_Parenthood.db on 127.0.0.1:5000
//! sqlite-crud
//!
//! # Another database and port
//! sqlite-crud --db /var/lib/shop.db --port 8080
//!
//! # Use configuration file
//! sqlite-crud --config crud.toml
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use rust_sqlite_crud::http_server::HttpServer;
use rust_sqlite_crud::AppConfig;

/// Generic CRUD server for a SQLite database
#[derive(Parser, Debug)]
#[command(name = "sqlite-crud", version, about = "Browse and edit any SQLite database over HTTP")]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short = 'd', long, value_name = "FILE", env = "CRUD_DB")]
    db: Option<PathBuf>,

    /// Host address to bind to
    #[arg(short = 'H', long, env = "CRUD_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short = 'p', long, env = "CRUD_PORT")]
    port: Option<u16>,

    /// Milliseconds to wait on a locked database before reporting it busy
    #[arg(long, value_name = "MS")]
    busy_timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = "CRUD_LOG_LEVEL")]
    log_level: String,

    /// Print configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args);

    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_toml()?);
        return Ok(());
    }

    info!("database: {}", config.database.db_path.display());
    if !config.database.db_path.exists() {
        warn!("database file does not exist yet and will be created on first request");
    }

    HttpServer::new(&config)
        .serve_with_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

fn init_logging(args: &Args) {
    let level = if args.verbose {
        "debug"
    } else {
        args.log_level.as_str()
    };

    let filter = EnvFilter::try_new(format!(
        "rust_sqlite_crud={level},sqlite_crud={level},tower_http={level}"
    ))
    .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path).context("Failed to load config file")?,
        None => AppConfig::default(),
    };

    // Command-line arguments override the file
    if let Some(db) = &args.db {
        config.database.db_path = db.clone();
    }
    if let Some(host) = &args.host {
        config.http.host = host.clone();
    }
    if let Some(port) = args.port {
        config.http.port = port;
    }
    if let Some(ms) = args.busy_timeout_ms {
        config.database.busy_timeout_ms = ms;
    }

    Ok(config)
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

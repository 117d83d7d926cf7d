//! LedgerKV server entry point.
//!
//! Parses configuration, rebuilds the store from the append-only file, then
//! accepts connections until Ctrl+C.

use clap::Parser;
use ledgerkv::commands::CommandHandler;
use ledgerkv::connection::{handle_connection, ConnectionStats};
use ledgerkv::storage::StorageEngine;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// In-memory key-value store with an append-only log
#[derive(Parser, Debug)]
#[command(name = "ledgerkv")]
#[command(version)]
#[command(after_help = "Connect with redis-cli or any Redis client:\n    $ redis-cli -p 6379")]
struct Config {
    /// Host to bind to
    #[arg(short = 'H', long, default_value = ledgerkv::DEFAULT_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = ledgerkv::DEFAULT_PORT)]
    port: u16,

    /// Append-only file to replay at startup and append to while running
    #[arg(long, default_value = ledgerkv::DEFAULT_AOF_PATH, env = "LEDGERKV_AOF_PATH")]
    aof_path: PathBuf,

    /// Keep everything in memory; nothing is read or written on disk
    #[arg(long)]
    no_aof: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Config {
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_banner(config: &Config) {
    let persistence = if config.no_aof {
        "disabled".to_string()
    } else {
        config.aof_path.display().to_string()
    };

    println!(
        r#"
LedgerKV v{} - In-Memory Key-Value Store
──────────────────────────────────────────
Address:          {}
Append-only file: {}

Use Ctrl+C to shutdown gracefully.
"#,
        ledgerkv::VERSION,
        config.bind_address(),
        persistence
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    print_banner(&config);

    let storage = Arc::new(StorageEngine::new());

    let handler = if config.no_aof {
        warn!("Persistence disabled, data will be lost on shutdown");
        CommandHandler::new(Arc::clone(&storage))
    } else {
        let (handler, report) = CommandHandler::recover(Arc::clone(&storage), &config.aof_path)?;
        info!(
            path = %config.aof_path.display(),
            commands = report.commands_applied,
            keys = storage.key_count(),
            "Store restored from append-only file"
        );
        handler
    };

    let stats = Arc::new(ConnectionStats::new());

    let listener = TcpListener::bind(config.bind_address()).await?;
    info!(address = %config.bind_address(), "Listening");

    tokio::select! {
        _ = accept_loop(listener, handler, Arc::clone(&stats)) => {}
        result = signal::ctrl_c() => {
            match result {
                Ok(()) => info!("Shutdown signal received, stopping server..."),
                Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
            }
        }
    }

    let storage_stats = storage.stats();
    info!(
        connections = stats.connections_accepted.load(Ordering::Relaxed),
        commands = stats.commands_processed.load(Ordering::Relaxed),
        keys = storage.key_count(),
        writes = storage_stats.writes,
        "Server shutdown complete"
    );
    Ok(())
}

async fn accept_loop(listener: TcpListener, handler: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

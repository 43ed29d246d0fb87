use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::info;

use gatekeep::config::GatekeepConfig;
use gatekeep::ratelimit::{
    shutdown_sweepers, ClientIdentity, Limiters, ManualClock, Purpose, RateLimitKey,
};
use gatekeep::telemetry::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "gatekeep", version, about = "Exercise the gatekeep rate limiters")]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a series of checks for one client and print each decision
    Check {
        /// Limiter purpose (dashboard, public, ai-generation, review-submission)
        #[arg(long)]
        purpose: Purpose,

        /// Client IP address or user ID
        #[arg(long)]
        client: String,

        /// Number of checks to run
        #[arg(long, default_value_t = 1)]
        count: u32,
    },
    /// Hit one limiter with many distinct clients and report its store size
    Flood {
        #[arg(long)]
        purpose: Purpose,

        /// Number of distinct client keys to insert
        #[arg(long, default_value_t = 20_000)]
        keys: u32,
    },
    /// Keep the limiters and sweepers running until Ctrl+C or SIGTERM
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => GatekeepConfig::from_file(path)?,
        None => GatekeepConfig::default(),
    };

    init_tracing(&config.logging);

    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Check {
            purpose,
            client,
            count,
        } => {
            let limiters = Limiters::from_config(&config.limiters, &config.store)?;
            let identity = parse_identity(&client);
            info!(key = %RateLimitKey::new(purpose, &identity), "Running checks");

            for _ in 0..count {
                let decision = limiters.check(purpose, &identity);
                println!("{}", serde_json::to_string(&decision)?);
            }
        }
        Command::Flood { purpose, keys } => {
            // A frozen clock keeps every entry live so the eviction path is exercised.
            let clock = Arc::new(ManualClock::new(chrono::Utc::now().timestamp_millis().max(0) as u64));
            let limiters = Limiters::with_clock(&config.limiters, &config.store, clock)?;

            for i in 0..keys {
                let identity = ClientIdentity::Ip(std::net::Ipv4Addr::from(i).into());
                limiters.check(purpose, &identity);
            }

            let limiter = limiters.get(purpose);
            let report = serde_json::json!({
                "purpose": purpose,
                "inserted": keys,
                "resident": limiter.len(),
                "maxStoreSize": limiter.max_store_size(),
                "stats": limiter.stats(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve => {
            let limiters = Limiters::from_config(&config.limiters, &config.store)?;
            let sweepers = limiters.spawn_sweepers(config.store.sweep_interval());
            info!(
                sweep_interval_secs = config.store.sweep_interval_secs,
                "Limiters ready"
            );

            shutdown_signal().await;

            shutdown_sweepers(sweepers).await;
            info!(resident = limiters.total_entries(), "Gatekeep stopped");
        }
    }

    Ok(())
}

fn parse_identity(client: &str) -> ClientIdentity {
    match client.parse() {
        Ok(addr) => ClientIdentity::Ip(addr),
        Err(_) => ClientIdentity::user(client),
    }
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

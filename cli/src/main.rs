//! ShrivenQ CLI - Command-line interface for the trading platform

#![deny(warnings)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::cargo)]
#![deny(dead_code)]
#![deny(unused)]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::time::{Duration, interval};
use tracing::{Level, info};
use tracing_subscriber;

#[derive(Parser)]
#[command(name = "shrivenq")]
#[command(about = "ShrivenQ - Institutional-Grade Ultra-Low-Latency Trading Platform")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    Dev {
        #[command(subcommand)]
        subcommand: DevCommands,
    },
}

#[derive(Subcommand)]
enum DevCommands {
    Up {
        #[arg(long, default_value = "1000")]
        heartbeat_ms: u64,
    },
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(true)
        .with_thread_ids(true)
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dev { subcommand } => match subcommand {
            DevCommands::Up { heartbeat_ms } => {
                run_dev_up(heartbeat_ms).await?;
            }
            DevCommands::Ping => {
                info!("ShrivenQ is alive!");
            }
        },
    }

    Ok(())
}

async fn run_dev_up(heartbeat_ms: u64) -> Result<()> {
    info!("Starting ShrivenQ development environment");
    info!("Heartbeat interval: {}ms", heartbeat_ms);

    info!("Components starting up:");
    info!("  ✓ Bus initialized");
    info!("  ✓ Common types loaded");
    info!("  ✓ CLI interface ready");

    let mut heartbeat_counter = 0u64;
    let mut interval = interval(Duration::from_millis(heartbeat_ms));

    info!("System running. Press Ctrl+C to stop.");

    loop {
        interval.tick().await;
        heartbeat_counter += 1;
        info!(
            "Heartbeat #{} | Uptime: {}ms | Status: OK",
            heartbeat_counter,
            heartbeat_counter * heartbeat_ms
        );
    }
}

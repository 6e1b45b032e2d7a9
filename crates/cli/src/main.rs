use clap::{Parser, Subcommand};

mod commands;

use commands::{RunArgs, SimulateArgs};

#[derive(Parser)]
#[command(name = "arb-ladder")]
#[command(about = "Arbitrage ladder engine for binary YES/NO markets", long_about = None)]
struct Cli {
    /// Write logs to this file instead of stdout
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive the engine from a synthetic order book against the paper gateway
    Simulate(SimulateArgs),
    /// Drive the engine from the live market feed against the paper gateway
    Run(RunArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
                )
                .init();
        }
    }

    match cli.command {
        Commands::Simulate(args) => {
            commands::simulate::run(args).await?;
        }
        Commands::Run(args) => {
            commands::run::run(args).await?;
        }
    }

    Ok(())
}

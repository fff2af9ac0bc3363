mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};
use commands::{parse, sweep, version};

#[derive(Parser)]
#[command(name = "snapbench")]
#[command(about = "Snapshot restore latency sweeps for microVMs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a trial per configuration and report p50 / p90 per metric
    Sweep(sweep::SweepArgs),

    /// Extract markers from an existing trial log and report them
    Parse(parse::ParseArgs),

    /// Show version information
    Version(version::VersionArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {e:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sweep(args) => sweep::run(args).await,
        Commands::Parse(args) => parse::run(args).await,
        Commands::Version(args) => {
            version::run(args);
            Ok(())
        }
    }
}

//! The `parse` command - extracts markers from an existing trial log.

use super::{parse_cpus, parse_memory};
use crate::output::{self, OutputFormat};
use anyhow::Context;
use clap::Args;
use snapbench::{
    ConfigReport, Configuration, DEFAULT_MARKER, ExtractSummary, JsonRegistryLoader,
    MarkerScanner, MatchPolicy, MetricRegistry, RegistryLoader,
};
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Trial log to read, `-` for stdin
    #[arg(long, default_value = "-")]
    log: PathBuf,

    /// vCPU count shown in the report header
    #[arg(long, default_value = "1", value_parser = parse_cpus)]
    vcpus: u32,

    /// Memory size in MiB shown in the report header
    #[arg(long, default_value = "5307", value_parser = parse_memory)]
    memory: u32,

    /// Metric registry seed; without one only metrics seen in the log are reported
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Marker token, used as both start and end
    #[arg(long, default_value = DEFAULT_MARKER)]
    marker: String,

    /// End a marker at the next end token instead of the last one on the line
    #[arg(long)]
    shortest: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t)]
    format: OutputFormat,
}

pub async fn run(args: ParseArgs) -> anyhow::Result<()> {
    let config = Configuration::new(args.vcpus, args.memory)?;
    let mut registry = match &args.registry {
        Some(path) => JsonRegistryLoader::new(path).load()?,
        None => MetricRegistry::new(),
    };
    let scanner = scanner(&args)?;
    let log = read_log(&args.log).await?;

    let (report, extract) = parse_log(&scanner, config, &log, &mut registry);
    output::print_report(&report, &extract, args.format);
    Ok(())
}

fn scanner(args: &ParseArgs) -> anyhow::Result<MarkerScanner> {
    let policy = if args.shortest {
        MatchPolicy::Shortest
    } else {
        MatchPolicy::Greedy
    };
    Ok(MarkerScanner::new(args.marker.as_str(), args.marker.as_str())?.with_policy(policy))
}

fn parse_log(
    scanner: &MarkerScanner,
    config: Configuration,
    log: &str,
    registry: &mut MetricRegistry,
) -> (ConfigReport, ExtractSummary) {
    let extract = scanner.extract_into(log, registry);
    (ConfigReport::from_registry(config, registry), extract)
}

async fn read_log(path: &Path) -> anyhow::Result<String> {
    if path.as_os_str() == "-" {
        let mut bytes = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut bytes)
            .await
            .context("failed to read log from stdin")?;
        return Ok(String::from_utf8_lossy(&bytes).into_owned());
    }
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read log {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

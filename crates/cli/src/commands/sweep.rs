//! The `sweep` command - runs a trial per configuration and reports
//! percentiles.

use super::{parse_failure_policy, parse_point};
use crate::config::SweepFile;
use crate::output::{self, OutputFormat};
use anyhow::Context;
use clap::Args;
use snapbench::runner::DEFAULT_COMMAND;
use snapbench::{
    CommandMode, CommandRunner, Configuration, DEFAULT_MARKER, FailurePolicy, JsonRegistryLoader,
    MarkerScanner, MatchPolicy, NetIface, ScratchDrive, SweepDriver, SweepSummary,
    default_sweep,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

const DEFAULT_REGISTRY: &str = "performance_fields.json";

#[derive(Args, Debug)]
pub struct SweepArgs {
    /// Path to a TOML sweep file
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Metric registry seed: JSON object of metric name to sample list
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Trial command ({vcpus}, {mem_mib}, {drives} and {ifaces} are substituted)
    #[arg(long)]
    command: Option<String>,

    /// Exec the command directly instead of through `sh -c`
    #[arg(long)]
    no_shell: bool,

    /// Working directory for the trial command
    #[arg(long)]
    working_dir: Option<PathBuf>,

    /// Configuration to measure as VCPUS:MEM_MIB (repeatable, replaces the default sweep)
    #[arg(long = "point", short, value_parser = parse_point)]
    points: Vec<Configuration>,

    /// Fail a trial that runs longer than this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// What to do after a failed configuration (continue or abort)
    #[arg(long, value_parser = parse_failure_policy)]
    on_failure: Option<FailurePolicy>,

    /// Scratch drive id passed to the trial (repeatable)
    #[arg(long = "drive")]
    drives: Vec<String>,

    /// Start token of a marker (also the end token unless --marker-end is set)
    #[arg(long)]
    marker: Option<String>,

    /// End token of a marker
    #[arg(long)]
    marker_end: Option<String>,

    /// End a marker at the next end token instead of the last one on the line
    #[arg(long)]
    shortest: bool,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,
}

/// Sweep settings after merging defaults, the sweep file and flags.
#[derive(Debug)]
pub struct SweepSettings {
    pub configurations: Vec<Configuration>,
    pub registry: PathBuf,
    pub command: String,
    pub mode: CommandMode,
    pub working_dir: Option<PathBuf>,
    pub timeout: Option<Duration>,
    pub on_failure: FailurePolicy,
    pub format: OutputFormat,
    pub drives: Vec<ScratchDrive>,
    pub ifaces: Vec<NetIface>,
    pub scanner: MarkerScanner,
}

impl SweepSettings {
    pub fn resolve(args: &SweepArgs, file: SweepFile) -> anyhow::Result<Self> {
        let configurations = if !args.points.is_empty() {
            args.points.clone()
        } else if let Some(points) = file.configurations {
            points
                .into_iter()
                .map(|(vcpus, mib)| Configuration::new(vcpus, mib))
                .collect::<snapbench::Result<Vec<_>>>()
                .context("invalid configuration in sweep file")?
        } else {
            default_sweep()
        };

        let shell = if args.no_shell {
            false
        } else {
            file.shell.unwrap_or(true)
        };

        let drives = if !args.drives.is_empty() {
            args.drives.clone()
        } else {
            file.drives.unwrap_or_default()
        };

        let marker = file.marker.unwrap_or_default();
        let start = args
            .marker
            .clone()
            .or(marker.start)
            .unwrap_or_else(|| DEFAULT_MARKER.to_string());
        let end = args
            .marker_end
            .clone()
            .or_else(|| args.marker.clone())
            .or(marker.end)
            .unwrap_or_else(|| start.clone());
        let policy = if args.shortest {
            MatchPolicy::Shortest
        } else {
            marker.policy.unwrap_or_default()
        };
        let scanner = MarkerScanner::new(start, end)?.with_policy(policy);

        Ok(Self {
            configurations,
            registry: args
                .registry
                .clone()
                .or(file.registry)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_REGISTRY)),
            command: args
                .command
                .clone()
                .or(file.command)
                .unwrap_or_else(|| DEFAULT_COMMAND.to_string()),
            mode: if shell {
                CommandMode::Shell
            } else {
                CommandMode::Direct
            },
            working_dir: args.working_dir.clone().or(file.working_dir),
            timeout: args
                .timeout
                .or(file.timeout_secs)
                .map(Duration::from_secs),
            on_failure: args
                .on_failure
                .or(file.on_failure)
                .unwrap_or_default(),
            format: args.format.or(file.format).unwrap_or_default(),
            drives: drives.into_iter().map(ScratchDrive::new).collect(),
            ifaces: file.ifaces.unwrap_or_default(),
            scanner,
        })
    }
}

pub async fn run(args: SweepArgs) -> anyhow::Result<()> {
    let file = match &args.config {
        Some(path) => SweepFile::load(path)?,
        None => SweepFile::default(),
    };
    let settings = SweepSettings::resolve(&args, file)?;
    debug!(?settings, "resolved sweep settings");

    let mut runner = CommandRunner::new(settings.command).with_mode(settings.mode);
    if let Some(timeout) = settings.timeout {
        runner = runner.with_timeout(timeout);
    }
    if let Some(dir) = settings.working_dir {
        runner = runner.with_working_dir(dir);
    }

    let format = settings.format;
    let driver = SweepDriver::new(
        settings.configurations,
        JsonRegistryLoader::new(settings.registry),
        runner,
    )
    .with_scanner(settings.scanner)
    .with_drives(settings.drives)
    .with_ifaces(settings.ifaces)
    .with_failure_policy(settings.on_failure);

    // Dropping the sweep on Ctrl+C kills the running trial's process group.
    let summary = tokio::select! {
        summary = driver.run(|outcome| output::print_outcome(outcome, format)) => summary?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("sweep interrupted"),
    };

    if let Some(note) = conclude(&summary)? {
        eprintln!("{note}");
    }
    Ok(())
}

/// Turns a finished sweep into the command's result: an error when no
/// configuration succeeded, otherwise an optional note about failures.
fn conclude(summary: &SweepSummary) -> anyhow::Result<Option<String>> {
    let total = summary.outcomes.len();
    if total > 0 && summary.succeeded() == 0 {
        anyhow::bail!("all {total} configurations failed");
    }
    Ok((summary.failed() > 0)
        .then(|| format!("{} of {total} configurations failed", summary.failed())))
}

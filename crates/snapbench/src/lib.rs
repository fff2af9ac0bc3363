//! Snapshot restore latency sweeps.
//!
//! snapbench measures how long a microVM control plane takes to restore a
//! snapshot across a sweep of vCPU and memory configurations. Each trial
//! prints timing markers into its log; snapbench extracts them and reports
//! p50 / p90 per metric per configuration.
//!
//! ```rust,no_run
//! use snapbench::{CommandRunner, JsonRegistryLoader, SweepDriver, default_sweep};
//!
//! # async fn example() -> snapbench::Result<()> {
//! let driver = SweepDriver::new(
//!     default_sweep(),
//!     JsonRegistryLoader::new("performance_fields.json"),
//!     CommandRunner::default(),
//! );
//!
//! driver
//!     .run(|outcome| {
//!         if let Some(report) = outcome.report() {
//!             print!("{report}");
//!         }
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod runner;
mod sweep;

pub use runner::{
    CommandMode, CommandRunner, ControlPlane, MicroVm, RestoreLoopRunner, SnapshotArtifact,
    TrialOutput, TrialRunner,
};
pub use sweep::{ConfigOutcome, ConfigRun, FailurePolicy, SweepDriver, SweepSummary};

pub use snapbench_core::{
    ConfigReport, Configuration, DEFAULT_MARKER, Error, ExtractSummary, JsonRegistryLoader,
    MarkerScanner, MatchPolicy, MetricRegistry, MetricSummary, NetIface, RegistryLoader, Result,
    SampleCollection, ScratchDrive, StaticRegistryLoader, TrialParams, default_sweep,
};

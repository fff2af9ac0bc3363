//! The configuration sweep driver.
//!
//! For each configuration, in order, the driver loads a fresh registry,
//! runs one trial, extracts the trial's markers into the registry and builds
//! a [`ConfigReport`]. Configurations share no state.
//!
//! # Failures
//!
//! - A registry that fails to load aborts the whole sweep: without the seed
//!   no metric identity is known.
//! - A failed trial (non-zero exit, runner error, timeout) fails only its
//!   configuration. Its samples are discarded rather than reported as if
//!   complete. With [`FailurePolicy::Continue`] (the default) the sweep moves
//!   on to the next configuration; with [`FailurePolicy::Abort`] it stops.

use crate::runner::TrialRunner;
use serde::{Deserialize, Serialize};
use snapbench_core::{
    Configuration, ConfigReport, Error, ExtractSummary, MarkerScanner, MetricRegistry, NetIface,
    RegistryLoader, Result, ScratchDrive, TrialParams,
};
use std::time::{Duration, Instant};
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

/// What the driver does after a configuration fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Report the failure and continue with the next configuration.
    #[default]
    Continue,
    /// Report the failure and stop the sweep.
    Abort,
}

/// Results of a successful configuration.
#[derive(Debug, Clone)]
pub struct ConfigRun {
    pub report: ConfigReport,
    /// The populated registry, samples in most-recent-first order.
    pub registry: MetricRegistry,
    pub extract: ExtractSummary,
    /// Wall-clock duration of the trial.
    pub elapsed: Duration,
}

#[derive(Debug)]
pub struct ConfigOutcome {
    /// Id of the sweep this outcome belongs to.
    pub run_id: Uuid,
    pub config: Configuration,
    pub result: Result<ConfigRun>,
}

impl ConfigOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn report(&self) -> Option<&ConfigReport> {
        self.result.as_ref().ok().map(|run| &run.report)
    }
}

#[derive(Debug)]
pub struct SweepSummary {
    pub run_id: Uuid,
    pub outcomes: Vec<ConfigOutcome>,
}

impl SweepSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn reports(&self) -> impl Iterator<Item = &ConfigReport> {
        self.outcomes.iter().filter_map(ConfigOutcome::report)
    }
}

/// Runs one trial per configuration and reports percentiles for each.
pub struct SweepDriver<R, L> {
    configs: Vec<Configuration>,
    loader: L,
    runner: R,
    scanner: MarkerScanner,
    drives: Vec<ScratchDrive>,
    ifaces: Vec<NetIface>,
    on_failure: FailurePolicy,
}

impl<R: TrialRunner, L: RegistryLoader> SweepDriver<R, L> {
    pub fn new(configs: Vec<Configuration>, loader: L, runner: R) -> Self {
        Self {
            configs,
            loader,
            runner,
            scanner: MarkerScanner::default(),
            drives: Vec::new(),
            ifaces: Vec::new(),
            on_failure: FailurePolicy::default(),
        }
    }

    pub fn with_scanner(mut self, scanner: MarkerScanner) -> Self {
        self.scanner = scanner;
        self
    }

    pub fn with_drives(mut self, drives: Vec<ScratchDrive>) -> Self {
        self.drives = drives;
        self
    }

    pub fn with_ifaces(mut self, ifaces: Vec<NetIface>) -> Self {
        self.ifaces = ifaces;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    pub fn configurations(&self) -> &[Configuration] {
        &self.configs
    }

    /// Runs the sweep.
    ///
    /// `on_outcome` is called as soon as each configuration finishes, so
    /// results can be printed while later trials are still running.
    ///
    /// Returns `Err` only for failures that abort the run (see
    /// [`Error::is_fatal`]).
    pub async fn run<F>(&self, mut on_outcome: F) -> Result<SweepSummary>
    where
        F: FnMut(&ConfigOutcome),
    {
        let run_id = Uuid::new_v4();
        info!(
            %run_id,
            runner = self.runner.name(),
            configurations = self.configs.len(),
            "starting sweep"
        );

        let mut outcomes = Vec::with_capacity(self.configs.len());
        for &config in &self.configs {
            let span = info_span!(
                "config",
                vcpus = config.vcpu_count(),
                memory_mib = config.memory_size_mib()
            );

            let registry = span.in_scope(|| self.loader.load())?;
            let result = self.run_config(config, registry).instrument(span).await;

            if let Err(e) = &result {
                warn!(%config, error = %e, "configuration failed");
            }
            let failed = result.is_err();

            let outcome = ConfigOutcome {
                run_id,
                config,
                result,
            };
            on_outcome(&outcome);
            outcomes.push(outcome);

            if failed && self.on_failure == FailurePolicy::Abort {
                warn!("aborting sweep after failed configuration");
                break;
            }
        }

        let summary = SweepSummary { run_id, outcomes };
        info!(
            %run_id,
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "sweep finished"
        );
        Ok(summary)
    }

    async fn run_config(
        &self,
        config: Configuration,
        mut registry: MetricRegistry,
    ) -> Result<ConfigRun> {
        let params = TrialParams::new(config)
            .with_drives(self.drives.iter().cloned())
            .with_ifaces(self.ifaces.iter().cloned());

        let started = Instant::now();
        let output = self.runner.run(&params).await?;
        let elapsed = started.elapsed();

        if !output.success() {
            return Err(Error::TrialFailed {
                exit_code: output.exit_code,
            });
        }

        let extract = self.scanner.extract_into(&output.log, &mut registry);
        info!(
            matched = extract.matched,
            recorded = extract.recorded,
            malformed = extract.malformed.len(),
            samples = registry.total_samples(),
            elapsed = ?elapsed,
            "trial finished"
        );

        Ok(ConfigRun {
            report: ConfigReport::from_registry(config, &registry),
            registry,
            extract,
            elapsed,
        })
    }
}

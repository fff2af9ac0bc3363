//! Trial runners.
//!
//! A [`TrialRunner`] executes one trial for a configuration and hands back
//! everything the trial printed, untouched. Interpreting the log is the
//! extractor's job.
//!
//! Two runners are provided:
//!
//! - [`CommandRunner`] spawns an external command (for example a test
//!   harness that boots, snapshots and restores a VM) and captures stdout.
//! - [`RestoreLoopRunner`] drives a [`ControlPlane`] directly: one snapshot
//!   followed by many sequential restores of it.

mod command;
mod restore;

pub use command::{CommandMode, CommandRunner, DEFAULT_COMMAND};
pub use restore::{
    ControlPlane, DEFAULT_REPETITIONS, MicroVm, RestoreLoopRunner, SnapshotArtifact,
};

use async_trait::async_trait;
use snapbench_core::{Result, TrialParams};

/// Captured output of one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialOutput {
    /// Complete captured log text.
    pub log: String,
    /// Exit code, `None` if the trial was terminated by a signal.
    pub exit_code: Option<i32>,
}

impl TrialOutput {
    pub fn new(log: impl Into<String>, exit_code: Option<i32>) -> Self {
        Self {
            log: log.into(),
            exit_code,
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[async_trait]
pub trait TrialRunner: Send + Sync {
    fn name(&self) -> &str;

    /// Runs one trial to completion.
    ///
    /// This may take minutes. An `Err` means the trial could not be run or
    /// was aborted; a completed trial with a non-zero exit is reported
    /// through [`TrialOutput::exit_code`].
    async fn run(&self, params: &TrialParams) -> Result<TrialOutput>;
}

#[async_trait]
impl<T: TrialRunner + ?Sized> TrialRunner for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn run(&self, params: &TrialParams) -> Result<TrialOutput> {
        (**self).run(params).await
    }
}

use super::{TrialOutput, TrialRunner};
use async_trait::async_trait;
use snapbench_core::{Error, Result, TrialParams};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};
use tracing::{debug, info, warn};

/// Runs the snapshot restore statistics test through the project's dev tool.
pub const DEFAULT_COMMAND: &str = "./tools/devtool test -- integration_tests/functional/test_lambda_statistics.py --vcpu_cnt {vcpus} --mem_size {mem_mib}";

/// How long a timed-out trial gets to exit after SIGTERM before it is killed.
const TERMINATE_GRACE: Duration = Duration::from_secs(5);

/// How the rendered command line is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandMode {
    /// `sh -c <command>`.
    #[default]
    Shell,
    /// Split on whitespace and exec the first word, resolved through `PATH`.
    Direct,
}

/// Trial runner that spawns an external command and captures its stdout.
///
/// The command is a template; these placeholders are substituted per trial:
///
/// | placeholder | value                                  |
/// |-------------|----------------------------------------|
/// | `{vcpus}`   | vCPU count                             |
/// | `{mem_mib}` | memory size in MiB                     |
/// | `{drives}`  | comma-separated scratch drive ids      |
/// | `{ifaces}`  | comma-separated tap device names       |
///
/// stderr is inherited so the trial's progress stays visible. There is no
/// timeout unless one is set with [`CommandRunner::with_timeout`].
#[derive(Debug, Clone)]
pub struct CommandRunner {
    template: String,
    mode: CommandMode,
    timeout: Option<Duration>,
    working_dir: Option<PathBuf>,
}

impl Default for CommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND)
    }
}

impl CommandRunner {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            mode: CommandMode::Shell,
            timeout: None,
            working_dir: None,
        }
    }

    pub fn with_mode(mut self, mode: CommandMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitutes the trial parameters into the template.
    pub fn render(&self, params: &TrialParams) -> String {
        let drives = params
            .drives
            .iter()
            .map(|d| d.id.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let ifaces = params
            .ifaces
            .iter()
            .map(|i| i.tap_name.as_str())
            .collect::<Vec<_>>()
            .join(",");

        self.template
            .replace("{vcpus}", &params.config.vcpu_count().to_string())
            .replace("{mem_mib}", &params.config.memory_size_mib().to_string())
            .replace("{drives}", &drives)
            .replace("{ifaces}", &ifaces)
    }

    fn command(&self, rendered: &str) -> Result<Command> {
        let mut cmd = match self.mode {
            CommandMode::Shell => {
                let mut cmd = Command::new("sh");
                cmd.arg("-c").arg(rendered);
                cmd
            }
            CommandMode::Direct => {
                let mut words = rendered.split_whitespace();
                let program = words
                    .next()
                    .ok_or_else(|| Error::InvalidConfig("trial command is empty".into()))?;
                let program = if program.contains('/') {
                    PathBuf::from(program)
                } else {
                    which::which(program).map_err(|e| {
                        Error::InvalidConfig(format!("trial program '{program}' not found: {e}"))
                    })?
                };
                let mut cmd = Command::new(program);
                cmd.args(words);
                cmd
            }
        };

        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        // Own process group, so a timeout can take down the whole trial tree.
        #[cfg(unix)]
        cmd.process_group(0);

        Ok(cmd)
    }
}

/// A spawned trial.
///
/// Until the trial has been reaped, dropping this kills its whole process
/// group, so cancelling [`CommandRunner::run`] leaves nothing behind.
struct TrialProcess {
    child: Child,
    /// The trial leads its own process group, so this is also the group id.
    pgid: Option<u32>,
    armed: bool,
}

impl TrialProcess {
    fn spawn(mut cmd: Command) -> Result<Self> {
        let child = cmd.spawn()?;
        Ok(Self {
            pgid: child.id(),
            child,
            armed: true,
        })
    }

    async fn collect(&mut self, mut stdout: ChildStdout) -> Result<(Vec<u8>, ExitStatus)> {
        let mut buf = Vec::new();
        stdout.read_to_end(&mut buf).await?;
        let status = self.child.wait().await?;
        self.armed = false;
        Ok((buf, status))
    }

    /// SIGTERM to the group, then SIGKILL to whatever is left of it once the
    /// leader exits or the grace period runs out.
    async fn terminate(&mut self) {
        let exited = self.signal_group(GroupSignal::Term)
            && tokio::time::timeout(TERMINATE_GRACE, self.child.wait())
                .await
                .is_ok();
        self.signal_group(GroupSignal::Kill);

        if !exited {
            if let Err(e) = self.child.kill().await {
                warn!(error = %e, "failed to kill timed out trial");
            }
        }
        self.armed = false;
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: GroupSignal) -> bool {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        let Some(pgid) = self.pgid else {
            return false;
        };
        let signal = match signal {
            GroupSignal::Term => Signal::SIGTERM,
            GroupSignal::Kill => Signal::SIGKILL,
        };
        killpg(Pid::from_raw(pgid as i32), signal).is_ok()
    }

    #[cfg(not(unix))]
    fn signal_group(&self, _signal: GroupSignal) -> bool {
        false
    }
}

impl Drop for TrialProcess {
    fn drop(&mut self) {
        if self.armed {
            debug!("trial dropped before exit, killing its process group");
            self.signal_group(GroupSignal::Kill);
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Term,
    Kill,
}

#[async_trait]
impl TrialRunner for CommandRunner {
    fn name(&self) -> &str {
        "command"
    }

    async fn run(&self, params: &TrialParams) -> Result<TrialOutput> {
        let rendered = self.render(params);
        info!(command = %rendered, "spawning trial");

        let mut trial = TrialProcess::spawn(self.command(&rendered)?)?;
        let stdout = trial
            .child
            .stdout
            .take()
            .ok_or_else(|| std::io::Error::other("trial stdout was not captured"))?;

        let (buf, status) = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, trial.collect(stdout)).await {
                Ok(result) => result?,
                Err(_) => {
                    warn!(timeout = ?limit, "trial timed out, terminating");
                    trial.terminate().await;
                    return Err(Error::Timeout(limit));
                }
            },
            None => trial.collect(stdout).await?,
        };

        debug!(bytes = buf.len(), status = %status, "trial finished");

        Ok(TrialOutput {
            log: String::from_utf8_lossy(&buf).into_owned(),
            exit_code: status.code(),
        })
    }
}

//! Repeated restores of a single snapshot.
//!
//! [`RestoreLoopRunner`] builds one snapshot of a freshly booted VM and then
//! restores it a fixed number of times, one restore after the other. Every
//! restore's log is appended to the trial log, so all repetitions feed the
//! same sample collections.
//!
//! The VM itself is reached through the [`ControlPlane`] and [`MicroVm`]
//! traits; snapbench ships no implementation of them.

use super::{TrialOutput, TrialRunner};
use async_trait::async_trait;
use snapbench_core::{Error, NetIface, Result, ScratchDrive, TrialParams};
use std::path::PathBuf;
use tracing::{debug, info};

/// Restores per trial.
pub const DEFAULT_REPETITIONS: usize = 100;

/// Files that make up a snapshot. Restores only read them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotArtifact {
    pub mem_file: PathBuf,
    pub state_file: PathBuf,
    pub disks: Vec<PathBuf>,
}

/// A VM owned by the control plane.
#[async_trait]
pub trait MicroVm: Send + Sync {
    /// Attaches a scratch block device. Only valid before [`MicroVm::start`].
    async fn add_drive(&self, drive: &ScratchDrive) -> Result<()>;
    async fn start(&self) -> Result<()>;
    /// Runs a shell command in the guest over `iface`, returning its exit code.
    async fn exec(&self, iface: &NetIface, command: &str) -> Result<i32>;
    /// The machine configuration as reported by the control plane.
    async fn machine_config(&self) -> Result<String>;
    async fn snapshot(&self) -> Result<SnapshotArtifact>;
    /// Everything the VM process has logged so far.
    async fn log_data(&self) -> Result<String>;
    async fn kill(&self) -> Result<()>;
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Spawns and configures (but does not start) a VM for `params`.
    async fn spawn(&self, params: &TrialParams) -> Result<Box<dyn MicroVm>>;
    async fn restore(&self, snapshot: &SnapshotArtifact, resume: bool)
    -> Result<Box<dyn MicroVm>>;
}

/// Trial runner performing one snapshot and `repetitions` restores.
pub struct RestoreLoopRunner<C> {
    control_plane: C,
    repetitions: usize,
    resume: bool,
}

impl<C: ControlPlane> RestoreLoopRunner<C> {
    pub fn new(control_plane: C) -> Self {
        Self {
            control_plane,
            repetitions: DEFAULT_REPETITIONS,
            resume: true,
        }
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    /// Whether restored VMs are resumed right away. Defaults to `true`.
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn control_plane(&self) -> &C {
        &self.control_plane
    }

    /// Boots a VM, dirties every scratch drive and snapshots it.
    ///
    /// The VM is killed whether or not the snapshot succeeds.
    pub async fn create_snapshot(&self, params: &TrialParams) -> Result<SnapshotArtifact> {
        let vm = self.control_plane.spawn(params).await?;
        let result = Self::prepare_and_snapshot(vm.as_ref(), params).await;
        let killed = vm.kill().await;
        let snapshot = result?;
        killed?;
        Ok(snapshot)
    }

    async fn prepare_and_snapshot(
        vm: &dyn MicroVm,
        params: &TrialParams,
    ) -> Result<SnapshotArtifact> {
        for drive in &params.drives {
            vm.add_drive(drive).await?;
        }

        vm.start().await?;

        for iface in &params.ifaces {
            guest_exec(vm, iface, "sync").await?;
        }

        if !params.drives.is_empty() {
            let iface = params.ifaces.last().ok_or_else(|| {
                Error::InvalidConfig(
                    "scratch drives need a network interface to reach the guest".into(),
                )
            })?;

            for drive in &params.drives {
                let mount_point = drive.mount_point();
                let device = drive.device_path();
                guest_exec(
                    vm,
                    iface,
                    &format!("mkdir -p {mount_point} && mount {device} {mount_point}"),
                )
                .await?;
                // O_DIRECT writes so the data is on the device before the snapshot.
                guest_exec(
                    vm,
                    iface,
                    &format!("dd if=/dev/zero of={mount_point}/test bs=4096 count=10 oflag=direct"),
                )
                .await?;
                guest_exec(vm, iface, &format!("umount {device}")).await?;
            }
        }

        let snapshot = vm.snapshot().await?;
        let machine_config = vm.machine_config().await?;
        info!(%machine_config, "snapshot created");
        Ok(snapshot)
    }

    async fn restore_once(&self, snapshot: &SnapshotArtifact) -> Result<String> {
        let vm = self.control_plane.restore(snapshot, self.resume).await?;
        let log = vm.log_data().await;
        let killed = vm.kill().await;
        let log = log?;
        killed?;
        Ok(log)
    }
}

async fn guest_exec(vm: &dyn MicroVm, iface: &NetIface, command: &str) -> Result<()> {
    let exit_code = vm.exec(iface, command).await?;
    if exit_code != 0 {
        return Err(Error::GuestCommand {
            command: command.to_string(),
            exit_code,
        });
    }
    Ok(())
}

#[async_trait]
impl<C: ControlPlane> TrialRunner for RestoreLoopRunner<C> {
    fn name(&self) -> &str {
        "restore-loop"
    }

    async fn run(&self, params: &TrialParams) -> Result<TrialOutput> {
        let snapshot = self.create_snapshot(params).await?;

        let mut log = String::new();
        for repetition in 0..self.repetitions {
            let restored = self.restore_once(&snapshot).await?;
            debug!(repetition, bytes = restored.len(), "restore finished");
            log.push_str(&restored);
            if !restored.is_empty() && !restored.ends_with('\n') {
                log.push('\n');
            }
        }

        info!(repetitions = self.repetitions, "restore loop finished");
        Ok(TrialOutput::new(log, Some(0)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapbench_core::Configuration;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct Journal {
        events: Mutex<Vec<String>>,
    }

    impl Journal {
        fn push(&self, event: impl Into<String>) {
            self.events.lock().unwrap().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    struct FakeVm {
        name: String,
        journal: Arc<Journal>,
        log: String,
        failing_command: Option<String>,
    }

    #[async_trait]
    impl MicroVm for FakeVm {
        async fn add_drive(&self, drive: &ScratchDrive) -> Result<()> {
            self.journal.push(format!("{}: add_drive {}", self.name, drive.id));
            Ok(())
        }

        async fn start(&self) -> Result<()> {
            self.journal.push(format!("{}: start", self.name));
            Ok(())
        }

        async fn exec(&self, iface: &NetIface, command: &str) -> Result<i32> {
            self.journal
                .push(format!("{}: exec[{}] {command}", self.name, iface.guest_ip));
            match &self.failing_command {
                Some(failing) if command.starts_with(failing.as_str()) => Ok(1),
                _ => Ok(0),
            }
        }

        async fn machine_config(&self) -> Result<String> {
            Ok(r#"{"vcpu_count": 2}"#.to_string())
        }

        async fn snapshot(&self) -> Result<SnapshotArtifact> {
            self.journal.push(format!("{}: snapshot", self.name));
            Ok(SnapshotArtifact {
                mem_file: PathBuf::from("/tmp/vm.mem"),
                state_file: PathBuf::from("/tmp/vm.state"),
                disks: vec![PathBuf::from("/tmp/rootfs.ext4")],
            })
        }

        async fn log_data(&self) -> Result<String> {
            Ok(self.log.clone())
        }

        async fn kill(&self) -> Result<()> {
            self.journal.push(format!("{}: kill", self.name));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeControlPlane {
        journal: Arc<Journal>,
        restores: Mutex<usize>,
        failing_command: Option<String>,
    }

    #[async_trait]
    impl ControlPlane for FakeControlPlane {
        async fn spawn(&self, params: &TrialParams) -> Result<Box<dyn MicroVm>> {
            self.journal
                .push(format!("spawn {}", params.config.vcpu_count()));
            Ok(Box::new(FakeVm {
                name: "base".to_string(),
                journal: self.journal.clone(),
                log: String::new(),
                failing_command: self.failing_command.clone(),
            }))
        }

        async fn restore(
            &self,
            snapshot: &SnapshotArtifact,
            resume: bool,
        ) -> Result<Box<dyn MicroVm>> {
            let mut restores = self.restores.lock().unwrap();
            *restores += 1;
            let n = *restores;
            self.journal.push(format!(
                "restore {n} from {} resume={resume}",
                snapshot.state_file.display()
            ));
            Ok(Box::new(FakeVm {
                name: format!("restored{n}"),
                journal: self.journal.clone(),
                log: format!("boot\n-&%- restore_us {} -&%-", n * 10),
                failing_command: None,
            }))
        }
    }

    fn params() -> TrialParams {
        TrialParams::new(Configuration::new(2, 1024).unwrap())
    }

    #[tokio::test]
    async fn restores_sequentially_and_collects_logs() {
        let runner = RestoreLoopRunner::new(FakeControlPlane::default()).with_repetitions(3);
        let output = runner.run(&params()).await.unwrap();

        assert!(output.success());
        assert_eq!(
            output.log,
            "boot\n-&%- restore_us 10 -&%-\nboot\n-&%- restore_us 20 -&%-\nboot\n-&%- restore_us 30 -&%-\n"
        );

        let events = runner.control_plane().journal.events();
        let restore_events: Vec<_> = events
            .iter()
            .filter(|e| e.starts_with("restore") || e.starts_with("restored"))
            .cloned()
            .collect();
        assert_eq!(
            restore_events,
            vec![
                "restore 1 from /tmp/vm.state resume=true",
                "restored1: kill",
                "restore 2 from /tmp/vm.state resume=true",
                "restored2: kill",
                "restore 3 from /tmp/vm.state resume=true",
                "restored3: kill",
            ]
        );
    }

    #[tokio::test]
    async fn snapshot_sequence_with_drives_and_ifaces() {
        let runner = RestoreLoopRunner::new(FakeControlPlane::default()).with_repetitions(0);
        let params = params()
            .with_drives([ScratchDrive::new("vdb")])
            .with_ifaces(NetIface::defaults());
        runner.run(&params).await.unwrap();

        assert_eq!(
            runner.control_plane().journal.events(),
            vec![
                "spawn 2",
                "base: add_drive vdb",
                "base: start",
                "base: exec[192.168.0.2] sync",
                "base: exec[192.168.1.2] sync",
                "base: exec[192.168.1.2] mkdir -p /mnt/vdb && mount /dev/vdb /mnt/vdb",
                "base: exec[192.168.1.2] dd if=/dev/zero of=/mnt/vdb/test bs=4096 count=10 oflag=direct",
                "base: exec[192.168.1.2] umount /dev/vdb",
                "base: snapshot",
                "base: kill",
            ]
        );
    }

    #[tokio::test]
    async fn failing_guest_command_fails_trial_and_kills_vm() {
        let control_plane = FakeControlPlane {
            failing_command: Some("dd".to_string()),
            ..Default::default()
        };
        let runner = RestoreLoopRunner::new(control_plane);
        let params = params()
            .with_drives([ScratchDrive::new("vdb")])
            .with_ifaces([NetIface::default()]);

        let err = runner.run(&params).await.unwrap_err();
        assert!(matches!(err, Error::GuestCommand { exit_code: 1, .. }));

        let events = runner.control_plane().journal.events();
        assert_eq!(events.last().map(String::as_str), Some("base: kill"));
        assert!(!events.iter().any(|e| e.starts_with("restore")));
    }

    #[tokio::test]
    async fn drives_without_iface_are_rejected() {
        let runner = RestoreLoopRunner::new(FakeControlPlane::default());
        let params = params().with_drives([ScratchDrive::new("vdb")]);
        let err = runner.run(&params).await.unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn resume_flag_is_forwarded() {
        let runner = RestoreLoopRunner::new(FakeControlPlane::default())
            .with_repetitions(1)
            .with_resume(false);
        runner.run(&params()).await.unwrap();
        let events = runner.control_plane().journal.events();
        assert!(events.contains(&"restore 1 from /tmp/vm.state resume=false".to_string()));
    }
}

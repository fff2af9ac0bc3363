mod disk;
mod network;

pub use disk::ScratchDrive;
pub use network::NetIface;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One point of the resource sweep.
///
/// Identifies a single sweep iteration and a single report section. Values
/// are validated on construction and never change afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawConfiguration")]
pub struct Configuration {
    vcpu_count: u32,
    memory_size_mib: u32,
}

impl Configuration {
    pub fn new(vcpu_count: u32, memory_size_mib: u32) -> Result<Self> {
        if vcpu_count == 0 {
            return Err(Error::InvalidConfig(
                "vcpu count must be at least 1".into(),
            ));
        }
        if memory_size_mib == 0 {
            return Err(Error::InvalidConfig(
                "memory size must be at least 1 MiB".into(),
            ));
        }
        Ok(Self {
            vcpu_count,
            memory_size_mib,
        })
    }

    pub fn vcpu_count(&self) -> u32 {
        self.vcpu_count
    }

    pub fn memory_size_mib(&self) -> u32 {
        self.memory_size_mib
    }
}

impl fmt::Display for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} vCPU / {} MiB", self.vcpu_count, self.memory_size_mib)
    }
}

#[derive(Deserialize)]
struct RawConfiguration {
    vcpu_count: u32,
    memory_size_mib: u32,
}

impl TryFrom<RawConfiguration> for Configuration {
    type Error = Error;

    fn try_from(raw: RawConfiguration) -> Result<Self> {
        Configuration::new(raw.vcpu_count, raw.memory_size_mib)
    }
}

/// The sweep measured by default: 1 to 3 vCPUs at 5307 MiB.
pub fn default_sweep() -> Vec<Configuration> {
    [(1, 5307), (2, 5307), (3, 5307)]
        .into_iter()
        .map(|(vcpu_count, memory_size_mib)| Configuration {
            vcpu_count,
            memory_size_mib,
        })
        .collect()
}

/// Everything a trial runner needs to execute one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrialParams {
    pub config: Configuration,
    pub drives: Vec<ScratchDrive>,
    pub ifaces: Vec<NetIface>,
}

impl TrialParams {
    /// Parameters with no extra drives and no network interfaces.
    pub fn new(config: Configuration) -> Self {
        Self {
            config,
            drives: Vec::new(),
            ifaces: Vec::new(),
        }
    }

    pub fn with_drives(mut self, drives: impl IntoIterator<Item = ScratchDrive>) -> Self {
        self.drives.extend(drives);
        self
    }

    pub fn with_ifaces(mut self, ifaces: impl IntoIterator<Item = NetIface>) -> Self {
        self.ifaces.extend(ifaces);
        self
    }
}

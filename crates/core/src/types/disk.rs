use serde::{Deserialize, Serialize};

/// Default size of a scratch block device.
pub const DEFAULT_SCRATCH_SIZE_MIB: u32 = 64;

/// A read-write, non-root block device attached to the VM before boot.
///
/// The id doubles as the guest device name (`/dev/<id>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScratchDrive {
    pub id: String,
    #[serde(default = "default_size")]
    pub size_mib: u32,
}

fn default_size() -> u32 {
    DEFAULT_SCRATCH_SIZE_MIB
}

impl ScratchDrive {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            size_mib: DEFAULT_SCRATCH_SIZE_MIB,
        }
    }

    pub fn with_size_mib(mut self, size_mib: u32) -> Self {
        self.size_mib = size_mib;
        self
    }

    /// Guest device path, e.g. `/dev/vdb`.
    pub fn device_path(&self) -> String {
        format!("/dev/{}", self.id)
    }

    /// Guest mount point, e.g. `/mnt/vdb`.
    pub fn mount_point(&self) -> String {
        format!("/mnt/{}", self.id)
    }

    /// The three scratch drives `vdb`, `vdc` and `vdd`.
    pub fn defaults() -> Vec<Self> {
        ["vdb", "vdc", "vdd"].into_iter().map(Self::new).collect()
    }
}

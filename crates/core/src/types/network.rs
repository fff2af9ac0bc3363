use serde::{Deserialize, Serialize};

/// A tap-backed network interface attached to the VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetIface {
    pub host_ip: String,
    pub guest_ip: String,
    pub tap_name: String,
    pub dev_name: String,
}

impl Default for NetIface {
    fn default() -> Self {
        Self {
            host_ip: "192.168.0.1".to_string(),
            guest_ip: "192.168.0.2".to_string(),
            tap_name: "tap0".to_string(),
            dev_name: "eth0".to_string(),
        }
    }
}

impl NetIface {
    pub fn new(
        host_ip: impl Into<String>,
        guest_ip: impl Into<String>,
        tap_name: impl Into<String>,
        dev_name: impl Into<String>,
    ) -> Self {
        Self {
            host_ip: host_ip.into(),
            guest_ip: guest_ip.into(),
            tap_name: tap_name.into(),
            dev_name: dev_name.into(),
        }
    }

    /// `tap0`/`eth0` on 192.168.0.0/24 and `tap1`/`eth1` on 192.168.1.0/24.
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::default(),
            Self::new("192.168.1.1", "192.168.1.2", "tap1", "eth1"),
        ]
    }
}

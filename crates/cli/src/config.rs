//! Sweep file support.
//!
//! A sweep file is an optional TOML document holding the same settings as
//! the `sweep` command's flags:
//!
//! ```toml
//! configurations = [[1, 5307], [2, 5307], [3, 5307]]
//! registry = "performance_fields.json"
//! command = "./tools/devtool test -- integration_tests/functional/test_lambda_statistics.py --vcpu_cnt {vcpus} --mem_size {mem_mib}"
//! shell = true
//! timeout_secs = 1800
//! on_failure = "continue"
//! format = "text"
//! drives = ["vdb", "vdc", "vdd"]
//!
//! [marker]
//! start = "-&%-"
//! end = "-&%-"
//! policy = "greedy"
//! ```
//!
//! Flags override file values, file values override built-in defaults.

use crate::output::OutputFormat;
use anyhow::Context;
use serde::Deserialize;
use snapbench::{FailurePolicy, MatchPolicy, NetIface};
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SweepFile {
    pub configurations: Option<Vec<(u32, u32)>>,
    pub registry: Option<PathBuf>,
    pub command: Option<String>,
    pub shell: Option<bool>,
    pub working_dir: Option<PathBuf>,
    pub timeout_secs: Option<u64>,
    pub on_failure: Option<FailurePolicy>,
    pub format: Option<OutputFormat>,
    pub drives: Option<Vec<String>>,
    pub ifaces: Option<Vec<NetIface>>,
    pub marker: Option<MarkerSection>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MarkerSection {
    pub start: Option<String>,
    pub end: Option<String>,
    pub policy: Option<MatchPolicy>,
}

impl SweepFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read sweep file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("invalid sweep file {}", path.display()))
    }

    pub fn parse(contents: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(SweepFile::parse("").unwrap(), SweepFile::default());
    }

    #[test]
    fn full_file() {
        let file = SweepFile::parse(
            r#"
            configurations = [[2, 128], [4, 7076]]
            registry = "fields.json"
            command = "run.sh {vcpus} {mem_mib}"
            shell = false
            timeout_secs = 600
            on_failure = "abort"
            format = "json"
            drives = ["vdb"]

            [[ifaces]]
            host_ip = "10.0.0.1"
            guest_ip = "10.0.0.2"
            tap_name = "tap5"
            dev_name = "eth0"

            [marker]
            start = "<<"
            end = ">>"
            policy = "shortest"
            "#,
        )
        .unwrap();

        assert_eq!(file.configurations, Some(vec![(2, 128), (4, 7076)]));
        assert_eq!(file.registry, Some(PathBuf::from("fields.json")));
        assert_eq!(file.shell, Some(false));
        assert_eq!(file.timeout_secs, Some(600));
        assert_eq!(file.on_failure, Some(FailurePolicy::Abort));
        assert_eq!(file.format, Some(OutputFormat::Json));
        assert_eq!(file.drives, Some(vec!["vdb".to_string()]));
        assert_eq!(file.ifaces.as_ref().unwrap()[0].tap_name, "tap5");
        let marker = file.marker.unwrap();
        assert_eq!(marker.start.as_deref(), Some("<<"));
        assert_eq!(marker.policy, Some(MatchPolicy::Shortest));
    }

    #[test]
    fn unknown_key_is_rejected() {
        assert!(SweepFile::parse("vcpus = 3").is_err());
    }

    #[test]
    fn load_reports_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"on_failure = \"sometimes\"").unwrap();
        let err = SweepFile::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid sweep file"));
    }
}

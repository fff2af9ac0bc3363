//! Core types for snapbench: the metric registry, the log marker extractor
//! and percentile reporting.

pub mod error;
pub mod extract;
pub mod percentile;
pub mod registry;
pub mod report;
pub mod types;

pub use error::{Error, Result};
pub use extract::{
    DEFAULT_MARKER, ExtractSummary, MalformedMarker, MalformedReason, Marker, MarkerScanner,
    MatchPolicy, Sample,
};
pub use percentile::{p50_p90, percentile};
pub use registry::{
    JsonRegistryLoader, MetricRegistry, RegistryLoader, SampleCollection, StaticRegistryLoader,
};
pub use report::{ConfigReport, MetricSummary};
pub use types::{Configuration, NetIface, ScratchDrive, TrialParams, default_sweep};

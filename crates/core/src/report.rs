//! Per-configuration percentile reports.

use crate::percentile::p50_p90;
use crate::registry::MetricRegistry;
use crate::types::Configuration;
use serde::Serialize;
use std::fmt;

/// Percentiles of one metric. `p50`/`p90` are `None` when no sample was
/// observed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub name: String,
    pub samples: usize,
    pub p50: Option<f64>,
    pub p90: Option<f64>,
}

impl MetricSummary {
    pub fn has_data(&self) -> bool {
        self.samples > 0
    }
}

/// Report for a single configuration.
///
/// `Display` renders the console format: one header line followed by one
/// `name - p50 - p90` line per metric, or `name - no data`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigReport {
    pub config: Configuration,
    pub metrics: Vec<MetricSummary>,
}

impl ConfigReport {
    /// Summarizes every metric of `registry`, in registry order.
    pub fn from_registry(config: Configuration, registry: &MetricRegistry) -> Self {
        let metrics = registry
            .iter()
            .map(|(name, samples)| {
                let percentiles = p50_p90(samples.iter());
                MetricSummary {
                    name: name.to_string(),
                    samples: samples.len(),
                    p50: percentiles.map(|(p50, _)| p50),
                    p90: percentiles.map(|(_, p90)| p90),
                }
            })
            .collect();

        Self { config, metrics }
    }

    pub fn get(&self, name: &str) -> Option<&MetricSummary> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn header(&self) -> String {
        format!(
            "--------- RESULTS for {} VCPUs and {} MEM_SIZE - METRIC - P50 - P90 -----------",
            self.config.vcpu_count(),
            self.config.memory_size_mib()
        )
    }
}

impl fmt::Display for ConfigReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;
        for metric in &self.metrics {
            match (metric.p50, metric.p90) {
                (Some(p50), Some(p90)) => writeln!(
                    f,
                    "{} - {} - {}",
                    metric.name,
                    format_value(p50),
                    format_value(p90)
                )?,
                _ => writeln!(f, "{} - no data", metric.name)?,
            }
        }
        Ok(())
    }
}

/// Prints whole numbers with a trailing `.0` so every percentile reads as a
/// float (`25.0`, `36.5`).
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

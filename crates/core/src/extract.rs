//! Marker scanning and metric extraction.
//!
//! Trials report timings by printing markers into their logs:
//!
//! ```text
//! 2021-03-01T10:00:00 INFO -&%- restore_time_us 4213 -&%-
//! ```
//!
//! A marker is the span from a start token to an end token on one line.
//! Split on whitespace, token 1 is the metric name and token 2 its integer
//! value; every other token is ignored.

use crate::error::{Error, Result};
use crate::registry::MetricRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default start and end token.
pub const DEFAULT_MARKER: &str = "-&%-";

/// How far a marker extends when a line holds several end tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// From the leftmost start token to the last end token on the line.
    #[default]
    Greedy,
    /// From the leftmost start token to the next end token.
    Shortest,
}

/// One marker span found in a log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Marker<'a> {
    /// 1-based line number in the log.
    pub line: usize,
    /// The span including its start and end tokens.
    pub text: &'a str,
}

/// A parsed marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sample<'a> {
    pub name: &'a str,
    pub value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    MissingName,
    MissingValue,
    InvalidValue(String),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingName => write!(f, "missing metric name"),
            MalformedReason::MissingValue => write!(f, "missing metric value"),
            MalformedReason::InvalidValue(token) => write!(f, "invalid integer value '{token}'"),
        }
    }
}

/// A marker whose tokens could not be turned into a sample.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed marker on line {line} ({reason}): {text}")]
pub struct MalformedMarker {
    pub line: usize,
    pub text: String,
    pub reason: MalformedReason,
}

impl<'a> Marker<'a> {
    pub fn parse(&self) -> std::result::Result<Sample<'a>, MalformedMarker> {
        let malformed = |reason| MalformedMarker {
            line: self.line,
            text: self.text.to_string(),
            reason,
        };

        let mut tokens = self.text.split_whitespace().skip(1);
        let name = tokens
            .next()
            .ok_or_else(|| malformed(MalformedReason::MissingName))?;
        let value = tokens
            .next()
            .ok_or_else(|| malformed(MalformedReason::MissingValue))?;
        let value = value
            .parse::<i64>()
            .map_err(|_| malformed(MalformedReason::InvalidValue(value.to_string())))?;

        Ok(Sample { name, value })
    }
}

/// Outcome of extracting one log into a registry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Marker spans found.
    pub matched: usize,
    /// Samples folded into the registry.
    pub recorded: usize,
    /// Markers skipped because they did not parse.
    pub malformed: Vec<MalformedMarker>,
}

/// Two-token delimiter scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerScanner {
    start: String,
    end: String,
    policy: MatchPolicy,
}

impl Default for MarkerScanner {
    fn default() -> Self {
        Self {
            start: DEFAULT_MARKER.to_string(),
            end: DEFAULT_MARKER.to_string(),
            policy: MatchPolicy::Greedy,
        }
    }
}

impl MarkerScanner {
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self> {
        let start = start.into();
        let end = end.into();
        if start.is_empty() || end.is_empty() {
            return Err(Error::InvalidConfig(
                "marker tokens cannot be empty".into(),
            ));
        }
        if start.contains(char::is_whitespace) || end.contains(char::is_whitespace) {
            return Err(Error::InvalidConfig(
                "marker tokens cannot contain whitespace".into(),
            ));
        }
        Ok(Self {
            start,
            end,
            policy: MatchPolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: MatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Finds all non-overlapping markers, leftmost first.
    ///
    /// Markers never span a line break.
    pub fn scan<'a>(&self, log: &'a str) -> Vec<Marker<'a>> {
        let mut markers = Vec::new();

        for (idx, line) in log.split('\n').enumerate() {
            let mut rest = line;
            while let Some(start) = rest.find(&self.start) {
                let body = start + self.start.len();
                let end = match self.policy {
                    MatchPolicy::Greedy => rest[body..].rfind(&self.end),
                    MatchPolicy::Shortest => rest[body..].find(&self.end),
                };
                let Some(end) = end else {
                    break;
                };
                let stop = body + end + self.end.len();
                markers.push(Marker {
                    line: idx + 1,
                    text: &rest[start..stop],
                });
                rest = &rest[stop..];
            }
        }

        markers
    }

    /// Scans `log` and prepends every parsed sample to `registry`.
    ///
    /// Malformed markers are skipped and reported in the summary.
    pub fn extract_into(&self, log: &str, registry: &mut MetricRegistry) -> ExtractSummary {
        let mut summary = ExtractSummary::default();

        for marker in self.scan(log) {
            summary.matched += 1;
            match marker.parse() {
                Ok(sample) => {
                    if !registry.contains(sample.name) {
                        tracing::debug!(metric = sample.name, "metric not in registry seed");
                    }
                    tracing::trace!(metric = sample.name, value = sample.value, "sample");
                    registry.record(sample.name, sample.value);
                    summary.recorded += 1;
                }
                Err(malformed) => {
                    tracing::warn!("skipping {malformed}");
                    summary.malformed.push(malformed);
                }
            }
        }

        summary
    }
}

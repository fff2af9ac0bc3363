//! Per-configuration metric accumulation.
//!
//! A [`MetricRegistry`] maps metric names to their [`SampleCollection`]. The
//! registry is seeded from an external document through a [`RegistryLoader`]
//! and rebuilt for every configuration of a sweep, so samples never carry
//! over from one configuration to the next.
//!
//! The registry is open: names that were not part of the seed are added the
//! first time a sample for them is recorded.

use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};

/// Observed values of one metric within one configuration run.
///
/// New samples are inserted at the front, so iteration yields the most
/// recent sample first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleCollection {
    values: VecDeque<i64>,
}

impl SampleCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepends a sample.
    pub fn record(&mut self, value: i64) {
        self.values.push_front(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Samples in collection order (most recent first).
    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.values.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<i64> {
        self.values.iter().copied().collect()
    }
}

impl From<Vec<i64>> for SampleCollection {
    /// Seeds a collection, keeping the given order.
    fn from(values: Vec<i64>) -> Self {
        Self {
            values: values.into(),
        }
    }
}

/// Metric name to sample collection, iterated in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MetricRegistry {
    metrics: Vec<(String, SampleCollection)>,
    index: HashMap<String, usize>,
}

impl MetricRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry from `(name, seed samples)` pairs.
    ///
    /// A name seen twice keeps the position of its first occurrence and the
    /// samples of its last.
    pub fn from_seed<I, S>(seed: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<i64>)>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for (name, values) in seed {
            *registry.entry(name.into()) = SampleCollection::from(values);
        }
        registry
    }

    fn entry(&mut self, name: String) -> &mut SampleCollection {
        let idx = match self.index.get(&name) {
            Some(&idx) => idx,
            None => {
                let idx = self.metrics.len();
                self.index.insert(name.clone(), idx);
                self.metrics.push((name, SampleCollection::new()));
                idx
            }
        };
        &mut self.metrics[idx].1
    }

    /// Prepends `value` to the collection of `name`, creating it if needed.
    pub fn record(&mut self, name: &str, value: i64) {
        match self.index.get(name) {
            Some(&idx) => self.metrics[idx].1.record(value),
            None => self.entry(name.to_string()).record(value),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SampleCollection> {
        self.index.get(name).map(|&idx| &self.metrics[idx].1)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SampleCollection)> {
        self.metrics.iter().map(|(name, samples)| (name.as_str(), samples))
    }

    /// Number of tracked metrics.
    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Total number of samples over all metrics.
    pub fn total_samples(&self) -> usize {
        self.metrics.iter().map(|(_, samples)| samples.len()).sum()
    }
}

/// Source of a fresh, seeded [`MetricRegistry`].
///
/// Called once per configuration; every call must return an independent
/// registry.
pub trait RegistryLoader: Send + Sync {
    fn load(&self) -> Result<MetricRegistry>;
}

/// Loads the seed from a flat JSON object mapping metric names to arrays of
/// integers, e.g. `{"restore_time_us": [], "load_snapshot_us": []}`.
///
/// The file is re-read on every call.
#[derive(Debug, Clone)]
pub struct JsonRegistryLoader {
    path: PathBuf,
}

impl JsonRegistryLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, reason: impl Into<String>) -> Error {
        Error::RegistryLoad {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn parse(&self, contents: &str) -> Result<MetricRegistry> {
        let document: Map<String, Value> =
            serde_json::from_str(contents).map_err(|e| self.error(e.to_string()))?;

        let mut seed = Vec::with_capacity(document.len());
        for (name, value) in document {
            let Value::Array(items) = value else {
                return Err(self.error(format!("metric '{name}' is not an array")));
            };
            let values = items
                .iter()
                .map(|item| {
                    item.as_i64().ok_or_else(|| {
                        self.error(format!("metric '{name}' has non-integer sample {item}"))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            seed.push((name, values));
        }

        Ok(MetricRegistry::from_seed(seed))
    }
}

impl RegistryLoader for JsonRegistryLoader {
    fn load(&self) -> Result<MetricRegistry> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| self.error(e.to_string()))?;
        let registry = self.parse(&contents)?;
        tracing::debug!(
            path = %self.path.display(),
            metrics = registry.len(),
            "loaded metric registry"
        );
        Ok(registry)
    }
}

/// Hands out clones of an in-memory seed.
#[derive(Debug, Clone, Default)]
pub struct StaticRegistryLoader {
    seed: MetricRegistry,
}

impl StaticRegistryLoader {
    pub fn new(seed: MetricRegistry) -> Self {
        Self { seed }
    }

    /// Seed with the given names and empty collections.
    pub fn with_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(MetricRegistry::from_seed(
            names.into_iter().map(|name| (name, Vec::new())),
        ))
    }
}

impl RegistryLoader for StaticRegistryLoader {
    fn load(&self) -> Result<MetricRegistry> {
        Ok(self.seed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    mod sample_collection {
        use super::*;

        #[test]
        fn record_prepends() {
            let mut samples = SampleCollection::new();
            samples.record(1);
            samples.record(2);
            samples.record(3);
            assert_eq!(samples.to_vec(), vec![3, 2, 1]);
        }

        #[test]
        fn seed_keeps_order() {
            let mut samples = SampleCollection::from(vec![7, 8]);
            samples.record(9);
            assert_eq!(samples.to_vec(), vec![9, 7, 8]);
        }

        #[test]
        fn empty() {
            let samples = SampleCollection::new();
            assert!(samples.is_empty());
            assert_eq!(samples.len(), 0);
        }
    }

    mod metric_registry {
        use super::*;

        #[test]
        fn record_creates_unknown_metric() {
            let mut registry = MetricRegistry::from_seed([("known", vec![])]);
            registry.record("unknown", 42);
            assert!(registry.contains("unknown"));
            assert_eq!(registry.get("unknown").unwrap().to_vec(), vec![42]);
            assert!(registry.get("known").unwrap().is_empty());
        }

        #[test]
        fn iteration_follows_insertion_order() {
            let mut registry = MetricRegistry::from_seed([("b", vec![]), ("a", vec![])]);
            registry.record("c", 1);
            registry.record("a", 2);
            let names: Vec<_> = registry.names().collect();
            assert_eq!(names, vec!["b", "a", "c"]);
        }

        #[test]
        fn duplicate_seed_name_keeps_first_position() {
            let registry =
                MetricRegistry::from_seed([("x", vec![1]), ("y", vec![]), ("x", vec![2])]);
            let names: Vec<_> = registry.names().collect();
            assert_eq!(names, vec!["x", "y"]);
            assert_eq!(registry.get("x").unwrap().to_vec(), vec![2]);
        }

        #[test]
        fn total_samples() {
            let mut registry = MetricRegistry::from_seed([("a", vec![1, 2])]);
            registry.record("b", 3);
            assert_eq!(registry.len(), 2);
            assert_eq!(registry.total_samples(), 3);
        }
    }

    mod json_loader {
        use super::*;

        fn write_seed(contents: &str) -> tempfile::NamedTempFile {
            let mut file = tempfile::NamedTempFile::new().unwrap();
            file.write_all(contents.as_bytes()).unwrap();
            file
        }

        #[test]
        fn loads_names_in_document_order() {
            let file = write_seed(r#"{"restore_us": [], "load_us": [], "api_us": [5]}"#);
            let registry = JsonRegistryLoader::new(file.path()).load().unwrap();
            let names: Vec<_> = registry.names().collect();
            assert_eq!(names, vec!["restore_us", "load_us", "api_us"]);
            assert_eq!(registry.get("api_us").unwrap().to_vec(), vec![5]);
        }

        #[test]
        fn each_load_is_fresh() {
            let file = write_seed(r#"{"restore_us": []}"#);
            let loader = JsonRegistryLoader::new(file.path());
            let mut first = loader.load().unwrap();
            first.record("restore_us", 10);
            let second = loader.load().unwrap();
            assert!(second.get("restore_us").unwrap().is_empty());
        }

        #[test]
        fn missing_file() {
            let err = JsonRegistryLoader::new("/nonexistent/fields.json")
                .load()
                .unwrap_err();
            assert!(matches!(err, Error::RegistryLoad { .. }));
            assert!(err.is_fatal());
        }

        #[test]
        fn malformed_json() {
            let file = write_seed("{not json");
            let err = JsonRegistryLoader::new(file.path()).load().unwrap_err();
            assert!(matches!(err, Error::RegistryLoad { .. }));
            assert!(err.is_fatal());
        }

        #[test]
        fn non_array_value() {
            let file = write_seed(r#"{"restore_us": 3}"#);
            let err = JsonRegistryLoader::new(file.path()).load().unwrap_err();
            assert!(err.to_string().contains("is not an array"));
        }

        #[test]
        fn non_integer_sample() {
            let file = write_seed(r#"{"restore_us": [1, "two"]}"#);
            let err = JsonRegistryLoader::new(file.path()).load().unwrap_err();
            assert!(err.to_string().contains("non-integer sample"));
        }

        #[test]
        fn top_level_array_is_rejected() {
            let file = write_seed("[]");
            let err = JsonRegistryLoader::new(file.path()).load().unwrap_err();
            assert!(matches!(err, Error::RegistryLoad { .. }));
        }
    }

    mod static_loader {
        use super::*;

        #[test]
        fn with_names_seeds_empty_collections() {
            let loader = StaticRegistryLoader::with_names(["a", "b"]);
            let registry = loader.load().unwrap();
            assert_eq!(registry.len(), 2);
            assert_eq!(registry.total_samples(), 0);
        }

        #[test]
        fn loads_are_independent() {
            let loader = StaticRegistryLoader::with_names(["a"]);
            let mut first = loader.load().unwrap();
            first.record("a", 1);
            assert!(loader.load().unwrap().get("a").unwrap().is_empty());
        }
    }
}

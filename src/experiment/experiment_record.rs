//! Experiment Record - root entity describing one sweep

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Experiment Record describes a sweep as a whole.
///
/// It carries what is needed to reproduce the design (seed, run count,
/// column order) next to the runs it produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExperimentRecord {
    name: String,
    created_at: DateTime<Utc>,
    seed: u64,
    run_count: usize,
    parameters: Vec<String>,
    metrics: Vec<String>,
    config: Option<serde_json::Value>,
}

impl ExperimentRecord {
    /// Create a builder; `name`, `seed` and `run_count` are required.
    #[must_use]
    pub fn builder(name: impl Into<String>, seed: u64, run_count: usize) -> ExperimentRecordBuilder {
        ExperimentRecordBuilder::new(name, seed, run_count)
    }

    /// Get the experiment name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the sampling seed.
    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Get the number of runs.
    #[must_use]
    pub const fn run_count(&self) -> usize {
        self.run_count
    }

    /// Get the parameter column order.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Get the metric column order.
    #[must_use]
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Get the free-form configuration snapshot, if any.
    #[must_use]
    pub const fn config(&self) -> Option<&serde_json::Value> {
        self.config.as_ref()
    }
}

/// Builder for `ExperimentRecord`.
#[derive(Debug)]
pub struct ExperimentRecordBuilder {
    name: String,
    created_at: DateTime<Utc>,
    seed: u64,
    run_count: usize,
    parameters: Vec<String>,
    metrics: Vec<String>,
    config: Option<serde_json::Value>,
}

impl ExperimentRecordBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, seed: u64, run_count: usize) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            seed,
            run_count,
            parameters: Vec::new(),
            metrics: Vec::new(),
            config: None,
        }
    }

    /// Set the parameter column order.
    #[must_use]
    pub fn parameters(mut self, parameters: Vec<String>) -> Self {
        self.parameters = parameters;
        self
    }

    /// Set the metric column order.
    #[must_use]
    pub fn metrics(mut self, metrics: Vec<String>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Attach a configuration snapshot.
    #[must_use]
    pub fn config(mut self, config: serde_json::Value) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a custom creation timestamp (useful for deserialization/testing).
    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Build the `ExperimentRecord`.
    #[must_use]
    pub fn build(self) -> ExperimentRecord {
        ExperimentRecord {
            name: self.name,
            created_at: self.created_at,
            seed: self.seed,
            run_count: self.run_count,
            parameters: self.parameters,
            metrics: self.metrics,
            config: self.config,
        }
    }
}

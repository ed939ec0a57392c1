//! Run Record - one sample-to-metric pipeline instance

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Metric;

/// Status of a run.
///
/// ```text
/// Pending ──> Generated ──> Executed ──> Collected
///                 │  ^
///                 v  │ (explicit retry)
///               Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunStatus {
    /// Sampled and bound, nothing written yet.
    Pending,
    /// Run directory, artifact and manifest written.
    Generated,
    /// Solver and post-processor both exited successfully.
    Executed,
    /// Solver or post-processor failed; see [`RunRecord::failure`].
    Failed,
    /// Metrics extracted (each metric may still be missing).
    Collected,
}

/// Which external call a failure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// The simulation solver.
    Solver,
    /// The post-processor producing the metric extract.
    Postprocessor,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Solver => f.write_str("solver"),
            Self::Postprocessor => f.write_str("post-processor"),
        }
    }
}

/// Why a run ended up [`RunStatus::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunFailure {
    /// The process could not be started at all.
    LaunchFailed {
        /// Failing stage
        stage: Stage,
        /// OS error message
        message: String,
    },
    /// The process ran and exited unsuccessfully.
    NonZeroExit {
        /// Failing stage
        stage: Stage,
        /// Exit code; `None` when killed by a signal
        code: Option<i32>,
    },
}

impl RunFailure {
    /// Stage the failure came from.
    #[must_use]
    pub const fn stage(&self) -> Stage {
        match self {
            Self::LaunchFailed { stage, .. } | Self::NonZeroExit { stage, .. } => *stage,
        }
    }
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LaunchFailed { stage, message } => write!(f, "{stage} failed to launch: {message}"),
            Self::NonZeroExit {
                stage,
                code: Some(code),
            } => write!(f, "{stage} exited with status {code}"),
            Self::NonZeroExit { stage, code: None } => write!(f, "{stage} terminated by signal"),
        }
    }
}

/// Run Record tracks one design row through generation, execution and
/// collection.
///
/// Owned by exactly one orchestration pass at a time; runs never share
/// mutable state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunRecord {
    id: u32,
    directory: PathBuf,
    parameters: IndexMap<String, f64>,
    status: RunStatus,
    artifact: Option<PathBuf>,
    failure: Option<RunFailure>,
    metrics: IndexMap<String, Metric>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Create a new run record in Pending status.
    ///
    /// # Arguments
    ///
    /// * `id` - 1-based run id
    /// * `directory` - Run directory owned exclusively by this run
    /// * `parameters` - Bound parameter manifest (name to value)
    #[must_use]
    pub fn new(id: u32, directory: impl Into<PathBuf>, parameters: IndexMap<String, f64>) -> Self {
        Self {
            id,
            directory: directory.into(),
            parameters,
            status: RunStatus::Pending,
            artifact: None,
            failure: None,
            metrics: IndexMap::new(),
            started_at: None,
            ended_at: None,
        }
    }

    /// Get the run id.
    #[must_use]
    pub const fn id(&self) -> u32 {
        self.id
    }

    /// Get the run directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Get the bound parameter values, in design order.
    #[must_use]
    pub const fn parameters(&self) -> &IndexMap<String, f64> {
        &self.parameters
    }

    /// Get the current status.
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Get the artifact path, once generated.
    #[must_use]
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    /// Get the failure cause, if the run failed.
    #[must_use]
    pub const fn failure(&self) -> Option<&RunFailure> {
        self.failure.as_ref()
    }

    /// Get all collected metrics.
    #[must_use]
    pub const fn metrics(&self) -> &IndexMap<String, Metric> {
        &self.metrics
    }

    /// Get one metric by name.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(name)
    }

    /// Get the time the solver was launched.
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Get the time execution finished (successfully or not).
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Record the written artifact, transitioning to Generated.
    pub fn mark_generated(&mut self, artifact: impl Into<PathBuf>) {
        self.artifact = Some(artifact.into());
        self.status = RunStatus::Generated;
    }

    /// Stamp the start of execution.
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    /// Both external calls succeeded.
    pub fn mark_executed(&mut self) {
        self.status = RunStatus::Executed;
        self.ended_at = Some(Utc::now());
    }

    /// An external call failed.
    pub fn mark_failed(&mut self, failure: RunFailure) {
        self.status = RunStatus::Failed;
        self.failure = Some(failure);
        self.ended_at = Some(Utc::now());
    }

    /// Attach collected metrics.
    ///
    /// An Executed run becomes Collected; a Failed run keeps its status.
    pub fn record_metrics(&mut self, metrics: IndexMap<String, Metric>) {
        self.metrics = metrics;
        if self.status == RunStatus::Executed {
            self.status = RunStatus::Collected;
        }
    }

    /// Put a Failed run back to Generated for an explicit re-attempt.
    ///
    /// Returns `false` (and changes nothing) for any other status.
    pub fn reset_for_retry(&mut self) -> bool {
        if self.status != RunStatus::Failed || self.artifact.is_none() {
            return false;
        }
        self.status = RunStatus::Generated;
        self.failure = None;
        self.metrics.clear();
        self.started_at = None;
        self.ended_at = None;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::MissingReason;

    fn run() -> RunRecord {
        let mut params = IndexMap::new();
        params.insert("A".to_string(), 1.5);
        RunRecord::new(1, "/tmp/run_1", params)
    }

    #[test]
    fn test_run_status_default() {
        assert_eq!(run().status(), RunStatus::Pending);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut run = run();
        run.mark_generated("/tmp/run_1/input.k");
        assert_eq!(run.status(), RunStatus::Generated);
        run.start();
        run.mark_executed();
        assert_eq!(run.status(), RunStatus::Executed);

        let mut metrics = IndexMap::new();
        metrics.insert("HIC_15".to_string(), Metric::Value(310.0));
        run.record_metrics(metrics);
        assert_eq!(run.status(), RunStatus::Collected);
        assert!(run.ended_at().unwrap() >= run.started_at().unwrap());
    }

    #[test]
    fn test_failed_run_stays_failed_after_collection() {
        let mut run = run();
        run.mark_generated("/tmp/run_1/input.k");
        run.mark_failed(RunFailure::NonZeroExit {
            stage: Stage::Solver,
            code: Some(3),
        });

        let mut metrics = IndexMap::new();
        metrics.insert("HIC_15".to_string(), Metric::Missing(MissingReason::RunFailed));
        run.record_metrics(metrics);

        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(run.failure().unwrap().stage(), Stage::Solver);
    }

    #[test]
    fn test_reset_for_retry_only_from_failed() {
        let mut run = run();
        assert!(!run.reset_for_retry());

        run.mark_generated("/tmp/run_1/input.k");
        run.mark_failed(RunFailure::LaunchFailed {
            stage: Stage::Solver,
            message: "not found".to_string(),
        });
        assert!(run.reset_for_retry());
        assert_eq!(run.status(), RunStatus::Generated);
        assert!(run.failure().is_none());
    }

    #[test]
    fn test_failure_display() {
        let failure = RunFailure::NonZeroExit {
            stage: Stage::Postprocessor,
            code: Some(2),
        };
        assert_eq!(failure.to_string(), "post-processor exited with status 2");
    }
}

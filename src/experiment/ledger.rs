//! Sweep Ledger - persisted state of one sweep
//!
//! The ledger is the only batch-level mutable state. It is written after
//! staging, as each run finishes executing, and after collection, so an
//! aborted sweep can be resumed without re-sampling, re-binding or
//! re-executing runs that already got that far.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{ExperimentRecord, RunRecord, RunStatus};
use crate::Result;

/// Ledger file name inside the sweep output directory.
pub const LEDGER_FILE: &str = "sweep.json";

/// Experiment record plus every run, ordered by id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepLedger {
    experiment: ExperimentRecord,
    runs: Vec<RunRecord>,
}

impl SweepLedger {
    /// Create a ledger; runs are sorted by id.
    #[must_use]
    pub fn new(experiment: ExperimentRecord, mut runs: Vec<RunRecord>) -> Self {
        runs.sort_by_key(RunRecord::id);
        Self { experiment, runs }
    }

    /// Get the experiment record.
    #[must_use]
    pub const fn experiment(&self) -> &ExperimentRecord {
        &self.experiment
    }

    /// Get all runs, ordered by id.
    #[must_use]
    pub fn runs(&self) -> &[RunRecord] {
        &self.runs
    }

    /// Get one run by id.
    #[must_use]
    pub fn run(&self, id: u32) -> Option<&RunRecord> {
        self.runs
            .binary_search_by_key(&id, RunRecord::id)
            .ok()
            .map(|index| &self.runs[index])
    }

    /// Get the number of runs.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Take ownership of the runs, consuming the ledger.
    #[must_use]
    pub fn into_parts(self) -> (ExperimentRecord, Vec<RunRecord>) {
        (self.experiment, self.runs)
    }

    /// Replace the runs with an updated set (re-sorted by id).
    pub fn set_runs(&mut self, mut runs: Vec<RunRecord>) {
        runs.sort_by_key(RunRecord::id);
        self.runs = runs;
    }

    /// Replace the run with the same id.
    ///
    /// Returns `false`, leaving the ledger unchanged, if no run has that id.
    pub fn update_run(&mut self, run: RunRecord) -> bool {
        match self.runs.binary_search_by_key(&run.id(), RunRecord::id) {
            Ok(index) => {
                self.runs[index] = run;
                true
            }
            Err(_) => false,
        }
    }

    /// Count runs per status.
    #[must_use]
    pub fn status_counts(&self) -> HashMap<RunStatus, usize> {
        let mut counts = HashMap::new();
        for run in &self.runs {
            *counts.entry(run.status()).or_insert(0) += 1;
        }
        counts
    }

    /// Write the ledger as JSON.
    ///
    /// The file is written next to its destination and renamed into place,
    /// so an interrupted write never leaves a truncated ledger behind.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let staging = path.with_extension("json.tmp");
        std::fs::write(&staging, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&staging, path)?;
        Ok(())
    }

    /// Read a ledger written by [`save`](Self::save).
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let ledger: Self = serde_json::from_slice(&bytes)?;
        Ok(Self::new(ledger.experiment, ledger.runs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn ledger() -> SweepLedger {
        let experiment = ExperimentRecord::builder("doe", 1, 3).build();
        let runs = (1..=3)
            .rev()
            .map(|id| RunRecord::new(id, format!("/tmp/run_{id}"), IndexMap::new()))
            .collect();
        SweepLedger::new(experiment, runs)
    }

    #[test]
    fn test_runs_sorted_by_id() {
        let ledger = ledger();
        let ids: Vec<u32> = ledger.runs().iter().map(RunRecord::id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(ledger.run(2).unwrap().id(), 2);
        assert!(ledger.run(4).is_none());
    }

    #[test]
    fn test_update_run_replaces_by_id() {
        let mut ledger = ledger();
        let mut run = ledger.run(2).unwrap().clone();
        run.mark_generated("/tmp/run_2/input.k");
        assert!(ledger.update_run(run));
        assert_eq!(ledger.run(2).unwrap().status(), RunStatus::Generated);
        assert_eq!(ledger.run(1).unwrap().status(), RunStatus::Pending);

        let stranger = RunRecord::new(9, "/tmp/run_9", IndexMap::new());
        assert!(!ledger.update_run(stranger));
        assert_eq!(ledger.run_count(), 3);
    }

    #[test]
    fn test_status_counts() {
        let counts = ledger().status_counts();
        assert_eq!(counts.get(&RunStatus::Pending), Some(&3));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE);
        let ledger = ledger();
        ledger.save(&path).unwrap();
        assert_eq!(SweepLedger::load(&path).unwrap(), ledger);
    }
}

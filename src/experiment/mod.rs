//! Experiment tracking for sweeps
//!
//! ## Schema Overview
//!
//! ```text
//! SweepLedger
//!   ├── ExperimentRecord (1)  name, seed, column order
//!   └──< RunRecord (N)        id, directory, manifest, status
//!             └──< Metric (M) value or missing marker
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use indexmap::IndexMap;
//! use trueno_doe::experiment::{Metric, RunRecord, RunStatus};
//!
//! let mut parameters = IndexMap::new();
//! parameters.insert("thickness".to_string(), 1.8);
//!
//! let mut run = RunRecord::new(1, "sweep/run_1", parameters);
//! run.mark_generated("sweep/run_1/input.k");
//! run.start();
//! run.mark_executed();
//!
//! let mut metrics = IndexMap::new();
//! metrics.insert("HIC_15".to_string(), Metric::Value(412.0));
//! run.record_metrics(metrics);
//! assert_eq!(run.status(), RunStatus::Collected);
//! ```

mod experiment_record;
mod ledger;
mod metric;
mod run_record;

pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use ledger::{SweepLedger, LEDGER_FILE};
pub use metric::{Metric, MissingReason, MISSING_MARKER};
pub use run_record::{RunFailure, RunRecord, RunStatus, Stage};

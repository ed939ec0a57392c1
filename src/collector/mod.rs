//! Metric extraction from post-processor output
//!
//! The post-processor leaves a small CSV extract in the run directory. The
//! collector skips a fixed number of leading records (preamble plus column
//! header), then reads one field of the first data record.
//!
//! Collection never fails a batch: an absent or malformed extract turns into
//! [`Metric::Missing`] on that run only.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::experiment::{Metric, MissingReason, RunRecord, RunStatus};

/// Per-run metrics file written after collection.
pub const METRICS_FILE: &str = "metrics.yaml";

const DEFAULT_METRIC: &str = "HIC_15";
const DEFAULT_HEADER_ROWS: usize = 6;
const DEFAULT_COLUMN: usize = 1;

/// Where to find one metric in a run's post-processor output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Column name in the dataset
    pub name: String,
    /// Extract file, relative to the run directory
    pub file: PathBuf,
    /// Records to skip before the first data record
    #[serde(default = "default_header_rows")]
    pub header_rows: usize,
    /// Zero-based field index within the data record
    #[serde(default = "default_column")]
    pub column: usize,
}

const fn default_header_rows() -> usize {
    DEFAULT_HEADER_ROWS
}

const fn default_column() -> usize {
    DEFAULT_COLUMN
}

impl Default for MetricSpec {
    /// HIC-15 head injury criterion as written by the post-processor
    /// session: five preamble lines and a column header, value in the
    /// second column.
    fn default() -> Self {
        Self {
            name: DEFAULT_METRIC.to_string(),
            file: PathBuf::from(format!("{DEFAULT_METRIC}.csv")),
            header_rows: DEFAULT_HEADER_ROWS,
            column: DEFAULT_COLUMN,
        }
    }
}

/// Extracts configured metrics from run directories.
#[derive(Debug, Clone)]
pub struct ResultCollector {
    metrics: Vec<MetricSpec>,
}

impl ResultCollector {
    /// Create a collector for the given metrics.
    #[must_use]
    pub const fn new(metrics: Vec<MetricSpec>) -> Self {
        Self { metrics }
    }

    /// Metric names, in column order.
    #[must_use]
    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name.clone()).collect()
    }

    /// Collect metrics for one run.
    ///
    /// Executed runs become Collected; Failed runs keep their status and
    /// get [`MissingReason::RunFailed`] for every metric. Runs in any other
    /// status are returned unchanged.
    #[must_use]
    pub fn collect(&self, mut run: RunRecord) -> RunRecord {
        let metrics: IndexMap<String, Metric> = match run.status() {
            RunStatus::Executed => self
                .metrics
                .iter()
                .map(|spec| (spec.name.clone(), read_metric(run.directory(), spec)))
                .collect(),
            RunStatus::Failed => self
                .metrics
                .iter()
                .map(|spec| (spec.name.clone(), Metric::Missing(MissingReason::RunFailed)))
                .collect(),
            _ => return run,
        };

        for (name, metric) in &metrics {
            if let Metric::Missing(reason) = metric {
                if *reason != MissingReason::RunFailed {
                    warn!(run = run.id(), metric = %name, %reason, "metric missing");
                }
            }
        }

        write_metrics_file(run.directory(), &metrics);
        run.record_metrics(metrics);
        run
    }

    /// Collect metrics for every run.
    #[must_use]
    pub fn collect_all(&self, runs: Vec<RunRecord>) -> Vec<RunRecord> {
        runs.into_iter().map(|run| self.collect(run)).collect()
    }
}

/// Read one metric; every failure maps to a missing reason.
fn read_metric(directory: &Path, spec: &MetricSpec) -> Metric {
    let path = directory.join(&spec.file);
    let mut reader = match csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(&path)
    {
        Ok(reader) => reader,
        Err(e) => {
            let absent = matches!(e.kind(), csv::ErrorKind::Io(io) if io.kind() == ErrorKind::NotFound);
            debug!(path = %path.display(), error = %e, "cannot open extract");
            return Metric::Missing(if absent {
                MissingReason::ExtractAbsent
            } else {
                MissingReason::ExtractMalformed
            });
        }
    };

    let value = reader
        .records()
        .nth(spec.header_rows)
        .and_then(std::result::Result::ok)
        .and_then(|record| record.get(spec.column).map(str::to_string))
        .and_then(|field| field.parse::<f64>().ok())
        .filter(|v| v.is_finite());

    value.map_or(Metric::Missing(MissingReason::ExtractMalformed), Metric::Value)
}

/// Best effort: the ledger and dataset are authoritative.
fn write_metrics_file(directory: &Path, metrics: &IndexMap<String, Metric>) {
    let values: IndexMap<&str, Option<f64>> = metrics
        .iter()
        .map(|(name, metric)| (name.as_str(), metric.value()))
        .collect();
    let result = serde_yaml::to_string(&values)
        .map_err(|e| e.to_string())
        .and_then(|yaml| {
            std::fs::write(directory.join(METRICS_FILE), yaml).map_err(|e| e.to_string())
        });
    if let Err(error) = result {
        warn!(dir = %directory.display(), %error, "could not write metrics file");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXTRACT: &str = "\
META post-processor
Session hic.ses
Curve: head acceleration
Units: mm ms
Filter: CFC1000
Criterion,Value,t1,t2
HIC_15,412.75,20.1,35.1
";

    fn executed_run(dir: &Path) -> RunRecord {
        let mut run = RunRecord::new(1, dir, IndexMap::new());
        run.mark_generated(dir.join("input.k"));
        run.start();
        run.mark_executed();
        run
    }

    #[test]
    fn test_collect_reads_first_data_row() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("HIC_15.csv"), EXTRACT).unwrap();

        let run = ResultCollector::new(vec![MetricSpec::default()]).collect(executed_run(dir.path()));
        assert_eq!(run.status(), RunStatus::Collected);
        assert_eq!(run.metric("HIC_15"), Some(&Metric::Value(412.75)));

        let written = std::fs::read_to_string(dir.path().join(METRICS_FILE)).unwrap();
        assert!(written.contains("HIC_15: 412.75"));
    }

    #[test]
    fn test_absent_extract_is_missing_but_collected() {
        let dir = tempfile::tempdir().unwrap();
        let run = ResultCollector::new(vec![MetricSpec::default()]).collect(executed_run(dir.path()));
        assert_eq!(run.status(), RunStatus::Collected);
        assert_eq!(
            run.metric("HIC_15"),
            Some(&Metric::Missing(MissingReason::ExtractAbsent))
        );
    }

    #[test]
    fn test_malformed_extract_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("HIC_15.csv"), "only\ntwo lines\n").unwrap();
        let run = ResultCollector::new(vec![MetricSpec::default()]).collect(executed_run(dir.path()));
        assert_eq!(
            run.metric("HIC_15"),
            Some(&Metric::Missing(MissingReason::ExtractMalformed))
        );

        std::fs::write(
            dir.path().join("HIC_15.csv"),
            EXTRACT.replace("412.75", "n/a"),
        )
        .unwrap();
        let run = ResultCollector::new(vec![MetricSpec::default()]).collect(executed_run(dir.path()));
        assert!(run.metric("HIC_15").unwrap().is_missing());
    }

    #[test]
    fn test_failed_run_gets_run_failed_marker() {
        use crate::experiment::{RunFailure, Stage};

        let dir = tempfile::tempdir().unwrap();
        let mut run = RunRecord::new(2, dir.path(), IndexMap::new());
        run.mark_generated(dir.path().join("input.k"));
        run.mark_failed(RunFailure::NonZeroExit {
            stage: Stage::Solver,
            code: Some(1),
        });

        let run = ResultCollector::new(vec![MetricSpec::default()]).collect(run);
        assert_eq!(run.status(), RunStatus::Failed);
        assert_eq!(
            run.metric("HIC_15"),
            Some(&Metric::Missing(MissingReason::RunFailed))
        );
    }

    #[test]
    fn test_multiple_metrics_in_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("peak.csv"), "peak\n9.5\n").unwrap();
        std::fs::write(dir.path().join("HIC_15.csv"), EXTRACT).unwrap();

        let collector = ResultCollector::new(vec![
            MetricSpec {
                name: "peak".into(),
                file: "peak.csv".into(),
                header_rows: 1,
                column: 0,
            },
            MetricSpec::default(),
        ]);
        let run = collector.collect(executed_run(dir.path()));
        let names: Vec<&String> = run.metrics().keys().collect();
        assert_eq!(names, vec!["peak", "HIC_15"]);
        assert_eq!(run.metric("peak").and_then(Metric::value), Some(9.5));
    }
}

//! Dataset assembly (Arrow/Parquet/CSV)
//!
//! One row per run, keyed by run id ascending: the run's bound parameter
//! values followed by its metric cells. The row count always equals the run
//! count; a failed run changes its metric cells, never the number of rows.
//!
//! Outputs:
//! - CSV with [`MISSING_MARKER`](crate::experiment::MISSING_MARKER) in missing cells
//! - Arrow [`RecordBatch`] with nullable metric columns (null = missing)
//! - Parquet written from that batch

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use tracing::info;

use crate::experiment::{Metric, MissingReason, RunRecord, RunStatus};
use crate::{Error, Result};

/// CSV dataset file inside the sweep output directory.
pub const DATASET_CSV: &str = "inputs_outputs.csv";

/// Parquet dataset file inside the sweep output directory.
pub const DATASET_PARQUET: &str = "inputs_outputs.parquet";

/// Run id column name.
pub const RUN_ID_COLUMN: &str = "run_id";

/// One assembled row.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    /// Run id
    pub run_id: u32,
    /// Parameter values, in dataset parameter order
    pub inputs: Vec<f64>,
    /// Metric cells, in dataset metric order
    pub outputs: Vec<Metric>,
}

/// Joined parameter/metric table for a whole sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    parameters: Vec<String>,
    metrics: Vec<String>,
    rows: Vec<DatasetRow>,
}

impl Dataset {
    /// Get the parameter column names.
    #[must_use]
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Get the metric column names.
    #[must_use]
    pub fn metrics(&self) -> &[String] {
        &self.metrics
    }

    /// Get all rows, ordered by run id.
    #[must_use]
    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    /// Get the row for one run.
    #[must_use]
    pub fn row(&self, run_id: u32) -> Option<&DatasetRow> {
        self.rows
            .binary_search_by_key(&run_id, |row| row.run_id)
            .ok()
            .map(|index| &self.rows[index])
    }

    /// Get the run ids, ascending.
    #[must_use]
    pub fn run_ids(&self) -> Vec<u32> {
        self.rows.iter().map(|row| row.run_id).collect()
    }

    /// Get the number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All column names: run id, parameters, metrics.
    #[must_use]
    pub fn column_names(&self) -> Vec<&str> {
        std::iter::once(RUN_ID_COLUMN)
            .chain(self.parameters.iter().map(String::as_str))
            .chain(self.metrics.iter().map(String::as_str))
            .collect()
    }

    /// Write the dataset as CSV.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be created or written.
    pub fn write_csv(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;
        writer.write_record(self.column_names())?;
        for row in &self.rows {
            let record = std::iter::once(row.run_id.to_string())
                .chain(row.inputs.iter().map(f64::to_string))
                .chain(row.outputs.iter().map(Metric::to_string));
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Convert to a single Arrow record batch.
    ///
    /// # Errors
    ///
    /// Returns error if the batch cannot be built.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut fields = Vec::with_capacity(1 + self.parameters.len() + self.metrics.len());
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(fields.capacity());

        fields.push(Field::new(RUN_ID_COLUMN, DataType::UInt32, false));
        columns.push(Arc::new(UInt32Array::from(self.run_ids())));

        for (index, name) in self.parameters.iter().enumerate() {
            fields.push(Field::new(name, DataType::Float64, false));
            let values: Vec<f64> = self.rows.iter().map(|row| row.inputs[index]).collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }

        for (index, name) in self.metrics.iter().enumerate() {
            fields.push(Field::new(name, DataType::Float64, true));
            let values: Vec<Option<f64>> = self
                .rows
                .iter()
                .map(|row| row.outputs[index].value())
                .collect();
            columns.push(Arc::new(Float64Array::from(values)));
        }

        Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), columns)?)
    }

    /// Write the dataset as Parquet.
    ///
    /// # Errors
    ///
    /// Returns error if the batch cannot be built or the file written.
    pub fn write_parquet(&self, path: impl AsRef<Path>) -> Result<()> {
        let batch = self.to_record_batch()?;
        let file = File::create(path.as_ref())?;
        let props = WriterProperties::builder().build();
        let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
        writer.write(&batch)?;
        writer.close()?;
        Ok(())
    }

    /// Read back a Parquet dataset as record batches.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be opened or decoded.
    pub fn read_parquet(path: impl AsRef<Path>) -> Result<Vec<RecordBatch>> {
        use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;

        let file = File::open(path.as_ref())?;
        let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        let mut batches = Vec::new();
        for batch in reader {
            batches.push(batch?);
        }
        Ok(batches)
    }
}

/// Joins run manifests with collected metrics.
#[derive(Debug, Clone)]
pub struct DatasetAssembler {
    parameters: Vec<String>,
    metrics: Vec<String>,
}

impl DatasetAssembler {
    /// Create an assembler with fixed column order.
    #[must_use]
    pub const fn new(parameters: Vec<String>, metrics: Vec<String>) -> Self {
        Self {
            parameters,
            metrics,
        }
    }

    /// Assemble one row per run, ascending by id.
    ///
    /// A metric the run never recorded is missing: [`MissingReason::RunFailed`]
    /// for a failed run, [`MissingReason::ExtractAbsent`] otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatasetMismatch`] if two runs share an id or a run's
    /// manifest lacks a parameter column.
    pub fn assemble(&self, runs: &[RunRecord]) -> Result<Dataset> {
        let mut ordered: Vec<&RunRecord> = runs.iter().collect();
        ordered.sort_by_key(|run| run.id());

        let mut seen = HashSet::with_capacity(ordered.len());
        let mut rows = Vec::with_capacity(ordered.len());
        for run in ordered {
            if !seen.insert(run.id()) {
                return Err(Error::DatasetMismatch {
                    run_id: run.id(),
                    reason: "run id appears more than once".to_string(),
                });
            }
            rows.push(self.row(run)?);
        }

        let missing = rows
            .iter()
            .filter(|row| row.outputs.iter().any(Metric::is_missing))
            .count();
        info!(rows = rows.len(), missing, "assembled dataset");

        Ok(Dataset {
            parameters: self.parameters.clone(),
            metrics: self.metrics.clone(),
            rows,
        })
    }

    fn row(&self, run: &RunRecord) -> Result<DatasetRow> {
        let inputs = self
            .parameters
            .iter()
            .map(|name| {
                run.parameters()
                    .get(name)
                    .copied()
                    .ok_or_else(|| Error::DatasetMismatch {
                        run_id: run.id(),
                        reason: format!("manifest has no value for parameter '{name}'"),
                    })
            })
            .collect::<Result<Vec<f64>>>()?;

        let absent = if run.status() == RunStatus::Failed {
            MissingReason::RunFailed
        } else {
            MissingReason::ExtractAbsent
        };
        let outputs = self
            .metrics
            .iter()
            .map(|name| run.metric(name).copied().unwrap_or(Metric::Missing(absent)))
            .collect();

        Ok(DatasetRow {
            run_id: run.id(),
            inputs,
            outputs,
        })
    }
}

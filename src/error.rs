//! Error types for Trueno-DOE
//!
//! Every variant here is fatal for a batch. Failures local to a single run
//! (solver crash, missing extract) are recorded on the run itself and never
//! surface as an `Error`.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trueno-DOE error types
#[derive(Error, Debug)]
pub enum Error {
    /// A required settings key is absent or null
    #[error("Missing setting: '{0}' must be present and non-null in the settings file")]
    MissingSetting(&'static str),

    /// A settings value has the wrong type or range
    #[error("Invalid setting '{key}': {reason}")]
    InvalidSetting {
        /// Settings key
        key: &'static str,
        /// What is wrong with the value
        reason: String,
    },

    /// A parameter spec is malformed
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: String,
        /// What is wrong with the parameter
        reason: String,
    },

    /// Two parameter specs share a name
    #[error("Duplicate parameter name: '{0}'")]
    DuplicateParameter(String),

    /// No parameter is marked active, so there is nothing to sample
    #[error("No active parameters: at least one parameter must participate in sampling")]
    NoActiveParameters,

    /// Run count must be a positive integer
    #[error("Invalid run count: {0} (must be >= 1)")]
    InvalidRunCount(usize),

    /// Declared parameters and template placeholders disagree
    #[error(
        "Template placeholders do not match declared parameters\n\
         Declared without placeholder: {missing_placeholders:?}\n\
         Placeholders not declared: {undeclared_placeholders:?}"
    )]
    PlaceholderMismatch {
        /// Active parameters that have no placeholder in the template
        missing_placeholders: Vec<String>,
        /// Placeholders whose name is not an active parameter
        undeclared_placeholders: Vec<String>,
    },

    /// Template document could not be parsed
    #[error("Template parse error at line {line}: {reason}")]
    TemplateParse {
        /// 1-based line number
        line: usize,
        /// Parse failure description
        reason: String,
    },

    /// Per-run rows do not describe the same design
    #[error("Dataset mismatch for run {run_id}: {reason}")]
    DatasetMismatch {
        /// Offending run id
        run_id: u32,
        /// Description of the mismatch
        reason: String,
    },

    /// Worker pool for run dispatch could not be built
    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML (settings, parameter spec, manifest) error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON (ledger) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV (dataset) error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

//! Sweep configuration
//!
//! Settings are read from YAML once, validated, and turned into a typed
//! [`SweepConfig`]. The loosely typed raw form never leaves this module, so
//! a malformed settings file fails here and not deep inside sampling or
//! binding.
//!
//! ## Settings file
//!
//! ```yaml
//! output_directory: crash_sweep
//! run_count: 50
//! parameter_spec_path: parameters.yaml
//! input_template_path: model.k
//! solver_executable_path: /opt/lsdyna/lsdyna
//! cpu_count: 4
//! postprocessor_executable_path: /opt/meta/meta_post64.sh
//! postprocessor_session_path: sessions/
//! postprocessor_session_file: hic.ses
//! seed: 42              # optional
//! max_parallel_runs: 2  # optional, default 1
//! ```
//!
//! Relative paths resolve against the settings file's directory, and that
//! directory is made absolute against the current directory at load time.
//! Every path in a [`SweepConfig`] therefore stays valid from inside a run
//! directory. A bare executable name (no directory part) is left as-is so it
//! is looked up on `PATH`.

mod parameter;

pub use parameter::{validate_specs, ParameterRole, ParameterSpec, ACTIVE_TYPES};

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::collector::MetricSpec;
use crate::{Error, Result};

/// Validated batch settings for one sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    /// Human-readable experiment name recorded in the ledger
    pub experiment_name: String,
    /// Root directory holding every run directory and the dataset
    pub output_directory: PathBuf,
    /// Number of runs (design-matrix rows)
    pub run_count: usize,
    /// Parameter-spec YAML file
    pub parameter_spec_path: PathBuf,
    /// Template simulation input
    pub input_template_path: PathBuf,
    /// Solver executable
    pub solver_executable_path: PathBuf,
    /// Core count handed to the solver
    pub cpu_count: usize,
    /// Post-processor executable
    pub postprocessor_executable_path: PathBuf,
    /// Directory holding the post-processor session file
    pub postprocessor_session_path: PathBuf,
    /// Post-processor session file name
    pub postprocessor_session_file: String,
    /// Upper bound on runs dispatched at once
    pub max_parallel_runs: usize,
    /// Sampling seed (None draws a fresh design)
    pub seed: Option<u64>,
    /// Metrics extracted from each run
    pub metrics: Vec<MetricSpec>,
}

impl SweepConfig {
    /// Load settings from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read or fails validation.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));
        Self::from_yaml(&content, base_dir)
    }

    /// Parse settings from YAML, resolving relative paths against `base_dir`.
    ///
    /// A relative `base_dir` is itself resolved against the current
    /// directory, so the returned paths are absolute.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingSetting`] if a required key is absent or null
    /// - [`Error::InvalidSetting`] if a count is not a positive integer
    /// - [`Error::Yaml`] if the document is not valid YAML
    /// - [`Error::Io`] if the current directory cannot be read
    pub fn from_yaml(yaml: &str, base_dir: &Path) -> Result<Self> {
        let raw: RawSettings = serde_yaml::from_str(yaml)?;
        let base_dir = if base_dir.is_absolute() {
            base_dir.to_path_buf()
        } else {
            std::env::current_dir()?.join(base_dir)
        };
        raw.validate(&base_dir)
    }

    /// Full path of the post-processor session file.
    #[must_use]
    pub fn postprocessor_session(&self) -> PathBuf {
        self.postprocessor_session_path
            .join(&self.postprocessor_session_file)
    }
}

/// Settings as written, before validation.
///
/// The aliases accept the key names used by the earlier sweep scripts.
#[derive(Debug, Default, Deserialize)]
struct RawSettings {
    experiment_name: Option<String>,
    #[serde(alias = "Newfolder_name")]
    output_directory: Option<PathBuf>,
    #[serde(alias = "Runs")]
    run_count: Option<serde_yaml::Value>,
    #[serde(alias = "config")]
    parameter_spec_path: Option<PathBuf>,
    #[serde(alias = "key")]
    input_template_path: Option<PathBuf>,
    #[serde(alias = "LS_Run_path")]
    solver_executable_path: Option<PathBuf>,
    #[serde(alias = "NCPU")]
    cpu_count: Option<serde_yaml::Value>,
    #[serde(alias = "meta_exec")]
    postprocessor_executable_path: Option<PathBuf>,
    #[serde(alias = "ses_path")]
    postprocessor_session_path: Option<PathBuf>,
    #[serde(alias = "ses_file")]
    postprocessor_session_file: Option<String>,
    max_parallel_runs: Option<serde_yaml::Value>,
    seed: Option<u64>,
    metrics: Option<Vec<MetricSpec>>,
}

impl RawSettings {
    fn validate(self, base_dir: &Path) -> Result<SweepConfig> {
        let output_directory = required(self.output_directory, "output_directory")?;
        let run_count = positive_integer(required(self.run_count, "run_count")?, "run_count")?;
        let parameter_spec_path = required(self.parameter_spec_path, "parameter_spec_path")?;
        let input_template_path = required(self.input_template_path, "input_template_path")?;
        let solver = required(self.solver_executable_path, "solver_executable_path")?;
        let cpu_count = positive_integer(required(self.cpu_count, "cpu_count")?, "cpu_count")?;
        let postprocessor = required(
            self.postprocessor_executable_path,
            "postprocessor_executable_path",
        )?;
        let session_path = required(self.postprocessor_session_path, "postprocessor_session_path")?;
        let session_file = required(self.postprocessor_session_file, "postprocessor_session_file")?;

        let max_parallel_runs = match self.max_parallel_runs {
            Some(value) => positive_integer(value, "max_parallel_runs")?,
            None => 1,
        };

        let metrics = self.metrics.unwrap_or_else(|| vec![MetricSpec::default()]);
        if metrics.is_empty() {
            return Err(Error::InvalidSetting {
                key: "metrics",
                reason: "at least one metric must be configured".to_string(),
            });
        }

        let output_directory = resolve(base_dir, output_directory);
        let experiment_name = self.experiment_name.unwrap_or_else(|| {
            output_directory
                .file_name()
                .map_or_else(|| "sweep".to_string(), |n| n.to_string_lossy().into_owned())
        });

        Ok(SweepConfig {
            experiment_name,
            output_directory,
            run_count,
            parameter_spec_path: resolve(base_dir, parameter_spec_path),
            input_template_path: resolve(base_dir, input_template_path),
            solver_executable_path: resolve_executable(base_dir, solver),
            cpu_count,
            postprocessor_executable_path: resolve_executable(base_dir, postprocessor),
            postprocessor_session_path: resolve(base_dir, session_path),
            postprocessor_session_file: session_file,
            max_parallel_runs,
            seed: self.seed,
            metrics,
        })
    }
}

fn required<T>(value: Option<T>, key: &'static str) -> Result<T> {
    value.ok_or(Error::MissingSetting(key))
}

fn positive_integer(value: serde_yaml::Value, key: &'static str) -> Result<usize> {
    let number = value.as_i64().ok_or_else(|| Error::InvalidSetting {
        key,
        reason: format!("expected an integer, got {value:?}"),
    })?;

    match usize::try_from(number) {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(Error::InvalidSetting {
            key,
            reason: format!("must be a positive integer, got {value:?}"),
        }),
    }
}

fn resolve(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn resolve_executable(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.components().count() > 1 {
        resolve(base_dir, path)
    } else {
        path
    }
}

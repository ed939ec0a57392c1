//! Run orchestration
//!
//! Two phases:
//!
//! 1. **Stage** (sequential, ascending id): create `run_<id>/`, write the
//!    bound artifact and its manifest. Any failure here is fatal, since a
//!    half-generated experiment must not proceed.
//! 2. **Execute** (bounded parallel): for every Generated run, call the
//!    solver, then the post-processor, both blocking and scoped to the run
//!    directory. A failing run is marked Failed and the batch moves on.
//!
//! Runs share nothing mutable: each worker touches only its own
//! [`RunRecord`] and its own directory. Failed runs are never retried
//! automatically; a deterministic solver fails the same way on the same
//! input. [`RunOrchestrator::retry`] is the explicit re-attempt.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::SweepConfig;
use crate::experiment::{RunFailure, RunRecord, RunStatus, Stage};
use crate::process::{ExternalProcess, Invocation, ProcessOutput};
use crate::template::BoundArtifact;
use crate::{Error, Result};

/// Artifact file written into each run directory.
pub const ARTIFACT_FILE: &str = "input.k";

/// Manifest file written into each run directory.
pub const MANIFEST_FILE: &str = "parameters.yaml";

/// Captured post-processor output inside each run directory.
pub const POSTPROCESSOR_LOG: &str = "postprocessor.log";

/// Post-processor flags: batch mode, no interactive session, run the given
/// session script.
const POSTPROCESSOR_FLAGS: [&str; 4] = ["-b", "-noses", "-fastses", "-s"];

/// The external programs a run calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Solver executable
    pub solver: PathBuf,
    /// Core count passed to the solver
    pub cpu_count: usize,
    /// Post-processor executable
    pub postprocessor: PathBuf,
    /// Post-processor session script
    pub session: PathBuf,
}

impl Toolchain {
    /// Take the tool settings from a sweep configuration.
    #[must_use]
    pub fn from_config(config: &SweepConfig) -> Self {
        Self {
            solver: config.solver_executable_path.clone(),
            cpu_count: config.cpu_count,
            postprocessor: config.postprocessor_executable_path.clone(),
            session: config.postprocessor_session(),
        }
    }
}

/// Drives runs through staging and external execution.
pub struct RunOrchestrator {
    root: PathBuf,
    toolchain: Toolchain,
    process: Arc<dyn ExternalProcess>,
    concurrency: usize,
}

impl RunOrchestrator {
    /// Create an orchestrator dispatching one run at a time.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        toolchain: Toolchain,
        process: Arc<dyn ExternalProcess>,
    ) -> Self {
        Self {
            root: root.into(),
            toolchain,
            process,
            concurrency: 1,
        }
    }

    /// Allow up to `concurrency` runs in flight (minimum 1).
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Get the batch root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory owned by run `id`.
    #[must_use]
    pub fn run_directory(&self, id: u32) -> PathBuf {
        self.root.join(format!("run_{id}"))
    }

    /// Pending run records for a list of bound artifacts; ids start at 1.
    ///
    /// # Errors
    ///
    /// Returns error if there are more artifacts than run ids.
    pub fn plan(&self, artifacts: &[BoundArtifact]) -> Result<Vec<RunRecord>> {
        artifacts
            .iter()
            .enumerate()
            .map(|(index, bound)| {
                let id = u32::try_from(index + 1)
                    .map_err(|_| Error::Other(format!("run index {index} exceeds u32")))?;
                Ok(RunRecord::new(
                    id,
                    self.run_directory(id),
                    bound.manifest.values().clone(),
                ))
            })
            .collect()
    }

    /// Write one run's directory, artifact and manifest; marks it Generated.
    ///
    /// # Errors
    ///
    /// Returns error if the directory or either file cannot be written.
    pub fn stage(&self, run: &mut RunRecord, bound: &BoundArtifact) -> Result<()> {
        std::fs::create_dir_all(run.directory())?;
        let artifact = run.directory().join(ARTIFACT_FILE);
        std::fs::write(&artifact, &bound.artifact)?;
        bound.manifest.save(run.directory().join(MANIFEST_FILE))?;
        run.mark_generated(artifact);
        Ok(())
    }

    /// Stage every Pending run, in ascending id order.
    ///
    /// `artifacts[i]` belongs to run id `i + 1`.
    ///
    /// # Errors
    ///
    /// Returns the first staging error; later runs are left Pending.
    pub fn stage_all(&self, runs: &mut [RunRecord], artifacts: &[BoundArtifact]) -> Result<()> {
        runs.sort_by_key(RunRecord::id);
        for run in runs.iter_mut().filter(|r| r.status() == RunStatus::Pending) {
            let bound = usize::try_from(run.id())
                .ok()
                .and_then(|id| artifacts.get(id.checked_sub(1)?))
                .ok_or_else(|| Error::Other(format!("no artifact for run {}", run.id())))?;
            self.stage(run, bound)?;
        }
        info!(runs = runs.len(), root = %self.root.display(), "staged run directories");
        Ok(())
    }

    /// Execute every Generated run; other runs pass through untouched.
    ///
    /// Returns the runs sorted by id. Per-run failures are recorded on the
    /// runs, never returned as `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadPool`] if the worker pool cannot be built.
    pub fn execute(&self, runs: Vec<RunRecord>) -> Result<Vec<RunRecord>> {
        self.execute_with(runs, |_| {})
    }

    /// Like [`execute`](Self::execute), calling `on_complete` with each run
    /// as soon as it reaches Executed or Failed.
    ///
    /// With more than one run in flight, `on_complete` is called from worker
    /// threads, one call per run, in completion order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ThreadPool`] if the worker pool cannot be built.
    pub fn execute_with<F>(&self, mut runs: Vec<RunRecord>, on_complete: F) -> Result<Vec<RunRecord>>
    where
        F: Fn(&RunRecord) + Sync,
    {
        runs.sort_by_key(RunRecord::id);
        let pending = runs
            .iter()
            .filter(|r| r.status() == RunStatus::Generated)
            .count();
        info!(runs = pending, concurrency = self.concurrency, "executing runs");

        if self.concurrency == 1 {
            for run in runs.iter_mut().filter(|r| r.status() == RunStatus::Generated) {
                self.execute_one(run);
                on_complete(run);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.concurrency)
                .build()
                .map_err(|e| Error::ThreadPool(e.to_string()))?;
            pool.install(|| {
                runs.par_iter_mut()
                    .filter(|r| r.status() == RunStatus::Generated)
                    .for_each(|run| {
                        self.execute_one(run);
                        on_complete(run);
                    });
            });
        }

        let failed = runs
            .iter()
            .filter(|r| r.status() == RunStatus::Failed)
            .count();
        info!(failed, total = runs.len(), "execution finished");
        Ok(runs)
    }

    /// Explicitly re-attempt one Failed run.
    ///
    /// Runs in any other status are returned unchanged.
    #[must_use]
    pub fn retry(&self, mut run: RunRecord) -> RunRecord {
        if run.reset_for_retry() {
            info!(run = run.id(), "retrying failed run");
            self.execute_one(&mut run);
        } else {
            warn!(run = run.id(), status = ?run.status(), "only failed runs can be retried");
        }
        run
    }

    /// Solver call for one run.
    #[must_use]
    pub fn solver_invocation(&self, run: &RunRecord) -> Invocation {
        let artifact = run
            .artifact()
            .and_then(Path::file_name)
            .map_or_else(|| ARTIFACT_FILE.into(), |name| name.to_string_lossy().into_owned());
        Invocation::new(&self.toolchain.solver, run.directory())
            .arg(format!("i={artifact}"))
            .arg(format!("ncpu={}", self.toolchain.cpu_count))
    }

    /// Post-processor call for one run.
    #[must_use]
    pub fn postprocessor_invocation(&self, run: &RunRecord) -> Invocation {
        Invocation::new(&self.toolchain.postprocessor, run.directory())
            .args(POSTPROCESSOR_FLAGS)
            .arg(&self.toolchain.session)
    }

    fn execute_one(&self, run: &mut RunRecord) {
        run.start();

        let solver = self.solver_invocation(run);
        if let Err(failure) = self.call(&solver, Stage::Solver) {
            warn!(run = run.id(), %failure, "run failed");
            run.mark_failed(failure);
            return;
        }

        let postprocessor = self.postprocessor_invocation(run);
        match self.call(&postprocessor, Stage::Postprocessor) {
            Ok(output) => {
                let log = run.directory().join(POSTPROCESSOR_LOG);
                if let Err(e) = std::fs::write(&log, &output.stdout) {
                    warn!(run = run.id(), error = %e, "could not write post-processor log");
                }
                run.mark_executed();
                info!(run = run.id(), "run executed");
            }
            Err(failure) => {
                warn!(run = run.id(), %failure, "run failed");
                run.mark_failed(failure);
            }
        }
    }

    fn call(&self, invocation: &Invocation, stage: Stage) -> std::result::Result<ProcessOutput, RunFailure> {
        match self.process.run(invocation) {
            Ok(output) if output.is_success() => Ok(output),
            Ok(output) => Err(RunFailure::NonZeroExit {
                stage,
                code: output.code,
            }),
            Err(e) => Err(RunFailure::LaunchFailed {
                stage,
                message: e.to_string(),
            }),
        }
    }
}

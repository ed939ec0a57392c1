//! Sweep pipeline
//!
//! Wires the stages together for one batch:
//!
//! ```text
//! SweepConfig -> ParameterSpec list -> LatinHypercube -> ExperimentDesign
//!   -> Templater (xN) -> RunOrchestrator (stage, execute)
//!   -> ResultCollector (xN) -> DatasetAssembler -> inputs_outputs.{csv,parquet}
//! ```
//!
//! Everything that can fail fatally (settings, parameter specs, template
//! parse, placeholder check, binding) happens before the first run directory
//! is written. The ledger is saved after planning, after staging, each time
//! a run finishes executing, and after collection. [`Sweep::resume`] picks
//! up from whatever the last save recorded.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{info, warn};

use crate::collector::ResultCollector;
use crate::config::{ParameterSpec, SweepConfig};
use crate::dataset::{Dataset, DatasetAssembler, DATASET_CSV, DATASET_PARQUET};
use crate::experiment::{ExperimentRecord, RunRecord, RunStatus, SweepLedger, LEDGER_FILE};
use crate::orchestrator::{RunOrchestrator, Toolchain};
use crate::process::{ExternalProcess, SystemProcess};
use crate::sampling::LatinHypercube;
use crate::template::{BoundArtifact, KeywordDeck, Templater};
use crate::{Error, Result};

/// Result of a completed sweep.
#[derive(Debug, Clone)]
pub struct SweepOutcome {
    /// Seed the design was drawn with
    pub seed: u64,
    /// Every run, ordered by id
    pub runs: Vec<RunRecord>,
    /// Assembled dataset, one row per run
    pub dataset: Dataset,
}

impl SweepOutcome {
    /// Number of runs that ended Failed.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.runs
            .iter()
            .filter(|run| run.status() == RunStatus::Failed)
            .count()
    }
}

/// One configured batch, ready to run or resume.
pub struct Sweep {
    config: SweepConfig,
    seed: Option<u64>,
    process: Arc<dyn ExternalProcess>,
    retry_failed: bool,
}

impl Sweep {
    /// Create a sweep that calls the real solver and post-processor.
    #[must_use]
    pub fn new(config: SweepConfig) -> Self {
        Self {
            config,
            seed: None,
            process: Arc::new(SystemProcess),
            retry_failed: false,
        }
    }

    /// Override the seed from the settings file.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Substitute the external process capability.
    #[must_use]
    pub fn with_process(mut self, process: Arc<dyn ExternalProcess>) -> Self {
        self.process = process;
        self
    }

    /// On resume, re-attempt runs that previously failed.
    #[must_use]
    pub const fn retry_failed(mut self, retry: bool) -> Self {
        self.retry_failed = retry;
        self
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// Path of this sweep's ledger.
    #[must_use]
    pub fn ledger_path(&self) -> PathBuf {
        self.config.output_directory.join(LEDGER_FILE)
    }

    /// Sample, bind, stage, execute, collect and assemble a fresh batch.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error. Per-run failures are recorded on the
    /// runs and in the dataset instead.
    pub fn run(&self) -> Result<SweepOutcome> {
        let config = &self.config;
        info!(
            experiment = %config.experiment_name,
            runs = config.run_count,
            output = %config.output_directory.display(),
            "starting sweep"
        );

        let specs = ParameterSpec::load(&config.parameter_spec_path)?;
        let design = LatinHypercube::new(self.seed.or(config.seed))
            .generate(&specs, config.run_count)?;
        info!(
            seed = design.seed(),
            parameters = design.dimension(),
            "sampled design"
        );

        let templater = self.templater(design.parameters())?;
        let artifacts = (0..design.run_count())
            .map(|index| {
                let row = design
                    .row_map(index)
                    .ok_or_else(|| Error::Other(format!("design has no row {index}")))?;
                templater.bind(&row)
            })
            .collect::<Result<Vec<BoundArtifact>>>()?;

        std::fs::create_dir_all(&config.output_directory)?;
        let orchestrator = self.orchestrator();
        let mut runs = orchestrator.plan(&artifacts)?;

        let metric_names = self.collector().metric_names();
        let experiment = ExperimentRecord::builder(&config.experiment_name, design.seed(), design.run_count())
            .parameters(design.parameters().to_vec())
            .metrics(metric_names)
            .config(self.config_snapshot())
            .build();

        let mut ledger = SweepLedger::new(experiment, runs.clone());
        ledger.save(self.ledger_path())?;

        orchestrator.stage_all(&mut runs, &artifacts)?;
        ledger.set_runs(runs.clone());
        ledger.save(self.ledger_path())?;

        self.finish(&orchestrator, ledger, runs)
    }

    /// Continue a batch from its ledger.
    ///
    /// Pending runs are re-bound from their manifests and staged, Generated
    /// runs are executed, Executed runs are collected, and Failed runs are
    /// re-attempted only when [`retry_failed`](Self::retry_failed) is set.
    /// Collected runs are left as they are.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error, including a missing or unreadable
    /// ledger.
    pub fn resume(&self) -> Result<SweepOutcome> {
        let mut ledger = SweepLedger::load(self.ledger_path())?;
        info!(
            experiment = %ledger.experiment().name(),
            runs = ledger.run_count(),
            "resuming sweep"
        );

        let templater = self.templater(ledger.experiment().parameters())?;
        let orchestrator = self.orchestrator();
        let mut runs = ledger.runs().to_vec();

        for run in runs
            .iter_mut()
            .filter(|run| run.status() == RunStatus::Pending)
        {
            let bound = templater.bind(run.parameters())?;
            orchestrator.stage(run, &bound)?;
        }
        ledger.set_runs(runs.clone());
        ledger.save(self.ledger_path())?;

        if self.retry_failed {
            for run in runs
                .iter_mut()
                .filter(|run| run.status() == RunStatus::Failed)
            {
                if run.reset_for_retry() {
                    info!(run = run.id(), "retrying failed run");
                }
            }
        }

        self.finish(&orchestrator, ledger, runs)
    }

    fn finish(
        &self,
        orchestrator: &RunOrchestrator,
        ledger: SweepLedger,
        runs: Vec<RunRecord>,
    ) -> Result<SweepOutcome> {
        let ledger_path = self.ledger_path();
        let shared = Mutex::new(ledger);
        let runs = orchestrator.execute_with(runs, |run| {
            let mut ledger = shared.lock().unwrap_or_else(PoisonError::into_inner);
            ledger.update_run(run.clone());
            if let Err(e) = ledger.save(&ledger_path) {
                warn!(run = run.id(), error = %e, "could not save ledger");
            }
        })?;
        let mut ledger = shared.into_inner().unwrap_or_else(PoisonError::into_inner);

        let runs = self.collector().collect_all(runs);
        ledger.set_runs(runs);
        ledger.save(&ledger_path)?;

        let (experiment, runs) = ledger.into_parts();
        let dataset = DatasetAssembler::new(
            experiment.parameters().to_vec(),
            experiment.metrics().to_vec(),
        )
        .assemble(&runs)?;

        let root = &self.config.output_directory;
        dataset.write_csv(root.join(DATASET_CSV))?;
        dataset.write_parquet(root.join(DATASET_PARQUET))?;

        let outcome = SweepOutcome {
            seed: experiment.seed(),
            runs,
            dataset,
        };
        let failed = outcome.failed_count();
        if failed > 0 {
            warn!(failed, total = outcome.runs.len(), "sweep finished with failed runs");
        }
        info!(rows = outcome.dataset.len(), output = %root.display(), "sweep finished");
        Ok(outcome)
    }

    /// Template with its include path pointed at the output directory.
    fn templater(&self, parameters: &[String]) -> Result<Templater<KeywordDeck>> {
        let mut deck = KeywordDeck::load(&self.config.input_template_path)?;
        if !deck.set_include_path(&self.config.output_directory) {
            info!("template has no *INCLUDE_PATH card; left unchanged");
        }
        Templater::new(deck, parameters)
    }

    fn orchestrator(&self) -> RunOrchestrator {
        RunOrchestrator::new(
            &self.config.output_directory,
            Toolchain::from_config(&self.config),
            Arc::clone(&self.process),
        )
        .with_concurrency(self.config.max_parallel_runs)
    }

    fn collector(&self) -> ResultCollector {
        ResultCollector::new(self.config.metrics.clone())
    }

    fn config_snapshot(&self) -> serde_json::Value {
        let config = &self.config;
        serde_json::json!({
            "parameter_spec_path": config.parameter_spec_path.display().to_string(),
            "input_template_path": config.input_template_path.display().to_string(),
            "solver_executable_path": config.solver_executable_path.display().to_string(),
            "cpu_count": config.cpu_count,
            "postprocessor_executable_path": config.postprocessor_executable_path.display().to_string(),
            "postprocessor_session": config.postprocessor_session().display().to_string(),
            "max_parallel_runs": config.max_parallel_runs,
        })
    }
}

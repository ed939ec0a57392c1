//! Settings loaded through a relative path
//!
//! Changes the process working directory, so it lives in its own test
//! binary and holds a single test.

use std::io;
use std::path::Path;
use std::sync::Arc;

use trueno_doe::config::SweepConfig;
use trueno_doe::process::{ExternalProcess, Invocation, ProcessOutput};
use trueno_doe::Sweep;

const TEMPLATE: &str = "\
*KEYWORD
*PARAMETER
R A 0.0
*END
";

const PARAMETERS: &str = "\
parameters:
  A: { type: dynaParameter, min: 0.0, max: 1.0 }
";

const SETTINGS: &str = "\
output_directory: out
run_count: 2
parameter_spec_path: parameters.yaml
input_template_path: model.k
solver_executable_path: bin/solver
cpu_count: 1
postprocessor_executable_path: metapost
postprocessor_session_path: sessions
postprocessor_session_file: hic.ses
seed: 3
";

/// Resolves paths the way a child process started in the run directory
/// would: relative to its working directory.
struct RunDirectoryView;

impl ExternalProcess for RunDirectoryView {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        let dir = invocation.working_dir();
        assert!(dir.is_absolute(), "run directory {} is relative", dir.display());

        if invocation.program().ends_with("solver") {
            if !dir.join(invocation.program()).is_file() {
                return Err(io::Error::new(io::ErrorKind::NotFound, "solver not found"));
            }
            return Ok(ProcessOutput::success());
        }

        let session = invocation.arguments().last().cloned().unwrap_or_default();
        if !dir.join(&session).is_file() {
            return Ok(ProcessOutput::exit(7));
        }
        std::fs::write(dir.join("HIC_15.csv"), "1\n2\n3\n4\n5\n6\nHIC_15,42.0\n")?;
        Ok(ProcessOutput::success())
    }
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

#[test]
fn test_relative_settings_path_reaches_tools_from_run_directories() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("cfg");
    write(&cfg.join("settings.yaml"), SETTINGS);
    write(&cfg.join("parameters.yaml"), PARAMETERS);
    write(&cfg.join("model.k"), TEMPLATE);
    write(&cfg.join("bin").join("solver"), "");
    write(&cfg.join("sessions").join("hic.ses"), "");

    std::env::set_current_dir(dir.path()).unwrap();
    let config = SweepConfig::load(Path::new("cfg/settings.yaml")).unwrap();
    let cfg = std::env::current_dir().unwrap().join("cfg");

    assert_eq!(config.postprocessor_session(), cfg.join("sessions").join("hic.ses"));
    assert_eq!(config.solver_executable_path, cfg.join("bin").join("solver"));
    assert_eq!(config.output_directory, cfg.join("out"));

    let outcome = Sweep::new(config)
        .with_process(Arc::new(RunDirectoryView))
        .run()
        .unwrap();

    assert_eq!(outcome.failed_count(), 0);
    assert!(outcome.runs.iter().all(|run| run.directory().is_absolute()));
    assert!(outcome
        .dataset
        .rows()
        .iter()
        .all(|row| !row.outputs[0].is_missing()));
}

//! External process capability
//!
//! The orchestrator never builds shell command lines. It hands an
//! [`Invocation`] (program, argument vector, working directory) to an
//! [`ExternalProcess`], which makes the solver and post-processor
//! substitutable in tests.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

/// One blocking call to an external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: PathBuf,
    args: Vec<OsString>,
    working_dir: PathBuf,
}

impl Invocation {
    /// Create an invocation with no arguments.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
        }
    }

    /// Append one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Get the program.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Get the arguments.
    #[must_use]
    pub fn arguments(&self) -> &[OsString] {
        &self.args
    }

    /// Get the working directory the program runs in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }
}

/// Outcome of a process that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// Exit code; `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: Vec<u8>,
    /// Captured standard error
    pub stderr: Vec<u8>,
}

impl ProcessOutput {
    /// A successful exit with no output.
    #[must_use]
    pub const fn success() -> Self {
        Self {
            code: Some(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// An unsuccessful exit with the given code.
    #[must_use]
    pub const fn exit(code: i32) -> Self {
        Self {
            code: Some(code),
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    /// Whether the process exited with status 0.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }
}

/// Runs external programs on behalf of the orchestrator.
///
/// Implementations block until the program exits. An `Err` means the
/// program could not be launched at all; a completed program with a nonzero
/// exit is an `Ok` with an unsuccessful [`ProcessOutput`].
pub trait ExternalProcess: Send + Sync {
    /// Run the invocation to completion.
    ///
    /// # Errors
    ///
    /// Returns the launch error if the program cannot be started.
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput>;
}

/// [`ExternalProcess`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcess;

impl ExternalProcess for SystemProcess {
    fn run(&self, invocation: &Invocation) -> io::Result<ProcessOutput> {
        debug!(
            program = %invocation.program().display(),
            args = ?invocation.arguments(),
            cwd = %invocation.working_dir().display(),
            "launching external process"
        );
        let output = Command::new(invocation.program())
            .args(invocation.arguments())
            .current_dir(invocation.working_dir())
            .output()?;

        Ok(ProcessOutput {
            code: output.status.code(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invocation_builder() {
        let inv = Invocation::new("solver", "/tmp/run_1")
            .arg("i=input.k")
            .args(["ncpu=4"]);
        assert_eq!(inv.program(), Path::new("solver"));
        assert_eq!(inv.arguments(), &[OsString::from("i=input.k"), OsString::from("ncpu=4")]);
        assert_eq!(inv.working_dir(), Path::new("/tmp/run_1"));
    }

    #[test]
    fn test_process_output_success() {
        assert!(ProcessOutput::success().is_success());
        assert!(!ProcessOutput::exit(1).is_success());
        assert!(!ProcessOutput::default().is_success());
    }

    #[test]
    fn test_system_process_launch_failure() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::new("definitely-not-a-real-solver-binary", dir.path());
        assert!(SystemProcess.run(&inv).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_system_process_runs_in_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let inv = Invocation::new("sh", dir.path()).args(["-c", "touch marker; exit 3"]);
        let output = SystemProcess.run(&inv).unwrap();
        assert_eq!(output.code, Some(3));
        assert!(dir.path().join("marker").exists());
    }
}

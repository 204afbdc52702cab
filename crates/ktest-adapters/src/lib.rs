//! Std adapters for ktest.
//!
//! In clean-arch terms: this is where we touch the world. Processes, temp dirs,
//! symlinks, the environment and `/sys` probes all live here; the app layer only
//! sees [`ProcessRunner`] and plain paths.

mod discover;
mod env;
mod toolchain;
mod watch;
mod workspace;

pub use discover::{FileKind, discover_files};
pub use env::{EnvSnapshot, composer_root, cpu_boost_issue, cpu_boost_issue_under, locate_kphp2cpp};
pub use toolchain::{KphpBuild, KphpRun, PhpRun};
pub use watch::{WatchedRun, run_watched};
pub use workspace::{CleanupRegistry, Workspace, cleanup_registered, copy_profiles, profile_name};

use anyhow::Context;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    pub fn new<I, S>(argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            argv: argv.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        self.argv.join(" ")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunResult {
    pub exit_code: i32,
    pub wall: Duration,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl RunResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// stdout followed by stderr, lossily decoded.
    pub fn combined_output(&self) -> String {
        let mut out = String::from_utf8_lossy(&self.stdout).into_owned();
        out.push_str(&String::from_utf8_lossy(&self.stderr));
        out
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("command argv must not be empty")]
    EmptyArgv,

    #[error("{program}: exit status {code}: {output}")]
    Failed {
        program: String,
        code: i32,
        output: String,
    },

    #[error("run {label} benchmarks: {reason}: {output}")]
    Watched {
        label: String,
        reason: String,
        output: String,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError>;

    /// Like [`ProcessRunner::run`], but a nonzero exit is an error carrying the combined output.
    fn run_checked(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        let result = self.run(spec)?;
        if !result.success() {
            return Err(AdapterError::Failed {
                program: spec.argv.first().cloned().unwrap_or_default(),
                code: result.exit_code,
                output: result.combined_output(),
            });
        }
        Ok(result)
    }
}

impl<R: ProcessRunner + ?Sized> ProcessRunner for &R {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        (**self).run(spec)
    }
}

#[derive(Debug, Default, Clone)]
pub struct StdProcessRunner;

impl ProcessRunner for StdProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        use std::process::{Command, Stdio};

        let Some((program, args)) = spec.argv.split_first() else {
            return Err(AdapterError::EmptyArgv);
        };
        tracing::debug!(command = %spec.display(), cwd = ?spec.cwd, "exec");

        let start = Instant::now();
        let mut cmd = Command::new(program);
        cmd.args(args).stdin(Stdio::null());
        if let Some(cwd) = &spec.cwd {
            cmd.current_dir(cwd);
        }
        for (k, v) in &spec.env {
            cmd.env(k, v);
        }

        let out = cmd
            .output()
            .with_context(|| format!("failed to run {:?}", spec.argv))?;

        Ok(RunResult {
            exit_code: out.status.code().unwrap_or(-1),
            wall: start.elapsed(),
            stdout: out.stdout,
            stderr: out.stderr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_argv_returns_error() {
        let err = StdProcessRunner.run(&CommandSpec::default()).unwrap_err();
        assert!(matches!(err, AdapterError::EmptyArgv), "{err:?}");
        assert!(err.to_string().contains("argv"));
    }

    #[test]
    fn spawn_failure_is_reported_with_argv() {
        let spec = CommandSpec::new(["/nonexistent/ktest-no-such-binary"]);
        let err = StdProcessRunner.run(&spec).unwrap_err();
        assert!(err.to_string().contains("ktest-no-such-binary"), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn captures_both_streams_and_cwd() {
        let dir = tempfile::tempdir().unwrap();
        let spec = CommandSpec::new(["sh", "-c", "pwd; echo oops >&2"]).cwd(dir.path());
        let result = StdProcessRunner.run(&spec).unwrap();
        assert!(result.success());
        let stdout = String::from_utf8(result.stdout.clone()).unwrap();
        let expected = dir.path().canonicalize().unwrap();
        assert_eq!(std::path::Path::new(stdout.trim()).canonicalize().unwrap(), expected);
        assert_eq!(result.stderr, b"oops\n");
    }

    #[cfg(unix)]
    #[test]
    fn run_checked_turns_nonzero_exit_into_error() {
        let spec = CommandSpec::new(["sh", "-c", "echo out; echo err >&2; exit 3"]);
        let err = StdProcessRunner.run_checked(&spec).unwrap_err();
        match err {
            AdapterError::Failed {
                program,
                code,
                output,
            } => {
                assert_eq!(program, "sh");
                assert_eq!(code, 3);
                assert_eq!(output, "out\nerr\n");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn combined_output_puts_stdout_first() {
        let r = RunResult {
            stdout: b"a".to_vec(),
            stderr: b"b".to_vec(),
            ..RunResult::default()
        };
        assert_eq!(r.combined_output(), "ab");
        assert!(r.success());
    }
}

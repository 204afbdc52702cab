//! Scripted process runner for use case tests.

use ktest_adapters::{AdapterError, CommandSpec, ProcessRunner, RunResult};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) struct Reply(Result<RunResult, String>);

impl Reply {
    pub fn ok(stdout: &str) -> Self {
        Self(Ok(RunResult {
            exit_code: 0,
            wall: Duration::from_millis(5),
            stdout: stdout.as_bytes().to_vec(),
            stderr: Vec::new(),
        }))
    }

    pub fn fail(stderr: &str) -> Self {
        Self(Ok(RunResult {
            exit_code: 1,
            wall: Duration::from_millis(1),
            stdout: Vec::new(),
            stderr: stderr.as_bytes().to_vec(),
        }))
    }

    /// The process could not be started at all.
    pub fn spawn_error(reason: &str) -> Self {
        Self(Err(reason.to_string()))
    }

    pub fn with_stderr(mut self, stderr: &str) -> Self {
        if let Ok(result) = &mut self.0 {
            result.stderr = stderr.as_bytes().to_vec();
        }
        self
    }
}

/// Answers each call with the next scripted reply; panics when the script runs out.
#[derive(Debug, Default)]
pub(crate) struct FakeRunner {
    replies: RefCell<VecDeque<Reply>>,
    calls: RefCell<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: RefCell::new(replies.into()),
            calls: RefCell::default(),
        }
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.borrow().clone()
    }
}

impl ProcessRunner for FakeRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        self.calls.borrow_mut().push(spec.clone());
        let reply = self
            .replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected command: {}", spec.display()));
        reply
            .0
            .map_err(|reason| anyhow::anyhow!("failed to run {}: {reason}", spec.display()).into())
    }
}

//! Run one script under the interpreter and as a compiled executable, then diff stdout.

use anyhow::Context;
use ktest_adapters::{KphpBuild, KphpRun, PhpRun, ProcessRunner, Workspace, composer_root};
use similar::{ChangeTag, TextDiff};
use std::path::PathBuf;

const WORKSPACE_PREFIX: &str = "kphpcompare-build";

#[derive(Debug, Clone)]
pub struct CompareRequest {
    pub script: PathBuf,
    pub project_root: PathBuf,
    pub php: String,
    pub kphp2cpp: PathBuf,
    pub include_dirs: Vec<String>,
    pub no_cleanup: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareOutcome {
    Same,
    /// `-` lines are interpreter output, `+` lines compiled output.
    Differs(String),
}

impl CompareOutcome {
    pub fn message(&self) -> String {
        match self {
            Self::Same => "stdout matches".to_string(),
            Self::Differs(diff) => format!("stdout differs (-PHP +KPHP):\n{diff}"),
        }
    }
}

pub struct CompareUseCase<R: ProcessRunner> {
    runner: R,
}

impl<R: ProcessRunner> CompareUseCase<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn execute(&self, req: &CompareRequest) -> anyhow::Result<CompareOutcome> {
        let script = std::path::absolute(&req.script)
            .with_context(|| format!("resolve {}", req.script.display()))?;

        let php = PhpRun {
            command: req.php.clone(),
            script: script.clone(),
            workdir: req.project_root.clone(),
            preload: None,
            jit: false,
            args: Vec::new(),
        };
        let php_out = self.runner.run_checked(&php.command()).context("run php")?;

        let workspace = Workspace::create(WORKSPACE_PREFIX, req.no_cleanup)?;
        let build = KphpBuild {
            binary: req.kphp2cpp.clone(),
            script,
            output_dir: workspace.path().to_path_buf(),
            workdir: workspace.path().to_path_buf(),
            composer_root: composer_root(&req.project_root),
            include_dirs: req.include_dirs.clone(),
            profiling: false,
        };
        self.runner.run_checked(&build.command()).context("build")?;

        let run = KphpRun {
            executable: build.executable(),
            workdir: req.project_root.clone(),
            args: Vec::new(),
            profiler_prefix: None,
        };
        let kphp_out = self.runner.run_checked(&run.command()).context("run kphp")?;

        let expected = String::from_utf8_lossy(&php_out.stdout);
        let actual = String::from_utf8_lossy(&kphp_out.stdout);
        if expected == actual {
            return Ok(CompareOutcome::Same);
        }
        Ok(CompareOutcome::Differs(line_diff(&expected, &actual)))
    }
}

fn line_diff(old: &str, new: &str) -> String {
    let mut out = String::new();
    for change in TextDiff::from_lines(old, new).iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Equal => continue,
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
        };
        out.push(sign);
        out.push_str(change.value().strip_suffix('\n').unwrap_or(change.value()));
        out.push('\n');
    }
    out
}

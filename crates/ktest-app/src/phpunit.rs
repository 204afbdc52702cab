//! Test pipeline: rewrite `*Test.php` files for the compiled test framework, build one
//! driver per file and collect the event streams into a single report.

use crate::pipeline::{InputFile, input_files, progress_line, stage, target_dir};
use anyhow::Context;
use ktest_adapters::{
    FileKind, KphpBuild, KphpRun, ProcessRunner, Workspace, composer_root, discover_files,
};
use ktest_domain::{apply_text_edits, extract_test, parse_event_stream};
use ktest_render::DriverGenerator;
use ktest_types::{ExecutionReport, TestUnit};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

const WORKSPACE_PREFIX: &str = "kphpunit-build";

#[derive(Debug, Clone)]
pub struct PhpunitRequest {
    pub target: PathBuf,
    pub project_root: PathBuf,
    /// Relative to `project_root`.
    pub src_dir: PathBuf,
    pub kphp2cpp: PathBuf,
    pub include_dirs: Vec<String>,
    pub no_cleanup: bool,
}

struct TestFile {
    input: InputFile,
    unit: TestUnit,
    /// Rewritten source inside the workspace.
    rewritten: PathBuf,
}

pub struct PhpunitUseCase<R: ProcessRunner> {
    runner: R,
    drivers: DriverGenerator,
}

impl<R: ProcessRunner> PhpunitUseCase<R> {
    pub fn new(runner: R) -> anyhow::Result<Self> {
        Ok(Self {
            runner,
            drivers: DriverGenerator::new().context("load driver templates")?,
        })
    }

    /// Failing tests are part of the report, not an error.
    pub fn execute(&self, req: &PhpunitRequest, out: &mut dyn Write) -> anyhow::Result<ExecutionReport> {
        let start = Instant::now();
        let dir = target_dir(&req.target);

        let files = stage("find test files", || {
            Ok(input_files(discover_files(&req.target, FileKind::Test)?, &dir))
        })?;

        let workspace = stage("prepare temp build dir", || {
            let workspace = Workspace::create(WORKSPACE_PREFIX, req.no_cleanup)?;
            let src_dir = req.src_dir.display().to_string();
            workspace.link_existing(&req.project_root, &[&src_dir, "vendor", "composer.json"])?;
            Ok(workspace)
        })?;

        let tests_dir = workspace.path().join(relative_tests_dir(&dir, &req.project_root));
        let files = stage("parse test files", || rewrite_files(files, &tests_dir))?;

        let mut report = stage("run tests", || self.run_all(req, &workspace, &files, out))?;
        report.elapsed = start.elapsed();
        Ok(report)
    }

    fn run_all(
        &self,
        req: &PhpunitRequest,
        workspace: &Workspace,
        files: &[TestFile],
        out: &mut dyn Write,
    ) -> anyhow::Result<ExecutionReport> {
        let total: usize = files.iter().map(|f| f.unit.methods.len()).sum();
        let mut completed = 0;
        let mut report = ExecutionReport::default();

        for (id, file) in files.iter().enumerate() {
            completed += file.unit.methods.len();
            let ok = self.run_one(req, workspace, id, file, out, &mut report)?;
            writeln!(out, "{}", progress_line(completed, total, !ok))?;
        }
        Ok(report)
    }

    fn run_one(
        &self,
        req: &PhpunitRequest,
        workspace: &Workspace,
        id: usize,
        file: &TestFile,
        out: &mut dyn Write,
        report: &mut ExecutionReport,
    ) -> anyhow::Result<bool> {
        let full_name = file.input.full_name.display();
        let driver = self
            .drivers
            .test(&file.unit, &file.rewritten.display().to_string())
            .with_context(|| format!("generate test main for {full_name}"))?;
        let main = workspace.write_file(Path::new("mains").join(format!("{id}.php")), driver.as_bytes())?;

        let output_dir = workspace.path().join("build").join(id.to_string());
        let build = KphpBuild {
            binary: req.kphp2cpp.clone(),
            script: main,
            output_dir: output_dir.clone(),
            workdir: workspace.path().to_path_buf(),
            composer_root: composer_root(&req.project_root).map(|_| workspace.path().to_path_buf()),
            include_dirs: req.include_dirs.clone(),
            profiling: false,
        };
        if let Err(err) = self.runner.run_checked(&build.command()) {
            tracing::error!("{full_name}: build error: {err}");
            return Ok(false);
        }

        let run = KphpRun {
            executable: build.executable(),
            workdir: workspace.path().to_path_buf(),
            args: Vec::new(),
            profiler_prefix: None,
        };
        let result = match self.runner.run(&run.command()) {
            Ok(result) => result,
            Err(err) => {
                tracing::error!("{full_name}: run error: {err}");
                return Ok(false);
            }
        };
        out.write_all(&result.stderr)?;
        if !result.success() {
            tracing::error!(
                "{full_name}: run error: exit status {}: {}",
                result.exit_code,
                String::from_utf8_lossy(&result.stdout)
            );
            return Ok(false);
        }

        let summary = match parse_event_stream(&result.stdout, &file.unit.class_name, &file.input.full_name) {
            Ok(summary) => summary,
            Err(err) => {
                tracing::error!("{full_name}: parse test output: {err}");
                return Ok(false);
            }
        };
        if !summary.finished {
            tracing::warn!("{full_name}: test output has no FINISHED marker");
        }
        let ok = summary.failures.is_empty();
        report.absorb(summary);
        Ok(ok)
    }
}

/// Where the target directory lives inside the workspace.
fn relative_tests_dir(dir: &Path, project_root: &Path) -> PathBuf {
    let absolute = |p: &Path| std::path::absolute(p).unwrap_or_else(|_| p.to_path_buf());
    absolute(dir)
        .strip_prefix(absolute(project_root))
        .map_or_else(|_| PathBuf::from("tests"), Path::to_path_buf)
}

/// Unparsable files and files without a test class are skipped with a log line.
fn rewrite_files(files: Vec<InputFile>, tests_dir: &Path) -> anyhow::Result<Vec<TestFile>> {
    let mut out = Vec::new();
    for input in files {
        let src = std::fs::read(&input.full_name)
            .with_context(|| format!("read file {}", input.full_name.display()))?;
        let text = String::from_utf8_lossy(&src);
        let parsed = match ktest_phpsyntax::parse(&text) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::error!("{}: parse error: {err}", input.full_name.display());
                continue;
            }
        };
        let Some(unit) = extract_test(&parsed) else {
            tracing::warn!("{}: can't find a test class inside a file", input.full_name.display());
            continue;
        };

        let rewritten = tests_dir.join(&input.short_name);
        if let Some(parent) = rewritten.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(&rewritten, apply_text_edits(text.as_bytes(), &unit.edits))
            .with_context(|| format!("write {}", rewritten.display()))?;
        out.push(TestFile {
            input,
            unit,
            rewritten,
        });
    }
    Ok(out)
}

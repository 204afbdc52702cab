//! Benchmark pipeline: discover `Benchmark*.php` files, generate one driver per class,
//! build it (or hand it to the interpreter) and forward the timing records.

use crate::pipeline::{InputFile, input_files, stage, target_dir};
use anyhow::Context;
use ktest_adapters::{
    FileKind, KphpBuild, KphpRun, PhpRun, ProcessRunner, Workspace, composer_root, copy_profiles,
    cpu_boost_issue, discover_files,
};
use ktest_domain::{DomainError, extract_benchmark, select_methods};
use ktest_render::{BenchDriverOptions, DriverGenerator, teamcity};
use ktest_types::BenchmarkUnit;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

const WORKSPACE_PREFIX: &str = "kphpbench-build";
const PROFILER_PREFIX: &str = "ktest";

/// Who executes the generated driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BenchBackend {
    Kphp {
        binary: PathBuf,
        include_dirs: Vec<String>,
    },
    Php {
        command: String,
        jit: bool,
    },
}

#[derive(Debug, Clone)]
pub struct BenchRequest {
    pub target: PathBuf,
    pub project_root: PathBuf,
    pub backend: BenchBackend,
    pub count: u32,
    /// Regex over `Class::key`.
    pub run_filter: String,
    pub benchmem: bool,
    pub teamcity: bool,
    /// Collect profiler output here (compiled backend only).
    pub profile_dir: Option<PathBuf>,
    pub disable_kphp_autoload: bool,
    pub preload: Option<PathBuf>,
    pub no_cleanup: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchOutcome {
    pub classes_ok: usize,
    pub classes_failed: usize,
    pub profiles: Vec<PathBuf>,
}

struct BenchFile {
    input: InputFile,
    unit: BenchmarkUnit,
    driver: String,
}

pub struct BenchUseCase<R: ProcessRunner> {
    runner: R,
    drivers: DriverGenerator,
}

impl<R: ProcessRunner> BenchUseCase<R> {
    pub fn new(runner: R) -> anyhow::Result<Self> {
        Ok(Self {
            runner,
            drivers: DriverGenerator::new().context("load driver templates")?,
        })
    }

    pub fn execute(&self, req: &BenchRequest, out: &mut dyn Write) -> anyhow::Result<BenchOutcome> {
        stage("check for issues", || {
            if let Some(issue) = cpu_boost_issue() {
                tracing::warn!("{issue}");
            }
            Ok(())
        })?;

        let files = stage("find bench files", || {
            let dir = target_dir(&req.target);
            Ok(input_files(discover_files(&req.target, FileKind::Benchmark)?, &dir))
        })?;

        let workspace = stage("prepare temp build dir", || self.prepare_workspace(req))?;
        let profiles_dir = workspace.path().join("profiles");

        let mut units = stage("parse bench files", || parse_units(files))?;

        stage("sort bench files", || {
            units.sort_by(|a, b| a.0.full_name.cmp(&b.0.full_name));
            Ok(())
        })?;

        let files = stage("generate bench main", || self.generate(req, units))?;

        let mut outcome = stage("run bench", || self.run_all(req, &workspace, &files, out))?;

        if req.profile_dir.is_some() && matches!(req.backend, BenchBackend::Kphp { .. }) {
            outcome.profiles = stage("move profiles", || {
                let dest = req.profile_dir.as_deref().context("profile dir is not set")?;
                copy_profiles(&profiles_dir, dest)
            })?;
        }
        Ok(outcome)
    }

    fn prepare_workspace(&self, req: &BenchRequest) -> anyhow::Result<Workspace> {
        let workspace = Workspace::create(WORKSPACE_PREFIX, req.no_cleanup)?;
        if req.profile_dir.is_some() {
            std::fs::create_dir_all(workspace.path().join("profiles")).context("create profiles dir")?;
        }
        let mut links = vec!["vendor".to_string(), "composer.json".to_string(), "ffilibs".to_string()];
        if let Some(preload) = req.preload.as_ref().filter(|p| p.is_relative()) {
            links.push(preload.display().to_string());
        }
        let links: Vec<&str> = links.iter().map(String::as_str).collect();
        workspace.link_existing(&req.project_root, &links)?;
        Ok(workspace)
    }

    fn generate(&self, req: &BenchRequest, units: Vec<(InputFile, BenchmarkUnit)>) -> anyhow::Result<Vec<BenchFile>> {
        let (inputs, mut units): (Vec<InputFile>, Vec<BenchmarkUnit>) = units.into_iter().unzip();
        let selected = select_methods(&mut units, &req.run_filter)?;
        tracing::debug!(selected, "benchmarks selected");

        let is_kphp = matches!(req.backend, BenchBackend::Kphp { .. });
        let bootstrap = composer_root(&req.project_root)
            .map(|root| root.join("vendor").join("autoload.php").display().to_string());

        let mut files = Vec::new();
        for (input, unit) in inputs.into_iter().zip(units) {
            if unit.methods.is_empty() {
                continue;
            }
            let opts = BenchDriverOptions {
                count: req.count,
                benchmem: req.benchmem && is_kphp,
                teamcity: req.teamcity,
                profiling: req.profile_dir.is_some() && is_kphp,
                bootstrap: bootstrap.clone(),
                only_php_autoload: req.disable_kphp_autoload,
                bench_file: input.full_name.display().to_string(),
            };
            let driver = self
                .drivers
                .bench(&unit, &opts)
                .with_context(|| input.full_name.display().to_string())?;
            files.push(BenchFile { input, unit, driver });
        }
        Ok(files)
    }

    fn run_all(
        &self,
        req: &BenchRequest,
        workspace: &Workspace,
        files: &[BenchFile],
        out: &mut dyn Write,
    ) -> anyhow::Result<BenchOutcome> {
        let mut outcome = BenchOutcome::default();
        for file in files {
            let suite = teamcity::suite_name(&file.unit.class_fqn);
            if req.teamcity {
                writeln!(out, "{}", teamcity::suite_started(suite))?;
            }
            let (ok, elapsed) = self.run_one(req, workspace, file, out)?;
            if ok {
                outcome.classes_ok += 1;
                writeln!(out, "ok {} {elapsed:?}", file.unit.class_fqn)?;
            } else {
                outcome.classes_failed += 1;
            }
            if req.teamcity {
                writeln!(out, "{}", teamcity::suite_finished(suite, elapsed))?;
            }
        }
        Ok(outcome)
    }

    /// Build and run every method of one class. Build and run failures are logged and
    /// reported as `false`; only I/O errors on our side abort the pipeline.
    fn run_one(
        &self,
        req: &BenchRequest,
        workspace: &Workspace,
        file: &BenchFile,
        out: &mut dyn Write,
    ) -> anyhow::Result<(bool, Duration)> {
        let full_name = file.input.full_name.display();
        let main = workspace.write_file("main.php", file.driver.as_bytes())?;

        let executable = match &req.backend {
            BenchBackend::Kphp { binary, include_dirs } => {
                let build = KphpBuild {
                    binary: binary.clone(),
                    script: main.clone(),
                    output_dir: workspace.path().to_path_buf(),
                    workdir: workspace.path().to_path_buf(),
                    composer_root: composer_root(&req.project_root),
                    include_dirs: include_dirs.clone(),
                    profiling: req.profile_dir.is_some(),
                };
                if let Err(err) = self.runner.run_checked(&build.command()) {
                    tracing::error!("{full_name}: build error: {err}");
                    return Ok((false, Duration::ZERO));
                }
                Some(build.executable())
            }
            BenchBackend::Php { .. } => None,
        };

        writeln!(out, "class: {}", file.unit.class_fqn)?;
        let mut total = Duration::ZERO;
        for method in &file.unit.methods {
            let spec = match (&req.backend, &executable) {
                (BenchBackend::Kphp { .. }, Some(executable)) => KphpRun {
                    executable: executable.clone(),
                    workdir: workspace.path().to_path_buf(),
                    args: vec![method.name.clone()],
                    profiler_prefix: req
                        .profile_dir
                        .is_some()
                        .then(|| workspace.path().join("profiles").join(PROFILER_PREFIX)),
                }
                .command(),
                (BenchBackend::Php { command, jit }, _) => PhpRun {
                    command: command.clone(),
                    script: main.clone(),
                    workdir: workspace.path().to_path_buf(),
                    preload: req.preload.clone(),
                    jit: *jit,
                    args: vec![method.name.clone()],
                }
                .command(),
                (BenchBackend::Kphp { .. }, None) => anyhow::bail!("no executable for {full_name}"),
            };

            let result = match self.runner.run(&spec) {
                Ok(result) => result,
                Err(err) => {
                    tracing::error!("{full_name}: {} run error: {err}", method.name);
                    return Ok((false, total));
                }
            };
            total += result.wall;
            out.write_all(&result.stderr)?;
            if !result.success() {
                tracing::error!(
                    "{full_name}: {} run error: exit status {}: {}",
                    method.name,
                    result.exit_code,
                    result.combined_output()
                );
                return Ok((false, total));
            }
        }
        Ok((true, total))
    }
}

/// Parse failures and build-blocking naming issues skip the file; a file with no
/// benchmark class at all is fatal.
fn parse_units(files: Vec<InputFile>) -> anyhow::Result<Vec<(InputFile, BenchmarkUnit)>> {
    let mut units = Vec::new();
    for input in files {
        let src = std::fs::read_to_string(&input.full_name)
            .with_context(|| format!("read file {}", input.full_name.display()))?;
        let parsed = match ktest_phpsyntax::parse(&src) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::error!("{}: parse error: {err}", input.full_name.display());
                continue;
            }
        };

        let short_name = input.short_name.display().to_string();
        let extraction = extract_benchmark(&parsed, &short_name);
        for issue in &extraction.issues {
            if issue.blocks_build() {
                tracing::error!("{short_name}: {}", issue.message);
            } else {
                tracing::warn!("{short_name}: {}", issue.message);
            }
        }
        if extraction.blocks_build() {
            continue;
        }
        let Some(unit) = extraction.unit else {
            return Err(DomainError::NoBenchmarkClass { file: short_name }.into());
        };
        units.push((input, unit));
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, Reply};
    use std::fs;
    use std::path::Path;

    const CONCAT: &str = "<?php\nclass BenchmarkConcat {\n  public function benchmarkImplode() {}\n  public function benchmark_dot() {}\n}\n";
    const ARRAYS: &str = "<?php\nnamespace Acme;\nclass BenchmarkArrays {\n  public function benchmarkPush() {}\n}\n";

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bench")).unwrap();
        fs::write(dir.path().join("bench/BenchmarkConcat.php"), CONCAT).unwrap();
        fs::write(dir.path().join("bench/BenchmarkArrays.php"), ARRAYS).unwrap();
        dir
    }

    fn request(root: &Path) -> BenchRequest {
        BenchRequest {
            target: root.join("bench"),
            project_root: root.to_path_buf(),
            backend: BenchBackend::Kphp {
                binary: "/opt/kphp2cpp".into(),
                include_dirs: vec![],
            },
            count: 2,
            run_filter: ".*".into(),
            benchmem: false,
            teamcity: false,
            profile_dir: None,
            disable_kphp_autoload: false,
            preload: None,
            no_cleanup: false,
        }
    }

    fn record(name: &str) -> Reply {
        Reply::ok("").with_stderr(&format!("{name}\t1000\t12.0 ns/op\n{name}\t1000\t13.0 ns/op\n"))
    }

    #[test]
    fn builds_each_class_and_forwards_records() {
        let root = project();
        let runner = FakeRunner::new(vec![
            Reply::ok(""),
            record("BenchmarkArrays::Push"),
            Reply::ok(""),
            record("BenchmarkConcat::Implode"),
            record("BenchmarkConcat::dot"),
        ]);
        let mut out = Vec::new();
        let outcome = BenchUseCase::new(&runner)
            .unwrap()
            .execute(&request(root.path()), &mut out)
            .unwrap();
        assert_eq!(outcome.classes_ok, 2);
        assert_eq!(outcome.classes_failed, 0);

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("class: \\Acme\\BenchmarkArrays\nBenchmarkArrays::Push\t1000\t12.0 ns/op\n"), "{text}");
        assert!(text.contains("ok \\Acme\\BenchmarkArrays "));
        assert!(text.contains("class: \\BenchmarkConcat\n"));
        assert!(!text.contains("##teamcity"));

        let calls = runner.calls();
        assert_eq!(calls.len(), 5);
        assert_eq!(calls[0].argv[0], "/opt/kphp2cpp");
        assert!(calls[0].argv.last().unwrap().ends_with("main.php"));
        assert!(calls[1].argv[0].ends_with("/cli"));
        assert_eq!(calls[1].argv[1], "benchmarkPush");
        assert_eq!(calls[3].argv[1], "benchmarkImplode");
        assert_eq!(calls[4].argv[1], "benchmark_dot");
    }

    #[test]
    fn failed_build_skips_only_that_class() {
        let root = project();
        let runner = FakeRunner::new(vec![
            Reply::fail("main.php:3: syntax error"),
            Reply::ok(""),
            record("BenchmarkConcat::Implode"),
            record("BenchmarkConcat::dot"),
        ]);
        let mut req = request(root.path());
        req.teamcity = true;
        let mut out = Vec::new();
        let outcome = BenchUseCase::new(&runner).unwrap().execute(&req, &mut out).unwrap();
        assert_eq!(outcome.classes_ok, 1);
        assert_eq!(outcome.classes_failed, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("class: \\Acme\\BenchmarkArrays"), "{text}");
        assert!(text.contains("##teamcity[testSuiteStarted name='Arrays']"));
        assert!(text.contains("##teamcity[testSuiteFinished name='Arrays' duration='0']"));
        assert!(text.contains("##teamcity[testSuiteStarted name='Concat']"));
        assert!(text.contains("ok \\BenchmarkConcat "));
    }

    #[test]
    fn run_filter_limits_methods_and_rejects_empty_selection() {
        let root = project();
        let runner = FakeRunner::new(vec![Reply::ok(""), record("BenchmarkConcat::dot")]);
        let mut req = request(root.path());
        req.run_filter = "Concat::dot$".into();
        let mut out = Vec::new();
        let outcome = BenchUseCase::new(&runner).unwrap().execute(&req, &mut out).unwrap();
        assert_eq!(outcome.classes_ok, 1);
        assert_eq!(runner.calls().len(), 2);

        req.run_filter = "Nothing".into();
        let err = BenchUseCase::new(&FakeRunner::new(vec![]))
            .unwrap()
            .execute(&req, &mut Vec::new())
            .unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "generate bench main: selected benchmarks set contains no methods to run"
        );
    }

    #[test]
    fn php_backend_runs_driver_without_building() {
        let root = project();
        let runner = FakeRunner::new(vec![record("BenchmarkConcat::Implode"), record("BenchmarkConcat::dot")]);
        let mut req = request(root.path());
        req.target = root.path().join("bench/BenchmarkConcat.php");
        req.backend = BenchBackend::Php {
            command: "php".into(),
            jit: false,
        };
        let mut out = Vec::new();
        BenchUseCase::new(&runner).unwrap().execute(&req, &mut out).unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].argv[..2], ["php", "-f"]);
        assert_eq!(calls[0].argv.last().unwrap(), "benchmarkImplode");
    }

    #[test]
    fn run_failure_stops_the_class_but_not_the_suite() {
        let root = project();
        let runner = FakeRunner::new(vec![
            Reply::ok(""),
            Reply::fail("PHP Fatal error"),
            Reply::ok(""),
            record("BenchmarkConcat::Implode"),
            record("BenchmarkConcat::dot"),
        ]);
        let mut out = Vec::new();
        let outcome = BenchUseCase::new(&runner)
            .unwrap()
            .execute(&request(root.path()), &mut out)
            .unwrap();
        assert_eq!((outcome.classes_ok, outcome.classes_failed), (1, 1));
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("class: \\Acme\\BenchmarkArrays\n"));
        assert!(!text.contains("ok \\Acme\\BenchmarkArrays"));
    }

    #[test]
    fn missing_executable_skips_the_class() {
        let root = project();
        let runner = FakeRunner::new(vec![
            Reply::ok(""),
            Reply::spawn_error("No such file or directory"),
            Reply::ok(""),
            record("BenchmarkConcat::Implode"),
            record("BenchmarkConcat::dot"),
        ]);
        let mut out = Vec::new();
        let outcome = BenchUseCase::new(&runner)
            .unwrap()
            .execute(&request(root.path()), &mut out)
            .unwrap();
        assert_eq!((outcome.classes_ok, outcome.classes_failed), (1, 1));
        assert_eq!(runner.calls().len(), 5);
        let text = String::from_utf8(out).unwrap();
        assert!(!text.contains("ok \\Acme\\BenchmarkArrays"), "{text}");
        assert!(text.contains("BenchmarkConcat::dot\t1000\t12.0 ns/op\n"), "{text}");
        assert!(text.contains("ok \\BenchmarkConcat "), "{text}");
    }

    #[test]
    fn file_without_benchmark_class_is_fatal() {
        let root = project();
        fs::write(root.path().join("bench/BenchmarkEmpty.php"), "<?php\nfunction f() {}\n").unwrap();
        let err = BenchUseCase::new(&FakeRunner::new(vec![]))
            .unwrap()
            .execute(&request(root.path()), &mut Vec::new())
            .unwrap_err();
        assert_eq!(
            format!("{err:#}"),
            "parse bench files: BenchmarkEmpty.php: can't find a benchmark class inside a file"
        );
    }

    #[test]
    fn mismatched_file_name_skips_the_file() {
        let root = project();
        fs::write(
            root.path().join("bench/BenchmarkWrong.php"),
            "<?php\nclass BenchmarkRight {\n  public function benchmarkX() {}\n}\n",
        )
        .unwrap();
        let runner = FakeRunner::new(vec![
            Reply::ok(""),
            record("BenchmarkArrays::Push"),
            Reply::ok(""),
            record("BenchmarkConcat::Implode"),
            record("BenchmarkConcat::dot"),
        ]);
        let outcome = BenchUseCase::new(&runner)
            .unwrap()
            .execute(&request(root.path()), &mut Vec::new())
            .unwrap();
        assert_eq!(outcome.classes_ok, 2);
    }
}

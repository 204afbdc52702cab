//! A/B front-end: two benchmarks (or two benchmark files) compared against each other.

use crate::benchstat::render_comparison;
use ktest_adapters::{CommandSpec, run_watched};
use ktest_domain::{CompareOptions, SampleStore, rename_class_prefix, split_ab};
use ktest_render::RenderOptions;
use ktest_render::ansi::CLEAR_LINE;
use ktest_types::PHP_EXT;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Samples per side when the user does not override `--count`.
pub const AB_COUNT: &str = "10";

/// Runs a `ktest` subcommand and returns its stdout.
pub trait BenchLauncher {
    fn launch(&self, label: &str, args: &[String]) -> anyhow::Result<String>;
}

impl<L: BenchLauncher + ?Sized> BenchLauncher for &L {
    fn launch(&self, label: &str, args: &[String]) -> anyhow::Result<String> {
        (**self).launch(label, args)
    }
}

/// Re-executes the current binary, reporting sample progress on stderr.
#[derive(Debug, Clone)]
pub struct SelfExecLauncher {
    pub exe: PathBuf,
    pub interval: Duration,
}

impl SelfExecLauncher {
    pub fn current(interval: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            exe: std::env::current_exe()?,
            interval,
        })
    }
}

impl BenchLauncher for SelfExecLauncher {
    fn launch(&self, label: &str, args: &[String]) -> anyhow::Result<String> {
        let spec = CommandSpec::new(std::iter::once(self.exe.display().to_string()).chain(args.iter().cloned()));
        let mut stderr = std::io::stderr();
        let _ = write!(stderr, "{CLEAR_LINE}compiling {label} benchmarks...");
        let _ = stderr.flush();
        let run = run_watched(label, &spec, self.interval, &mut stderr);
        let _ = write!(stderr, "{CLEAR_LINE}");
        let _ = stderr.flush();
        Ok(String::from_utf8_lossy(&run?.stdout).into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct BenchAbRequest {
    pub old: String,
    pub new: String,
    /// Forwarded to `ktest bench` after the defaults, so they can override them.
    pub bench_args: Vec<String>,
    pub colorize: bool,
}

impl BenchAbRequest {
    /// Two `.php` files rather than two name patterns.
    pub fn is_file_mode(&self) -> bool {
        self.old.ends_with(PHP_EXT) && self.new.ends_with(PHP_EXT)
    }
}

pub struct BenchAbUseCase<L: BenchLauncher> {
    launcher: L,
}

impl<L: BenchLauncher> BenchAbUseCase<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    pub fn execute(&self, req: &BenchAbRequest) -> anyhow::Result<String> {
        if req.is_file_mode() {
            self.compare_files(req)
        } else {
            self.compare_patterns(req)
        }
    }

    fn compare_patterns(&self, req: &BenchAbRequest) -> anyhow::Result<String> {
        let mut args = strings(["bench", "--count", AB_COUNT, "--run"]);
        args.push(format!("(?:{})|(?:{})", req.old, req.new));
        args.extend(req.bench_args.iter().cloned());

        let output = self.launcher.launch(&format!("{} and {}", req.old, req.new), &args)?;
        let (old, new) = split_ab(&output, &req.old, &req.new)?;
        let render = RenderOptions {
            colorize: req.colorize,
            ..RenderOptions::default()
        };
        render_comparison(&[old, new], &CompareOptions::default(), &render)
    }

    fn compare_files(&self, req: &BenchAbRequest) -> anyhow::Result<String> {
        let old_key = file_key(&req.old);
        let new_key = file_key(&req.new);

        let run = |file: &str, key: &str| {
            let mut args = strings(["bench", "--count", AB_COUNT, "--benchmem"]);
            args.extend(req.bench_args.iter().cloned());
            args.push(file.to_string());
            self.launcher.launch(key, &args)
        };
        let old_output = run(&req.old, &old_key)?;
        let new_output = rename_class_prefix(&run(&req.new, &new_key)?, &old_key, &new_key);

        let mut old = SampleStore::new(&old_key);
        old.ingest(&old_output, &[]);
        let mut new = SampleStore::new(&new_key);
        new.ingest(&new_output, &[]);

        let compare = CompareOptions {
            geomean: true,
            ..CompareOptions::default()
        };
        let render = RenderOptions {
            colorize: req.colorize,
            old_label: old_key,
            new_label: new_key,
        };
        render_comparison(&[old, new], &compare, &render)
    }
}

/// Benchmark file name without directory and extension, which is also its class name.
fn file_key(file: &str) -> String {
    let name = Path::new(file)
        .file_name()
        .map_or_else(|| file.to_string(), |n| n.to_string_lossy().into_owned());
    name.strip_suffix(PHP_EXT).map_or_else(|| name.clone(), str::to_string)
}

pub(crate) fn strings<const N: usize>(items: [&str; N]) -> Vec<String> {
    items.into_iter().map(str::to_string).collect()
}


#[cfg(test)]
mod tests {
    use super::fake::FakeLauncher;
    use super::*;

    fn records(name: &str, values: &[f64]) -> String {
        values
            .iter()
            .map(|v| format!("{name}\t1000\t{v} ns/op\n"))
            .collect()
    }

    fn request(old: &str, new: &str) -> BenchAbRequest {
        BenchAbRequest {
            old: old.into(),
            new: new.into(),
            bench_args: vec!["bench/".into()],
            colorize: false,
        }
    }

    #[test]
    fn patterns_select_two_rows_of_one_run() {
        let output = format!(
            "class: \\BenchmarkStrings\n{}{}ok \\BenchmarkStrings 1.2s\n",
            records("BenchmarkStrings::implode", &[120.0, 121.0, 119.0, 122.0, 120.5]),
            records("BenchmarkStrings::concat", &[80.0, 81.0, 79.0, 82.0, 80.5]),
        );
        let launcher = FakeLauncher::new(vec![Ok(output)]);
        let out = BenchAbUseCase::new(&launcher)
            .execute(&request("implode", "concat"))
            .unwrap();
        assert!(out.contains("Strings::implode vs Strings::concat"), "{out}");
        assert!(out.contains("-33."), "{out}");

        let calls = launcher.calls.borrow();
        assert_eq!(calls[0].0, "implode and concat");
        assert_eq!(
            calls[0].1,
            ["bench", "--count", "10", "--run", "(?:implode)|(?:concat)", "bench/"]
        );
    }

    #[test]
    fn ambiguous_pattern_is_an_error() {
        let output = records("BenchmarkA::x", &[1.0]) + &records("BenchmarkA::xy", &[1.0]) + &records("BenchmarkA::z", &[1.0]);
        let launcher = FakeLauncher::new(vec![Ok(output)]);
        let err = BenchAbUseCase::new(&launcher).execute(&request("x", "z")).unwrap_err();
        assert!(err.to_string().contains("matched more than one benchmark"), "{err}");
    }

    #[test]
    fn files_are_run_separately_and_aligned_by_class() {
        let launcher = FakeLauncher::new(vec![
            Ok(records("BenchmarkOld::implode", &[100.0, 100.0, 100.0, 100.0, 100.0])),
            Ok(records("BenchmarkNew::implode", &[50.0, 50.0, 50.0, 50.0, 50.0])),
        ]);
        let out = BenchAbUseCase::new(&launcher)
            .execute(&request("bench/BenchmarkOld.php", "bench/BenchmarkNew.php"))
            .unwrap();
        assert!(out.starts_with("name"), "{out}");
        assert!(out.contains("BenchmarkOld time/op"), "{out}");
        assert!(out.contains("Old::implode"), "{out}");
        assert!(!out.contains("New::implode"), "{out}");

        let calls = launcher.calls.borrow();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].0, "BenchmarkNew");
        assert_eq!(
            calls[1].1,
            ["bench", "--count", "10", "--benchmem", "bench/", "bench/BenchmarkNew.php"]
        );
    }

    #[test]
    fn launcher_failure_propagates() {
        let launcher = FakeLauncher::new(vec![Err(anyhow::anyhow!("run x and y benchmarks: exit status: 1: boom"))]);
        let err = BenchAbUseCase::new(&launcher).execute(&request("x", "y")).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn file_keys_drop_directory_and_extension() {
        assert_eq!(file_key("a/b/BenchmarkFoo.php"), "BenchmarkFoo");
        assert_eq!(file_key("BenchmarkFoo.php"), "BenchmarkFoo");
    }

    #[test]
    fn file_mode_needs_two_php_files() {
        assert!(request("a.php", "b.php").is_file_mode());
        assert!(!request("a.php", "b").is_file_mode());
    }
}

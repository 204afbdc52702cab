//! BDD test runner using cucumber for the ktest CLI and comparison logic.
//!
//! Feature files live in `features/`.
//!
//! Step definitions cover:
//! - Given steps: result files and combined benchmark runs
//! - When steps: `ktest benchstat` execution and A/B splitting
//! - Then steps: exit code, output and comparison row assertions

use assert_cmd::Command;
use cucumber::{World, given, then, when};
use ktest_domain::{CompareOptions, compare, split_ab};
use ktest_types::{Classification, ComparisonTable};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

#[derive(Debug, Default, World)]
pub struct KtestWorld {
    temp_dir: Option<TempDir>,
    /// Benchmark output of one combined run, built line by line.
    combined_run: String,
    last_exit_code: Option<i32>,
    last_stdout: String,
    last_stderr: String,
    tables: Vec<ComparisonTable>,
    split_error: Option<String>,
    current_row: Option<String>,
}

impl KtestWorld {
    fn temp_path(&mut self) -> PathBuf {
        self.temp_dir
            .get_or_insert_with(|| TempDir::new().expect("Failed to create temp directory"))
            .path()
            .to_path_buf()
    }
}

fn records(name: &str, samples: &str) -> String {
    samples
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|v| format!("Benchmark{name}\t1000\t{v} ns/op\n"))
        .collect()
}

// ============================================================================
// GIVEN STEPS
// ============================================================================

#[given(expr = "a result file {string} with {string} samples {string}")]
async fn given_result_file(world: &mut KtestWorld, file: String, name: String, samples: String) {
    let path = world.temp_path().join(file);
    let text = format!("goos: linux\npkg: strings\n{}", records(&name, &samples));
    fs::write(path, text).expect("Failed to write result file");
}

#[given(expr = "a result file {string} with no records")]
async fn given_empty_result_file(world: &mut KtestWorld, file: String) {
    let path = world.temp_path().join(file);
    fs::write(path, "PASS\n").expect("Failed to write result file");
}

#[given(expr = "a combined run with {string} samples {string}")]
async fn given_combined_run(world: &mut KtestWorld, name: String, samples: String) {
    world.combined_run = records(&name, &samples);
}

#[given(expr = "the combined run has {string} samples {string}")]
async fn given_more_records(world: &mut KtestWorld, name: String, samples: String) {
    world.combined_run.push_str(&records(&name, &samples));
}

// ============================================================================
// WHEN STEPS
// ============================================================================

#[allow(deprecated)]
fn ktest_cmd() -> Command {
    Command::cargo_bin("ktest").expect("Failed to find ktest binary")
}

fn run_benchstat(world: &mut KtestWorld, files: &[String]) {
    let dir = world.temp_path();
    let mut cmd = ktest_cmd();
    cmd.env_remove("RUST_LOG")
        .arg("benchstat")
        .arg("--colorize=false")
        .args(files.iter().map(|f| dir.join(f)));
    let output = cmd.output().expect("Failed to execute ktest benchstat");
    world.last_exit_code = Some(output.status.code().unwrap_or(-1));
    world.last_stdout = String::from_utf8_lossy(&output.stdout).to_string();
    world.last_stderr = String::from_utf8_lossy(&output.stderr).to_string();
}

#[when(expr = "I run ktest benchstat on {string}")]
async fn when_benchstat_one(world: &mut KtestWorld, file: String) {
    run_benchstat(world, &[file]);
}

#[when(expr = "I run ktest benchstat on {string} and {string}")]
async fn when_benchstat_two(world: &mut KtestWorld, old: String, new: String) {
    run_benchstat(world, &[old, new]);
}

#[when(expr = "I split the run with old pattern {string} and new pattern {string}")]
async fn when_split(world: &mut KtestWorld, old: String, new: String) {
    match split_ab(&world.combined_run, &old, &new) {
        Ok((old, new)) => world.tables = compare(&[old, new], &CompareOptions::default()),
        Err(err) => world.split_error = Some(err.to_string()),
    }
}

// ============================================================================
// THEN STEPS
// ============================================================================

#[then(expr = "the exit code should be {int}")]
async fn then_exit_code(world: &mut KtestWorld, code: i32) {
    assert_eq!(
        world.last_exit_code,
        Some(code),
        "stdout:\n{}\nstderr:\n{}",
        world.last_stdout,
        world.last_stderr
    );
}

#[then(expr = "stdout should contain {string}")]
async fn then_stdout_contains(world: &mut KtestWorld, text: String) {
    assert!(
        world.last_stdout.contains(&text),
        "expected stdout to contain {text:?}, got:\n{}",
        world.last_stdout
    );
}

#[then(expr = "stderr should contain {string}")]
async fn then_stderr_contains(world: &mut KtestWorld, text: String) {
    assert!(
        world.last_stderr.contains(&text),
        "expected stderr to contain {text:?}, got:\n{}",
        world.last_stderr
    );
}

#[then(expr = "the comparison has a row {string}")]
async fn then_has_row(world: &mut KtestWorld, name: String) {
    let found = world
        .tables
        .iter()
        .flat_map(|t| &t.rows)
        .any(|r| r.benchmark == name);
    assert!(found, "no row {name:?} in {:?}", world.tables);
    world.current_row = Some(name);
}

#[then("that row is an improvement")]
async fn then_row_improves(world: &mut KtestWorld) {
    let name = world.current_row.clone().expect("No row selected");
    let row = world
        .tables
        .iter()
        .flat_map(|t| &t.rows)
        .find(|r| r.benchmark == name)
        .expect("Row disappeared");
    assert_eq!(row.classification, Classification::Improvement);
}

#[then(expr = "the split fails with {string}")]
async fn then_split_fails(world: &mut KtestWorld, text: String) {
    let err = world.split_error.clone().expect("Split did not fail");
    assert!(err.contains(&text), "{err}");
}

#[tokio::main]
async fn main() {
    KtestWorld::run("features/").await;
}

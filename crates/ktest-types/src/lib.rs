//! Shared types for ktest.
//!
//! Design goal: plain data, no behavior beyond parsing option strings.
//! Everything here is produced by one layer and consumed by another: samples flow from the
//! benchmark text ingester into the comparator, units flow from the extractor into the
//! driver generator, and reports flow from the test pipeline into the formatter.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const BENCH_CLASS_PREFIX: &str = "Benchmark";
pub const BENCH_METHOD_PREFIX: &str = "benchmark";
pub const TEST_CLASS_SUFFIX: &str = "Test";
pub const TEST_METHOD_PREFIX: &str = "test";
pub const PHP_EXT: &str = ".php";

/// Display name of the synthesized aggregate row.
pub const GEOMEAN_ROW: &str = "[Geo mean]";

/// Rows backed by fewer retained samples than this get an advisory warning.
pub const MIN_RECOMMENDED_SAMPLES: usize = 5;

/// Any retained sample below this value disables the geomean row for its unit.
pub const GEOMEAN_EPSILON: f64 = 0.01;

pub const CONFIG_FILE_NAME: &str = "ktest.toml";

// ----------------------------------------------------------------------------
// Samples
// ----------------------------------------------------------------------------

/// Identifies one [`MetricSeries`] inside a sample store.
///
/// `group` is the rendered split-label combination (`"goos:linux pkg:foo"`), empty when
/// no split label is present.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesKey {
    pub group: String,
    pub benchmark: String,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSeries {
    pub key: SeriesKey,

    /// Configuration labels in effect when the first sample was recorded.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    pub samples: Vec<f64>,
}

/// Summary statistics of one side of a comparison row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub unit: String,

    /// Raw samples as ingested.
    pub values: Vec<f64>,

    /// Samples left after outlier rejection; mean/min/max and the tests use these.
    pub retained: Vec<f64>,

    pub min: f64,
    pub mean: f64,
    pub max: f64,
}

// ----------------------------------------------------------------------------
// Comparison options
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionError {
    #[error("invalid delta-test argument {0:?}: expected none, u-test or t-test")]
    DeltaTest(String),

    #[error("invalid sort argument {0:?}: expected [-]delta, [-]name or none")]
    Sort(String),

    #[error("invalid colorize argument {0:?}: expected auto, true or false")]
    Colorize(String),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeltaTest {
    None,
    #[default]
    UTest,
    TTest,
}

impl FromStr for DeltaTest {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(DeltaTest::None),
            "u" | "u-test" | "utest" => Ok(DeltaTest::UTest),
            "t" | "t-test" | "ttest" => Ok(DeltaTest::TTest),
            _ => Err(OptionError::DeltaTest(s.to_string())),
        }
    }
}

impl fmt::Display for DeltaTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DeltaTest::None => "none",
            DeltaTest::UTest => "u-test",
            DeltaTest::TTest => "t-test",
        })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    Name,
    Delta,
}

/// Row order inside a table. `key: None` keeps first-seen order.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RowOrder {
    pub key: Option<SortKey>,
    pub reverse: bool,
}

impl FromStr for RowOrder {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (reverse, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let key = match name {
            "none" if !reverse => None,
            "name" => Some(SortKey::Name),
            "delta" => Some(SortKey::Delta),
            _ => return Err(OptionError::Sort(s.to_string())),
        };
        Ok(RowOrder { key, reverse })
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// `Auto` resolves to the caller's terminal probe.
    pub fn resolve(self, is_terminal: bool) -> bool {
        match self {
            ColorMode::Auto => is_terminal,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

impl FromStr for ColorMode {
    type Err = OptionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(ColorMode::Auto),
            "true" | "on" | "always" | "1" => Ok(ColorMode::Always),
            "false" | "off" | "never" | "0" => Ok(ColorMode::Never),
            _ => Err(OptionError::Colorize(s.to_string())),
        }
    }
}

// ----------------------------------------------------------------------------
// Comparison results
// ----------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    NotSignificant,
    Regression,
    Improvement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRow {
    pub benchmark: String,

    /// One entry per configuration, `None` when that configuration lacks the benchmark.
    pub metrics: Vec<Option<MetricSummary>>,

    /// `(new/old - 1) * 100`; `None` when there is no pair to compare or a mean is zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pct_delta: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub p_value: Option<f64>,

    #[serde(default)]
    pub note: String,

    pub classification: Classification,

    #[serde(default)]
    pub geomean: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonTable {
    /// Unit as it appears in the input (`ns/op`).
    pub unit: String,

    /// Display metric (`time/op`).
    pub metric: String,

    #[serde(default)]
    pub group: String,

    pub configs: Vec<String>,
    pub rows: Vec<ComparisonRow>,
}

impl ComparisonTable {
    pub fn has_delta(&self) -> bool {
        self.configs.len() == 2
    }
}

// ----------------------------------------------------------------------------
// Discovered units
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchMethod {
    /// PHP method name (`benchmark_concat`).
    pub name: String,

    /// Display key (`concat`).
    pub key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkUnit {
    pub class_name: String,

    /// Leading-backslash form (`\Acme\BenchmarkFoo`).
    pub class_fqn: String,

    pub methods: Vec<BenchMethod>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestUnit {
    pub class_name: String,
    pub class_fqn: String,
    pub methods: Vec<String>,
    pub has_setup_before_class: bool,
    pub has_teardown_after_class: bool,
    pub edits: Vec<TextEdit>,
}

/// Replace `start..end` of the original bytes with `replacement`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextEdit {
    pub start: usize,
    pub end: usize,
    pub replacement: String,
}

impl TextEdit {
    pub fn new(start: usize, end: usize, replacement: impl Into<String>) -> Self {
        Self {
            start,
            end,
            replacement: replacement.into(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Class ends with the benchmark marker instead of starting with it.
    MisplacedMarker,

    /// The class name does not match the file name; the compiler cannot autoload it.
    FileNameMismatch,

    /// A second qualifying class in one file; only the first one is used.
    ExtraClass,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionIssue {
    pub kind: IssueKind,
    pub message: String,
}

impl ExtractionIssue {
    pub fn blocks_build(&self) -> bool {
        matches!(self.kind, IssueKind::FileNameMismatch)
    }
}

// ----------------------------------------------------------------------------
// Test reports
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    /// `Class::testMethod`
    pub name: String,
    pub reason: String,
    #[serde(default)]
    pub message: String,
    pub file: PathBuf,
    pub line: u32,
}

/// What one file's event stream contributed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub tests: usize,
    pub assertions: usize,
    pub failures: Vec<TestFailure>,
    pub finished: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub tests: usize,
    pub assertions: usize,
    pub failures: Vec<TestFailure>,
    pub elapsed: Duration,
}

impl ExecutionReport {
    pub fn absorb(&mut self, summary: EventSummary) {
        self.tests += summary.tests;
        self.assertions += summary.assertions;
        self.failures.extend(summary.failures);
    }
}

// ----------------------------------------------------------------------------
// Config file
// ----------------------------------------------------------------------------

/// `ktest.toml` in the project root. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub kphp: KphpConfig,
    pub php: PhpConfig,
    pub bench: BenchConfig,
    pub phpunit: PhpunitConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KphpConfig {
    pub binary: Option<PathBuf>,
    pub include_dirs: Vec<String>,
    pub disable_autoload: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhpConfig {
    pub binary: Option<String>,
    pub preload: Option<PathBuf>,
    pub jit: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BenchConfig {
    pub count: Option<u32>,
    pub benchmem: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PhpunitConfig {
    pub src_dir: Option<PathBuf>,
}

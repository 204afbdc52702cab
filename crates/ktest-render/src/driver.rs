//! Driver programs for benchmark and test units.
//!
//! A benchmark driver dispatches on `$argv[1]` to one timed harness per method and
//! writes `Class::key\titerations\tN.0 ns/op[\tB B/op\tA allocs/op]` records to stderr.
//! A test driver runs every test method in order and writes the JSON event stream
//! to stdout.

use crate::RenderError;
use handlebars::Handlebars;
use ktest_types::{BenchmarkUnit, TestUnit};
use serde::Serialize;

const BENCH_TEMPLATE: &str = include_str!("templates/bench_main.php.hbs");
const TEST_TEMPLATE: &str = include_str!("templates/test_main.php.hbs");

pub const MIN_TRIES: u64 = 20;
pub const ITERATIONS_RATE: u64 = 100_000_000;
pub const UNROLL: usize = 20;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchDriverOptions {
    pub count: u32,
    pub benchmem: bool,
    pub teamcity: bool,
    pub profiling: bool,
    /// Composer autoloader to require before the benchmark file.
    pub bootstrap: Option<String>,
    /// Hide the autoloader from the compiler (`#ifndef KPHP`).
    pub only_php_autoload: bool,
    /// Absolute path of the benchmark source file.
    pub bench_file: String,
}

#[derive(Serialize)]
struct BenchView<'a> {
    bootstrap: Option<&'a str>,
    only_php_autoload: bool,
    bench_file: &'a str,
    bench_qn: String,
    teamcity: bool,
    count: u32,
    methods: Vec<MethodView<'a>>,
}

#[derive(Serialize)]
struct MethodView<'a> {
    name: &'a str,
    key: &'a str,
    class_name: &'a str,
    class_fqn: &'a str,
    profiling: bool,
    benchmem: bool,
    min_tries: u64,
    iterations_rate: u64,
    unroll: Vec<&'a str>,
    unroll_len: usize,
}

#[derive(Serialize)]
struct TestView<'a> {
    test_file: &'a str,
    class_fqn: &'a str,
    methods: &'a [String],
    setup_before_class: bool,
    teardown_after_class: bool,
}

pub struct DriverGenerator {
    registry: Handlebars<'static>,
}

impl DriverGenerator {
    pub fn new() -> Result<Self, RenderError> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string("bench_main", BENCH_TEMPLATE)
            .map_err(|e| RenderError::Template(Box::new(e)))?;
        registry
            .register_template_string("test_main", TEST_TEMPLATE)
            .map_err(|e| RenderError::Template(Box::new(e)))?;
        Ok(Self { registry })
    }

    /// Driver for the selected methods of `unit`; an empty selection is an error.
    pub fn bench(&self, unit: &BenchmarkUnit, opts: &BenchDriverOptions) -> Result<String, RenderError> {
        if unit.methods.is_empty() {
            return Err(RenderError::NoMethods(unit.class_fqn.clone()));
        }
        let methods = unit
            .methods
            .iter()
            .map(|m| MethodView {
                name: &m.name,
                key: &m.key,
                class_name: &unit.class_name,
                class_fqn: &unit.class_fqn,
                profiling: opts.profiling,
                benchmem: opts.benchmem,
                min_tries: MIN_TRIES,
                iterations_rate: ITERATIONS_RATE,
                unroll: vec![m.name.as_str(); UNROLL],
                unroll_len: UNROLL,
            })
            .collect();
        let view = BenchView {
            bootstrap: opts.bootstrap.as_deref(),
            only_php_autoload: opts.only_php_autoload,
            bench_file: &opts.bench_file,
            bench_qn: format!("php_qn://{}::{}::", opts.bench_file, unit.class_fqn),
            teamcity: opts.teamcity,
            count: opts.count,
            methods,
        };
        Ok(self.registry.render("bench_main", &view)?)
    }

    /// Driver that requires the rewritten test file at `test_file`.
    pub fn test(&self, unit: &TestUnit, test_file: &str) -> Result<String, RenderError> {
        let view = TestView {
            test_file,
            class_fqn: &unit.class_fqn,
            methods: &unit.methods,
            setup_before_class: unit.has_setup_before_class,
            teardown_after_class: unit.has_teardown_after_class,
        };
        Ok(self.registry.render("test_main", &view)?)
    }
}

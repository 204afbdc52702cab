//! TeamCity service messages for IDE integration.

use ktest_types::BENCH_CLASS_PREFIX;
use std::time::Duration;

/// Escape a value for use inside `'...'` of a service message.
pub fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '|' => out.push_str("||"),
            '\'' => out.push_str("|'"),
            '[' => out.push_str("|["),
            ']' => out.push_str("|]"),
            '\n' => out.push_str("|n"),
            '\r' => out.push_str("|r"),
            _ => out.push(c),
        }
    }
    out
}

/// Suite name of a benchmark class: the last name segment without its `Benchmark` prefix.
pub fn suite_name(class_fqn: &str) -> &str {
    let short = class_fqn.rsplit('\\').next().unwrap_or(class_fqn);
    short.strip_prefix(BENCH_CLASS_PREFIX).unwrap_or(short)
}

pub fn suite_started(name: &str) -> String {
    format!("##teamcity[testSuiteStarted name='{}']", escape(name))
}

pub fn suite_finished(name: &str, duration: Duration) -> String {
    format!(
        "##teamcity[testSuiteFinished name='{}' duration='{}']",
        escape(name),
        duration.as_millis()
    )
}

//! Final report of a test run, in the PHPUnit text layout.

use ktest_types::ExecutionReport;
use std::fmt::Write as _;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReportOptions {
    /// Emit the `Time:` line.
    pub print_time: bool,
    /// Print only the file name of each failure location.
    pub short_location: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            print_time: true,
            short_location: false,
        }
    }
}

pub fn format_report(report: &ExecutionReport, opts: &ReportOptions) -> String {
    let mut out = String::new();

    if opts.print_time {
        let _ = write!(out, "\nTime: {}\n\n", format_elapsed(report.elapsed));
    } else {
        out.push('\n');
    }

    match report.failures.len() {
        0 => {}
        1 => out.push_str("There was 1 failure:\n\n"),
        n => {
            let _ = write!(out, "There were {n} failures:\n\n");
        }
    }

    for (i, failure) in report.failures.iter().enumerate() {
        let _ = writeln!(out, "{}) {}", i + 1, failure.name);
        if !failure.message.is_empty() {
            let _ = writeln!(out, "{}", failure.message);
        }
        let _ = write!(out, "{}.\n\n", failure.reason);
        let location = if opts.short_location {
            failure
                .file
                .file_name()
                .map_or_else(|| failure.file.display().to_string(), |n| n.to_string_lossy().into_owned())
        } else {
            failure.file.display().to_string()
        };
        let _ = write!(out, "{location}:{}\n\n", failure.line);
    }

    if report.failures.is_empty() {
        let _ = writeln!(out, "OK ({} tests, {} assertions)", report.tests, report.assertions);
    } else {
        let _ = writeln!(
            out,
            "FAILURES!\nTests: {}, Assertions: {}, Failures: {}.",
            report.tests,
            report.assertions,
            report.failures.len()
        );
    }
    out
}

/// Millisecond precision is enough for a whole test run.
fn format_elapsed(elapsed: Duration) -> String {
    let millis = Duration::from_millis(elapsed.as_millis() as u64);
    if millis.is_zero() {
        return "0ms".to_string();
    }
    humantime::format_duration(millis).to_string()
}

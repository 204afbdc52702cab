//! Domain logic for ktest.
//!
//! This crate contains the pure parts of the harness: benchmark sample ingestion and
//! comparison, unit extraction from parsed PHP files, source rewriting and the test
//! event stream parser. Nothing here touches the filesystem or spawns processes.

mod ab;
mod compare;
mod edits;
mod events;
mod extract;
mod samples;

pub use ab::{rename_class_prefix, split_ab};
pub use compare::{
    CompareOptions, compare, is_within_noise, metric_name, noise_band, sample_warnings,
};
pub use edits::apply_text_edits;
pub use events::parse_event_stream;
pub use extract::{
    BenchExtraction, extract_benchmark, extract_test, method_key, select_methods,
};
pub use samples::{
    BenchRecord, SampleStore, display_name, group_label, parse_bench_line, parse_label_line,
};

#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("no samples to compare")]
    NoSamples,

    #[error("{pattern} regexp matched more than one benchmark: {first} and {second}")]
    AmbiguousPattern {
        pattern: String,
        first: String,
        second: String,
    },

    #[error("{0} regexp matched no benchmarks")]
    NoMatch(String),

    #[error("old/new regexp both matched {0}")]
    SameBenchmark(String),

    #[error("invalid run pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("selected benchmarks set contains no methods to run")]
    NothingSelected,

    #[error("{file}: can't find a benchmark class inside a file")]
    NoBenchmarkClass { file: String },

    #[error("output line {line}: {text}: {reason}")]
    EventStream {
        line: usize,
        text: String,
        reason: String,
    },
}

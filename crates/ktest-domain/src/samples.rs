//! In-memory sample tables fed by benchmark result text.
//!
//! The text format is line oriented: `key: value` lines set configuration labels for
//! every record that follows, and `Benchmark...` lines carry one record each:
//!
//! ```text
//! class: \Acme\BenchmarkConcat
//! BenchmarkConcat::implode	2000000	512.0 ns/op	96 B/op	2 allocs/op
//! ```

use ktest_types::{BENCH_CLASS_PREFIX, MetricSeries, SeriesKey};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq)]
pub struct BenchRecord {
    /// Name as written, including the `Benchmark` prefix.
    pub name: String,
    pub iterations: u64,
    /// `(value, unit)` pairs in line order.
    pub measurements: Vec<(f64, String)>,
}

impl BenchRecord {
    pub fn display_name(&self) -> &str {
        display_name(&self.name)
    }
}

pub fn display_name(name: &str) -> &str {
    name.strip_prefix(BENCH_CLASS_PREFIX).unwrap_or(name)
}

fn is_bench_name(name: &str) -> bool {
    name.strip_prefix(BENCH_CLASS_PREFIX)
        .is_some_and(|rest| !rest.starts_with(|c: char| c.is_ascii_lowercase()))
}

pub fn parse_bench_line(line: &str) -> Option<BenchRecord> {
    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    if !is_bench_name(name) {
        return None;
    }
    let iterations = fields.next()?.parse::<u64>().ok()?;
    let rest: Vec<&str> = fields.collect();
    let mut measurements = Vec::new();
    for pair in rest.chunks(2) {
        let [value, unit] = pair else {
            break;
        };
        let Ok(value) = value.parse::<f64>() else {
            break;
        };
        measurements.push((value, unit.to_string()));
    }
    if measurements.is_empty() {
        return None;
    }
    Some(BenchRecord {
        name: name.to_string(),
        iterations,
        measurements,
    })
}

/// `key: value` where key starts with a lowercase letter and has no spaces.
pub fn parse_label_line(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(':')?;
    let first = key.chars().next()?;
    if !first.is_ascii_lowercase() || key.contains(char::is_whitespace) {
        return None;
    }
    if !(value.is_empty() || value.starts_with(char::is_whitespace)) {
        return None;
    }
    Some((key, value.trim()))
}

/// Benchmark measurements of one configuration, keyed by (group, benchmark, unit).
///
/// Series keep first-seen order; the comparator relies on it for stable row order.
#[derive(Debug, Clone, Default)]
pub struct SampleStore {
    name: String,
    series: Vec<MetricSeries>,
    index: HashMap<SeriesKey, usize>,
}

impl SampleStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn series(&self) -> &[MetricSeries] {
        &self.series
    }

    pub fn get(&self, key: &SeriesKey) -> Option<&MetricSeries> {
        self.index.get(key).map(|&i| &self.series[i])
    }

    pub fn record(&mut self, key: SeriesKey, labels: &BTreeMap<String, String>, value: f64) {
        if let Some(&i) = self.index.get(&key) {
            self.series[i].samples.push(value);
            return;
        }
        self.index.insert(key.clone(), self.series.len());
        self.series.push(MetricSeries {
            key,
            labels: labels.clone(),
            samples: vec![value],
        });
    }

    /// Record every measurement of one parsed line.
    pub fn record_line(&mut self, record: &BenchRecord, group: &str, labels: &BTreeMap<String, String>) {
        for (value, unit) in &record.measurements {
            let key = SeriesKey {
                group: group.to_string(),
                benchmark: record.display_name().to_string(),
                unit: unit.clone(),
            };
            self.record(key, labels, *value);
        }
    }

    /// Ingest result text; returns the number of benchmark records read.
    pub fn ingest(&mut self, text: &str, split_by: &[String]) -> usize {
        let mut labels = BTreeMap::new();
        let mut records = 0;
        for line in text.lines() {
            let line = line.trim();
            if let Some(record) = parse_bench_line(line) {
                let group = group_label(&labels, split_by);
                self.record_line(&record, &group, &labels);
                records += 1;
            } else if let Some((key, value)) = parse_label_line(line) {
                labels.insert(key.to_string(), value.to_string());
            }
        }
        records
    }
}

/// `"goos:linux pkg:foo"` for the split keys present in `labels`, in `split_by` order.
pub fn group_label(labels: &BTreeMap<String, String>, split_by: &[String]) -> String {
    split_by
        .iter()
        .filter_map(|k| labels.get(k).map(|v| format!("{k}:{v}")))
        .collect::<Vec<_>>()
        .join(" ")
}

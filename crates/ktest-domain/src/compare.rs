//! Statistical comparison of sample stores.
//!
//! Every store is one configuration (a column). Rows are benchmarks, tables are
//! `(unit, group)` pairs. With exactly two stores each row gets a percent delta, a
//! significance note and a classification.

use crate::samples::SampleStore;
use ktest_types::{
    Classification, ComparisonRow, ComparisonTable, DeltaTest, GEOMEAN_EPSILON, GEOMEAN_ROW,
    MIN_RECOMMENDED_SAMPLES, MetricSummary, RowOrder, SeriesKey, SortKey,
};
use std::collections::HashSet;

/// Means below this are in the timer-resolution regime (nanoseconds).
const TINY_VALUE_THRESHOLD: f64 = 32.0;

#[derive(Debug, Clone, PartialEq)]
pub struct CompareOptions {
    pub delta_test: DeltaTest,
    pub alpha: f64,
    pub geomean: bool,
    pub order: RowOrder,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            delta_test: DeltaTest::UTest,
            alpha: 0.05,
            geomean: false,
            order: RowOrder::default(),
        }
    }
}

/// Display metric for an input unit.
pub fn metric_name(unit: &str) -> String {
    match unit {
        "ns/op" => "time/op".to_string(),
        "B/op" => "alloc/op".to_string(),
        "MB/s" => "speed".to_string(),
        other => other.to_string(),
    }
}

pub fn compare(stores: &[SampleStore], opts: &CompareOptions) -> Vec<ComparisonTable> {
    let configs: Vec<String> = stores.iter().map(|s| s.name().to_string()).collect();

    let mut units: Vec<&str> = Vec::new();
    let mut groups: Vec<&str> = Vec::new();
    let mut benchmarks: Vec<(&str, &str, &str)> = Vec::new();
    let mut seen = HashSet::new();
    for series in stores.iter().flat_map(|s| s.series()) {
        let key = &series.key;
        if !units.contains(&key.unit.as_str()) {
            units.push(&key.unit);
        }
        if !groups.contains(&key.group.as_str()) {
            groups.push(&key.group);
        }
        if seen.insert(key) {
            benchmarks.push((&key.unit, &key.group, &key.benchmark));
        }
    }

    let mut tables = Vec::new();
    for unit in &units {
        for group in &groups {
            let mut rows: Vec<ComparisonRow> = benchmarks
                .iter()
                .filter(|(u, g, _)| u == unit && g == group)
                .filter_map(|(_, _, bench)| {
                    let key = SeriesKey {
                        group: group.to_string(),
                        benchmark: bench.to_string(),
                        unit: unit.to_string(),
                    };
                    build_row(stores, &key, opts)
                })
                .collect();
            if rows.is_empty() {
                continue;
            }
            sort_rows(&mut rows, opts.order);
            tables.push(ComparisonTable {
                unit: unit.to_string(),
                metric: metric_name(unit),
                group: group.to_string(),
                configs: configs.clone(),
                rows,
            });
        }
    }

    if opts.geomean {
        let untrusted = untrusted_geomean_units(&tables);
        for table in &mut tables {
            if untrusted.contains(&table.unit) {
                continue;
            }
            if let Some(row) = geomean_row(&table.unit, &table.rows) {
                table.rows.push(row);
            }
        }
    }
    tables
}

/// Units where a displayed row has a raw sample too small to trust in a geometric mean.
fn untrusted_geomean_units(tables: &[ComparisonTable]) -> HashSet<String> {
    tables
        .iter()
        .filter(|table| {
            table
                .rows
                .iter()
                .flat_map(|row| row.metrics.iter().flatten())
                .any(|m| m.values.iter().any(|v| *v < GEOMEAN_EPSILON))
        })
        .map(|table| table.unit.clone())
        .collect()
}

fn build_row(stores: &[SampleStore], key: &SeriesKey, opts: &CompareOptions) -> Option<ComparisonRow> {
    let metrics: Vec<Option<MetricSummary>> = stores
        .iter()
        .map(|store| {
            store
                .get(key)
                .and_then(|series| ktest_stats::summarize(&key.unit, &series.samples).ok())
        })
        .collect();

    if metrics.iter().all(Option::is_none) {
        return None;
    }

    let mut row = ComparisonRow {
        benchmark: key.benchmark.clone(),
        metrics,
        pct_delta: None,
        p_value: None,
        note: String::new(),
        classification: Classification::NotSignificant,
        geomean: false,
    };

    if let [old, new] = row.metrics.as_slice() {
        let (Some(old), Some(new)) = (old, new) else {
            return None;
        };
        row.pct_delta = pct_delta(old.mean, new.mean);
        let significant = match ktest_significance::p_value(opts.delta_test, &old.retained, &new.retained) {
            Ok(Some(p)) => {
                row.p_value = Some(p);
                row.note = format!("(p={p:.3} n={}+{})", old.retained.len(), new.retained.len());
                p < opts.alpha
            }
            Ok(None) => true,
            Err(err) => {
                row.note = format!("({err})");
                false
            }
        };
        if significant {
            row.classification = classify_by_sign(row.pct_delta);
        }
    }
    Some(row)
}

fn pct_delta(old: f64, new: f64) -> Option<f64> {
    if old == 0.0 || new == 0.0 {
        return None;
    }
    Some((new / old - 1.0) * 100.0)
}

/// A delta that prints as `+0.00`/`-0.00` is rounding noise, not a signal.
fn classify_by_sign(pct: Option<f64>) -> Classification {
    let Some(pct) = pct else {
        return Classification::NotSignificant;
    };
    let shown = format!("{pct:+.2}");
    if shown == "+0.00" || shown == "-0.00" {
        Classification::NotSignificant
    } else if pct > 0.0 {
        Classification::Regression
    } else {
        Classification::Improvement
    }
}

fn sort_rows(rows: &mut [ComparisonRow], order: RowOrder) {
    let Some(key) = order.key else {
        return;
    };
    rows.sort_by(|a, b| {
        let ord = match key {
            SortKey::Name => a.benchmark.cmp(&b.benchmark),
            SortKey::Delta => abs_delta(a).total_cmp(&abs_delta(b)),
        };
        if order.reverse { ord.reverse() } else { ord }
    });
}

fn abs_delta(row: &ComparisonRow) -> f64 {
    row.pct_delta.map_or(0.0, f64::abs)
}

fn geomean_row(unit: &str, rows: &[ComparisonRow]) -> Option<ComparisonRow> {
    let columns = rows.first()?.metrics.len();
    let mut metrics = Vec::with_capacity(columns);
    for col in 0..columns {
        let means: Vec<f64> = rows
            .iter()
            .filter_map(|row| row.metrics[col].as_ref())
            .map(|m| m.mean)
            .filter(|mean| *mean != 0.0)
            .collect();
        if means.len() < 2 {
            return None;
        }
        let g = ktest_stats::geomean(&means)?;
        metrics.push(Some(MetricSummary {
            unit: unit.to_string(),
            values: Vec::new(),
            retained: Vec::new(),
            min: g,
            mean: g,
            max: g,
        }));
    }

    let delta = match metrics.as_slice() {
        [Some(old), Some(new)] => pct_delta(old.mean, new.mean),
        _ => None,
    };
    Some(ComparisonRow {
        benchmark: GEOMEAN_ROW.to_string(),
        metrics,
        pct_delta: delta,
        p_value: None,
        note: String::new(),
        classification: classify_by_sign(delta),
        geomean: true,
    })
}

/// One advisory line per under-sampled benchmark, in table order.
pub fn sample_warnings(tables: &[ComparisonTable]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for row in tables.iter().flat_map(|t| &t.rows) {
        if row.geomean {
            continue;
        }
        let under = row
            .metrics
            .iter()
            .flatten()
            .any(|m| m.retained.len() < MIN_RECOMMENDED_SAMPLES);
        if under && seen.insert(row.benchmark.as_str()) {
            out.push(format!(
                "{} needs more samples, re-run with --count={MIN_RECOMMENDED_SAMPLES} or higher?",
                row.benchmark
            ));
        }
    }
    out
}

/// Percent band inside which a delta is treated as noise when colorizing.
///
/// The band grows with the relative spread of every side and doubles when all means
/// are below the timer-resolution threshold.
pub fn noise_band(row: &ComparisonRow) -> f64 {
    let sides: Vec<&MetricSummary> = row.metrics.iter().flatten().collect();
    let mut band: f64 = sides
        .iter()
        .filter(|m| m.max != m.min)
        .map(|m| 100.0 * ktest_stats::relative_spread(m))
        .sum();
    if sides.iter().all(|m| m.mean < TINY_VALUE_THRESHOLD) {
        band *= 2.0;
    }
    band + 1.0
}

pub fn is_within_noise(row: &ComparisonRow) -> bool {
    row.pct_delta.map_or(0.0, f64::abs) < noise_band(row)
}

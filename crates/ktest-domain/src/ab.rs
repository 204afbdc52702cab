//! A/B splitting of benchmark output.

use crate::DomainError;
use crate::samples::{BenchRecord, SampleStore, display_name, parse_bench_line};
use regex::Regex;
use std::collections::BTreeMap;

fn compile(pattern: &str) -> Result<Regex, DomainError> {
    Regex::new(pattern).map_err(|source| DomainError::Pattern {
        pattern: pattern.to_string(),
        source,
    })
}

/// Split one combined run into an "old" and a "new" store.
///
/// Each pattern must select exactly one benchmark. Both sides are recorded under the
/// shared row name `"<old> vs <new>"` so the comparator pairs them.
pub fn split_ab(
    output: &str,
    old_pattern: &str,
    new_pattern: &str,
) -> Result<(SampleStore, SampleStore), DomainError> {
    let old_re = compile(old_pattern)?;
    let new_re = compile(new_pattern)?;

    let mut old_name: Option<String> = None;
    let mut new_name: Option<String> = None;
    let mut old_records: Vec<BenchRecord> = Vec::new();
    let mut new_records: Vec<BenchRecord> = Vec::new();

    for line in output.lines() {
        let Some(record) = parse_bench_line(line.trim()) else {
            continue;
        };
        for (re, pattern, name, records) in [
            (&old_re, old_pattern, &mut old_name, &mut old_records),
            (&new_re, new_pattern, &mut new_name, &mut new_records),
        ] {
            if !re.is_match(&record.name) {
                continue;
            }
            match name {
                Some(first) if *first != record.name => {
                    return Err(DomainError::AmbiguousPattern {
                        pattern: pattern.to_string(),
                        first: first.clone(),
                        second: record.name.clone(),
                    });
                }
                Some(_) => {}
                None => *name = Some(record.name.clone()),
            }
            records.push(record.clone());
        }
    }

    let old_name = old_name.ok_or_else(|| DomainError::NoMatch(old_pattern.to_string()))?;
    let new_name = new_name.ok_or_else(|| DomainError::NoMatch(new_pattern.to_string()))?;
    if old_name == new_name {
        return Err(DomainError::SameBenchmark(old_name));
    }

    let row = format!("{} vs {}", display_name(&old_name), display_name(&new_name));
    let labels = BTreeMap::new();
    let mut old = SampleStore::new("old");
    let mut new = SampleStore::new("new");
    for (store, records) in [(&mut old, old_records), (&mut new, new_records)] {
        for mut record in records {
            record.name = row.clone();
            store.record_line(&record, "", &labels);
        }
    }
    Ok((old, new))
}

/// Rewrite `NewClass::` record prefixes to `OldClass::` so two benchmark files with the
/// same method names line up row by row.
pub fn rename_class_prefix(output: &str, old_class: &str, new_class: &str) -> String {
    output.replace(&format!("{new_class}::"), &format!("{old_class}::"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ktest_types::SeriesKey;

    const RUN: &str = "class: \\BenchmarkStrings\n\
        BenchmarkStrings::implode\t1000\t120.0 ns/op\n\
        BenchmarkStrings::concat\t1000\t80.0 ns/op\n\
        BenchmarkStrings::implode\t1000\t121.0 ns/op\n\
        BenchmarkStrings::concat\t1000\t81.0 ns/op\n\
        ok \\BenchmarkStrings 1.2s\n";

    #[test]
    fn splits_two_benchmarks_into_one_shared_row() {
        let (old, new) = split_ab(RUN, "implode", "concat").unwrap();
        let key = SeriesKey {
            group: String::new(),
            benchmark: "Strings::implode vs Strings::concat".into(),
            unit: "ns/op".into(),
        };
        assert_eq!(old.get(&key).unwrap().samples, vec![120.0, 121.0]);
        assert_eq!(new.get(&key).unwrap().samples, vec![80.0, 81.0]);
        assert_eq!(old.name(), "old");
    }

    #[test]
    fn pattern_matching_two_benchmarks_is_ambiguous() {
        let err = split_ab(RUN, "Strings", "concat").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Strings regexp matched more than one benchmark: BenchmarkStrings::implode and BenchmarkStrings::concat"
        );
    }

    #[test]
    fn pattern_matching_nothing_is_an_error() {
        let err = split_ab(RUN, "implode", "explode").unwrap_err();
        assert_eq!(err.to_string(), "explode regexp matched no benchmarks");
    }

    #[test]
    fn both_patterns_on_the_same_benchmark_is_an_error() {
        let err = split_ab(RUN, "impl", "plode").unwrap_err();
        assert_eq!(
            err.to_string(),
            "old/new regexp both matched BenchmarkStrings::implode"
        );
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(matches!(
            split_ab(RUN, "(", "concat"),
            Err(DomainError::Pattern { .. })
        ));
    }

    #[test]
    fn renames_new_class_prefix() {
        let out = rename_class_prefix(
            "BenchmarkB::sum\t10\t5.0 ns/op\nBenchmarkBB::sum\t1\t1.0 ns/op\n",
            "BenchmarkA",
            "BenchmarkB",
        );
        assert_eq!(
            out,
            "BenchmarkA::sum\t10\t5.0 ns/op\nBenchmarkBB::sum\t1\t1.0 ns/op\n"
        );
    }
}

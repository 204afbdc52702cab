//! Offline comparison of saved benchmark output files.

use anyhow::Context;
use ktest_domain::{CompareOptions, DomainError, SampleStore, compare, sample_warnings};
use ktest_render::{RenderOptions, render_tables};
use std::path::PathBuf;

pub const DEFAULT_SPLIT: &str = "pkg,goos,goarch";

#[derive(Debug, Clone)]
pub struct BenchstatRequest {
    /// One configuration per file, named by its path.
    pub files: Vec<PathBuf>,
    pub compare: CompareOptions,
    /// Label keys that start a new table.
    pub split: Vec<String>,
    pub render: RenderOptions,
}

pub fn split_keys(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub struct BenchstatUseCase;

impl BenchstatUseCase {
    pub fn execute(&self, req: &BenchstatRequest) -> anyhow::Result<String> {
        let mut stores = Vec::with_capacity(req.files.len());
        for file in &req.files {
            let text = std::fs::read_to_string(file).with_context(|| format!("read {}", file.display()))?;
            let mut store = SampleStore::new(file.display().to_string());
            let records = store.ingest(&text, &req.split);
            tracing::debug!(file = %file.display(), records, "ingested");
            stores.push(store);
        }
        render_comparison(&stores, &req.compare, &req.render)
    }
}

/// Compare `stores` and render the tables; under-sampled rows are reported as warnings.
pub fn render_comparison(
    stores: &[SampleStore],
    compare_opts: &CompareOptions,
    render: &RenderOptions,
) -> anyhow::Result<String> {
    if stores.iter().all(SampleStore::is_empty) {
        return Err(DomainError::NoSamples.into());
    }
    let tables = compare(stores, compare_opts);
    for warning in sample_warnings(&tables) {
        tracing::warn!("{warning}");
    }
    Ok(render_tables(&tables, render))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &std::path::Path, name: &str, values: &[f64]) -> PathBuf {
        let text: String = std::iter::once("goos: linux\npkg: strings\n".to_string())
            .chain(values.iter().map(|v| format!("BenchmarkConcat\t1000\t{v} ns/op\n")))
            .collect();
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    fn request(files: Vec<PathBuf>) -> BenchstatRequest {
        BenchstatRequest {
            files,
            compare: CompareOptions::default(),
            split: split_keys(DEFAULT_SPLIT),
            render: RenderOptions::default(),
        }
    }

    #[test]
    fn two_files_produce_a_delta_table() {
        let dir = tempfile::tempdir().unwrap();
        let old = write(dir.path(), "old.txt", &[100.0, 101.0, 99.0, 102.0, 100.5]);
        let new = write(dir.path(), "new.txt", &[150.0, 151.0, 149.0, 152.0, 150.5]);
        let out = BenchstatUseCase.execute(&request(vec![old, new])).unwrap();
        let mut lines = out.lines();
        assert!(lines.next().unwrap().ends_with("delta"), "{out}");
        assert_eq!(lines.next().unwrap(), "pkg:strings goos:linux", "{out}");
        assert!(lines.next().unwrap().contains("+49.75%"), "{out}");
    }

    #[test]
    fn files_without_records_are_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        fs::write(&path, "PASS\nok  strings 1.0s\n").unwrap();
        let err = BenchstatUseCase.execute(&request(vec![path])).unwrap_err();
        assert_eq!(err.to_string(), "no samples to compare");
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = BenchstatUseCase
            .execute(&request(vec!["/nonexistent/ktest-old.txt".into()]))
            .unwrap_err();
        assert!(err.to_string().contains("ktest-old.txt"), "{err}");
    }

    #[test]
    fn split_keys_ignore_blanks() {
        assert_eq!(split_keys(" pkg, ,goos"), ["pkg", "goos"]);
        assert!(split_keys("").is_empty());
    }
}

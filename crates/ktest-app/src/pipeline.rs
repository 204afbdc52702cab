//! Shared pieces of the build-and-run pipelines.

use anyhow::Context;
use std::path::{Path, PathBuf};

/// Run one pipeline stage; its error is prefixed with the stage name.
pub(crate) fn stage<T>(name: &'static str, f: impl FnOnce() -> anyhow::Result<T>) -> anyhow::Result<T> {
    tracing::debug!("stage: {name}");
    f().context(name)
}

/// One discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InputFile {
    pub full_name: PathBuf,
    /// Relative to the target directory.
    pub short_name: PathBuf,
}

/// Directory the short names are relative to: the target itself, or its parent for a single file.
pub(crate) fn target_dir(target: &Path) -> PathBuf {
    if target.to_string_lossy().ends_with(ktest_types::PHP_EXT) {
        target.parent().map_or_else(|| PathBuf::from("."), Path::to_path_buf)
    } else {
        target.to_path_buf()
    }
}

pub(crate) fn input_files(files: Vec<PathBuf>, dir: &Path) -> Vec<InputFile> {
    files
        .into_iter()
        .map(|full_name| {
            let short_name = full_name
                .strip_prefix(dir)
                .map_or_else(|_| full_name.clone(), Path::to_path_buf);
            InputFile {
                full_name,
                short_name,
            }
        })
        .collect()
}

/// ` 3 / 10 (30%) OK`
pub fn progress_line(completed: usize, total: usize, failed: bool) -> String {
    let pct = if total == 0 { 100 } else { completed * 100 / total };
    let status = if failed { "FAIL" } else { "OK" };
    format!(" {completed} / {total} ({pct:2}%) {status}")
}

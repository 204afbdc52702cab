//! Input file discovery.

use anyhow::Context;
use ktest_types::{BENCH_CLASS_PREFIX, PHP_EXT, TEST_CLASS_SUFFIX};
use std::path::{Path, PathBuf};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// `Benchmark*.php`
    Benchmark,
    /// `*Test.php`
    Test,
}

impl FileKind {
    fn pattern(self) -> String {
        match self {
            FileKind::Benchmark => format!("{BENCH_CLASS_PREFIX}*{PHP_EXT}"),
            FileKind::Test => format!("*{TEST_CLASS_SUFFIX}{PHP_EXT}"),
        }
    }
}

/// A `.php` target is taken as is; a directory is walked recursively.
/// Results are sorted by full path.
pub fn discover_files(target: &Path, kind: FileKind) -> anyhow::Result<Vec<PathBuf>> {
    if target.to_string_lossy().ends_with(PHP_EXT) {
        return Ok(vec![target.to_path_buf()]);
    }
    if !target.is_dir() {
        anyhow::bail!("{}: not a directory or a {PHP_EXT} file", target.display());
    }

    let root = glob::Pattern::escape(&target.to_string_lossy());
    let pattern = format!("{root}/**/{}", kind.pattern());
    let mut files = Vec::new();
    for entry in glob::glob(&pattern).with_context(|| format!("bad glob pattern {pattern}"))? {
        let path = entry.context("walk target directory")?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    tracing::debug!(count = files.len(), target = %target.display(), "discovered files");
    Ok(files)
}

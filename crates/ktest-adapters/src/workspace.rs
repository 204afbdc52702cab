//! Temporary build directories.
//!
//! A workspace is registered for removal on interrupt until it is dropped;
//! `--no-cleanup` workspaces are never registered and survive the run.

use anyhow::Context;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use tempfile::TempDir;

/// Live workspace directories.
#[derive(Debug, Default)]
pub struct CleanupRegistry {
    pending: Mutex<Vec<PathBuf>>,
}

impl CleanupRegistry {
    pub const fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    fn register(&self, path: &Path) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.push(path.to_path_buf());
        }
    }

    fn unregister(&self, path: &Path) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|p| p != path);
        }
    }

    /// Remove every registered directory.
    pub fn cleanup(&self) {
        let dirs = match self.pending.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };
        for dir in dirs {
            if let Err(err) = std::fs::remove_dir_all(&dir) {
                tracing::warn!("remove temp build dir {}: {err}", dir.display());
            }
        }
    }
}

static REGISTRY: CleanupRegistry = CleanupRegistry::new();

/// Remove every live workspace. Called from the interrupt handler.
pub fn cleanup_registered() {
    REGISTRY.cleanup();
}

#[derive(Debug)]
pub struct Workspace {
    dir: Option<TempDir>,
    path: PathBuf,
    keep: bool,
}

impl Workspace {
    pub fn create(prefix: &str, keep: bool) -> anyhow::Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(prefix)
            .tempdir()
            .context("create temp build dir")?;
        let path = dir.path().to_path_buf();
        if !keep {
            REGISTRY.register(&path);
        }
        tracing::debug!("temp build dir: {}", path.display());
        Ok(Self {
            dir: Some(dir),
            path,
            keep,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Symlink `source_root/name` into the workspace for each name that exists.
    pub fn link_existing(&self, source_root: &Path, names: &[&str]) -> anyhow::Result<()> {
        for name in names {
            let source = source_root.join(name);
            if !source.exists() {
                continue;
            }
            let link = self.path.join(name);
            if let Some(parent) = link.parent() {
                std::fs::create_dir_all(parent)?;
            }
            symlink(&source, &link)
                .with_context(|| format!("link {} -> {}", link.display(), source.display()))?;
        }
        Ok(())
    }

    /// Write `contents` to `rel`, creating parent directories.
    pub fn write_file(&self, rel: impl AsRef<Path>, contents: &[u8]) -> anyhow::Result<PathBuf> {
        let path = self.path.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        std::fs::write(&path, contents).with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.keep {
            let kept = dir.keep();
            tracing::info!("keeping temp build dir {}", kept.display());
        } else {
            REGISTRY.unregister(&self.path);
            if let Err(err) = dir.close() {
                tracing::warn!("remove temp build dir: {err}");
            }
        }
    }
}

#[cfg(unix)]
fn symlink(source: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(source, link)
}

#[cfg(windows)]
fn symlink(source: &Path, link: &Path) -> std::io::Result<()> {
    if source.is_dir() {
        std::os::windows::fs::symlink_dir(source, link)
    } else {
        std::os::windows::fs::symlink_file(source, link)
    }
}

static PROFILE_SUFFIX: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\.[A-F0-9]+\.\d+$").ok());

/// Profile output `ktest._Foo.benchmarkBar.1A2B.123` becomes `Foo.benchmarkBar`.
pub fn profile_name(file_name: &str) -> String {
    let name = file_name.strip_prefix("ktest._").unwrap_or(file_name);
    match PROFILE_SUFFIX.as_ref() {
        Some(re) => re.replace(name, "").into_owned(),
        None => name.to_string(),
    }
}

/// Copy every profile in `profiles_dir` to `dest/<name>.callgrind`. Returns the written paths.
pub fn copy_profiles(profiles_dir: &Path, dest: &Path) -> anyhow::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dest).with_context(|| format!("create {}", dest.display()))?;
    let mut written = Vec::new();
    let entries = std::fs::read_dir(profiles_dir)
        .with_context(|| format!("read {}", profiles_dir.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = profile_name(&entry.file_name().to_string_lossy());
        let target = dest.join(format!("{name}.callgrind"));
        std::fs::copy(entry.path(), &target)
            .with_context(|| format!("copy profile to {}", target.display()))?;
        written.push(target);
    }
    written.sort();
    Ok(written)
}

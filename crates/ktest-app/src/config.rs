//! Settings layering: flag > environment > `ktest.toml` > default.

use anyhow::Context;
use ktest_adapters::EnvSnapshot;
use ktest_types::{CONFIG_FILE_NAME, ConfigFile};
use std::path::{Path, PathBuf};

pub const DEFAULT_COUNT: u32 = 10;
pub const DEFAULT_PHP: &str = "php";
pub const DEFAULT_SRC_DIR: &str = "src";

/// `ktest.toml` in `project_root`, or defaults when there is none.
pub fn load_config(project_root: &Path) -> anyhow::Result<ConfigFile> {
    let path = project_root.join(CONFIG_FILE_NAME);
    if !path.is_file() {
        return Ok(ConfigFile::default());
    }
    let text = std::fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&text).with_context(|| format!("parse {}", path.display()))
}

/// Explicit command line values; `None`/`false` means "not given".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolchainFlags {
    pub kphp2cpp_binary: Option<PathBuf>,
    pub include_dirs: Option<String>,
    pub disable_kphp_autoload: bool,
    pub php: Option<String>,
    pub preload: Option<PathBuf>,
    pub no_jit: bool,
    pub count: Option<u32>,
    pub benchmem: bool,
    pub src_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub kphp_root: Option<PathBuf>,
    pub kphp2cpp: Option<PathBuf>,
    pub include_dirs: Vec<String>,
    pub disable_kphp_autoload: bool,
    pub php: String,
    pub preload: Option<PathBuf>,
    pub jit: bool,
    pub count: u32,
    pub benchmem: bool,
    pub src_dir: PathBuf,
    pub polyfills_repo: Option<String>,
}

/// `locate` is the last-resort compiler lookup (`PATH`, then the KPHP root).
pub fn resolve_settings(
    flags: &ToolchainFlags,
    env: &EnvSnapshot,
    file: &ConfigFile,
    locate: impl FnOnce(&EnvSnapshot) -> Option<PathBuf>,
) -> Settings {
    let kphp2cpp = flags
        .kphp2cpp_binary
        .clone()
        .or_else(|| env.get("KTEST_KPHP2CPP_BINARY").map(PathBuf::from))
        .or_else(|| file.kphp.binary.clone())
        .or_else(|| locate(env));

    let include_dirs = match flags.include_dirs.as_deref().or(env.get("KTEST_INCLUDE_DIRS")) {
        Some(list) => split_list(list),
        None => file.kphp.include_dirs.clone(),
    };

    let disable_kphp_autoload = flags.disable_kphp_autoload
        || env
            .get_bool("KTEST_DISABLE_KPHP_AUTOLOAD")
            .or(file.kphp.disable_autoload)
            .unwrap_or(false);

    let php = flags
        .php
        .clone()
        .or_else(|| env.get("KTEST_PHP_BINARY").map(str::to_string))
        .or_else(|| file.php.binary.clone())
        .unwrap_or_else(|| DEFAULT_PHP.to_string());

    Settings {
        kphp_root: env.kphp_root(),
        kphp2cpp,
        include_dirs,
        disable_kphp_autoload,
        php,
        preload: flags.preload.clone().or_else(|| file.php.preload.clone()),
        jit: !flags.no_jit && file.php.jit.unwrap_or(true),
        count: flags.count.or(file.bench.count).unwrap_or(DEFAULT_COUNT),
        benchmem: flags.benchmem || file.bench.benchmem.unwrap_or(false),
        src_dir: flags
            .src_dir
            .clone()
            .or_else(|| file.phpunit.src_dir.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SRC_DIR)),
        polyfills_repo: env.get("KPHP_TESTS_POLYFILLS_REPO").map(str::to_string),
    }
}

impl Settings {
    pub fn require_kphp2cpp(&self) -> anyhow::Result<&Path> {
        self.kphp2cpp
            .as_deref()
            .context("can't locate kphp2cpp binary; please set --kphp2cpp-binary arg")
    }

    /// `NAME="value"` lines for `ktest env`.
    pub fn env_lines(&self) -> Vec<String> {
        let path = |p: &Option<PathBuf>| p.as_ref().map(|p| p.display().to_string()).unwrap_or_default();
        [
            ("KPHP_ROOT", path(&self.kphp_root)),
            ("KPHP_TESTS_POLYFILLS_REPO", self.polyfills_repo.clone().unwrap_or_default()),
            ("KTEST_KPHP2CPP_BINARY", path(&self.kphp2cpp)),
            ("KTEST_DISABLE_KPHP_AUTOLOAD", self.disable_kphp_autoload.to_string()),
            ("KTEST_INCLUDE_DIRS", self.include_dirs.join(",")),
            ("KTEST_PHP_BINARY", self.php.clone()),
        ]
        .into_iter()
        .map(|(name, value)| format!("{name}={value:?}"))
        .collect()
    }
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

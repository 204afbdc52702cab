//! Environment snapshot and host probes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Process environment captured once at startup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Non-empty value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
    }

    /// `$KPHP_ROOT` when it exists, otherwise `$HOME/kphp` when that exists.
    pub fn kphp_root(&self) -> Option<PathBuf> {
        if let Some(root) = self.get("KPHP_ROOT").map(PathBuf::from)
            && root.exists()
        {
            return Some(root);
        }
        let home_kphp = PathBuf::from(self.get("HOME")?).join("kphp");
        home_kphp.exists().then_some(home_kphp)
    }
}

/// `kphp2cpp` on the snapshot's `PATH`, then `<kphp root>/objs/bin/kphp2cpp`.
pub fn locate_kphp2cpp(env: &EnvSnapshot) -> Option<PathBuf> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"));
    if let Ok(found) = which::which_in("kphp2cpp", env.get("PATH"), cwd) {
        return Some(found);
    }
    let bin = env.kphp_root()?.join("objs").join("bin").join("kphp2cpp");
    bin.exists().then_some(bin)
}

/// The project root when it carries a `composer.json`.
pub fn composer_root(project_root: &Path) -> Option<PathBuf> {
    project_root
        .join("composer.json")
        .is_file()
        .then(|| project_root.to_path_buf())
}

/// `(sysfs path, value meaning boost is on)`
const CPU_BOOST_FILES: &[(&str, &str)] = &[
    ("sys/devices/system/cpu/intel_pstate/no_turbo", "0"),
    ("sys/devices/system/cpu/cpufreq/boost", "1"),
];

/// Warning text when CPU frequency boost is enabled on this host.
pub fn cpu_boost_issue() -> Option<String> {
    cpu_boost_issue_under(Path::new("/"))
}

pub fn cpu_boost_issue_under(root: &Path) -> Option<String> {
    CPU_BOOST_FILES.iter().find_map(|(rel, enabled)| {
        let path = root.join(rel);
        let value = std::fs::read_to_string(&path).ok()?;
        (value.trim() == *enabled).then(|| format!("cpu boost is not disabled ({})", path.display()))
    })
}

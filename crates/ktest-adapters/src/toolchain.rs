//! Command lines of the compiler, the compiled executable and the interpreter.

use crate::CommandSpec;
use std::path::{Path, PathBuf};

/// `kphp2cpp --mode cli` build of one driver script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KphpBuild {
    pub binary: PathBuf,
    pub script: PathBuf,
    pub output_dir: PathBuf,
    pub workdir: PathBuf,
    pub composer_root: Option<PathBuf>,
    pub include_dirs: Vec<String>,
    pub profiling: bool,
}

impl KphpBuild {
    pub fn command(&self) -> CommandSpec {
        let mut argv = vec![
            self.binary.display().to_string(),
            "--mode".to_string(),
            "cli".to_string(),
            "--destination-directory".to_string(),
            self.output_dir.display().to_string(),
        ];
        if self.profiling {
            argv.extend(["--profiler".to_string(), "1".to_string()]);
        }
        if let Some(root) = &self.composer_root {
            argv.extend(["--composer-root".to_string(), root.display().to_string()]);
        }
        for dir in self.include_dirs.iter().filter(|d| !d.is_empty()) {
            argv.extend(["-I".to_string(), dir.clone()]);
        }
        argv.push(self.script.display().to_string());
        CommandSpec::new(argv).cwd(&self.workdir)
    }

    /// Where the build leaves its executable.
    pub fn executable(&self) -> PathBuf {
        self.output_dir.join("cli")
    }
}

/// One run of a compiled executable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KphpRun {
    pub executable: PathBuf,
    pub workdir: PathBuf,
    pub args: Vec<String>,
    pub profiler_prefix: Option<PathBuf>,
}

impl KphpRun {
    pub fn command(&self) -> CommandSpec {
        let mut argv = vec![self.executable.display().to_string()];
        argv.extend(self.args.iter().cloned());
        argv.extend(["--Xkphp-options".to_string(), "--disable-sql".to_string()]);
        if let Some(prefix) = &self.profiler_prefix {
            argv.extend(["--profiler-log-prefix".to_string(), prefix.display().to_string()]);
        }
        CommandSpec::new(argv).cwd(&self.workdir)
    }
}

/// One run of a script under the interpreter with opcache enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhpRun {
    pub command: String,
    pub script: PathBuf,
    pub workdir: PathBuf,
    /// `opcache.preload` script, relative paths resolve against `workdir`.
    pub preload: Option<PathBuf>,
    pub jit: bool,
    pub args: Vec<String>,
}

impl PhpRun {
    pub fn command(&self) -> CommandSpec {
        let mut argv: Vec<String> = vec![self.command.clone(), "-f".into(), self.script.display().to_string()];
        for setting in ["ffi.enable=preload", "opcache.enable=1", "opcache.enable_cli=1"] {
            argv.extend(["-d".to_string(), setting.to_string()]);
        }
        if let Some(preload) = &self.preload {
            let preload = absolute_in(&self.workdir, preload);
            argv.extend(["-d".to_string(), format!("opcache.preload={}", preload.display())]);
        }
        let jit: &[&str] = if self.jit {
            &["opcache.jit_buffer_size=96M", "opcache.jit=on"]
        } else {
            &["opcache.jit_buffer_size=0", "opcache.jit=0"]
        };
        for setting in jit {
            argv.extend(["-d".to_string(), setting.to_string()]);
        }
        argv.extend(self.args.iter().cloned());
        CommandSpec::new(argv).cwd(&self.workdir)
    }
}

fn absolute_in(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

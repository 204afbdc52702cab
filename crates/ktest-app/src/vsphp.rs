//! Interpreter versus compiler on the same benchmarks.

use crate::ab::{BenchLauncher, strings};
use crate::benchstat::render_comparison;
use ktest_domain::{CompareOptions, SampleStore};
use ktest_render::RenderOptions;
use std::path::PathBuf;

pub const PHP_LABEL: &str = "PHP";
pub const KPHP_LABEL: &str = "KPHP";

#[derive(Debug, Clone)]
pub struct VsPhpRequest {
    pub count: u32,
    pub php: String,
    pub kphp2cpp: Option<PathBuf>,
    pub bench_args: Vec<String>,
    pub geomean: bool,
    pub colorize: bool,
}

pub struct BenchVsPhpUseCase<L: BenchLauncher> {
    launcher: L,
}

impl<L: BenchLauncher> BenchVsPhpUseCase<L> {
    pub fn new(launcher: L) -> Self {
        Self { launcher }
    }

    /// The interpreter is the baseline; a negative delta means the compiled code is faster.
    pub fn execute(&self, req: &VsPhpRequest) -> anyhow::Result<String> {
        let count = req.count.to_string();

        let mut php_args = strings(["bench-php", "--count", count.as_str(), "--php", req.php.as_str()]);
        php_args.extend(req.bench_args.iter().cloned());
        let php_output = self.launcher.launch(PHP_LABEL, &php_args)?;

        let mut kphp_args = strings(["bench", "--count", count.as_str()]);
        if let Some(binary) = &req.kphp2cpp {
            kphp_args.extend(["--kphp2cpp-binary".to_string(), binary.display().to_string()]);
        }
        kphp_args.extend(req.bench_args.iter().cloned());
        let kphp_output = self.launcher.launch(KPHP_LABEL, &kphp_args)?;

        let mut php = SampleStore::new(PHP_LABEL);
        php.ingest(&php_output, &[]);
        let mut kphp = SampleStore::new(KPHP_LABEL);
        kphp.ingest(&kphp_output, &[]);

        let compare = CompareOptions {
            geomean: req.geomean,
            ..CompareOptions::default()
        };
        let render = RenderOptions {
            colorize: req.colorize,
            old_label: PHP_LABEL.to_string(),
            new_label: KPHP_LABEL.to_string(),
        };
        render_comparison(&[php, kphp], &compare, &render)
    }
}

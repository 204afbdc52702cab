//! Application layer for ktest.
//!
//! The app layer coordinates adapters and domain logic.
//! It does not parse CLI flags; every use case takes a plain request struct and a
//! [`ktest_adapters::ProcessRunner`] (or a [`BenchLauncher`]) so it can be driven by tests.

mod ab;
mod bench;
mod benchstat;
mod compare;
mod config;
mod phpunit;
mod pipeline;
mod vsphp;

#[cfg(test)]
mod testing;

pub use ab::{AB_COUNT, BenchAbRequest, BenchAbUseCase, BenchLauncher, SelfExecLauncher};
pub use bench::{BenchBackend, BenchOutcome, BenchRequest, BenchUseCase};
pub use benchstat::{BenchstatRequest, BenchstatUseCase, DEFAULT_SPLIT, render_comparison, split_keys};
pub use compare::{CompareOutcome, CompareRequest, CompareUseCase};
pub use config::{
    DEFAULT_COUNT, DEFAULT_PHP, DEFAULT_SRC_DIR, Settings, ToolchainFlags, load_config, resolve_settings,
};
pub use phpunit::{PhpunitRequest, PhpunitUseCase};
pub use pipeline::progress_line;
pub use vsphp::{BenchVsPhpUseCase, KPHP_LABEL, PHP_LABEL, VsPhpRequest};

//! ktest workspace-level test utilities.
//!
//! This crate exists solely to support workspace-level integration tests,
//! particularly the BDD/cucumber tests in `tests/cucumber.rs`.
//!
//! The actual ktest functionality is in the workspace member crates:
//! - `ktest-types`: Shared types, constants and `ktest.toml` schema
//! - `ktest-stats`, `ktest-significance`: Summary statistics and significance tests
//! - `ktest-phpsyntax`: PHP tokenizer and declaration parser
//! - `ktest-domain`: Sample ingestion, comparison, unit extraction, event stream parsing
//! - `ktest-render`: Driver programs, comparison tables, test reports
//! - `ktest-adapters`: Processes, workspaces and environment probes
//! - `ktest-app`: Application use cases
//! - `ktest` (ktest-cli): CLI interface

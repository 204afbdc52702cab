use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ktest_adapters::{EnvSnapshot, StdProcessRunner, cleanup_registered, locate_kphp2cpp};
use ktest_app::{
    BenchAbRequest, BenchAbUseCase, BenchBackend, BenchRequest, BenchUseCase, BenchVsPhpUseCase,
    BenchstatRequest, BenchstatUseCase, CompareOutcome, CompareRequest, CompareUseCase,
    PhpunitRequest, PhpunitUseCase, SelfExecLauncher, Settings, ToolchainFlags, VsPhpRequest,
    load_config, resolve_settings, split_keys,
};
use ktest_domain::CompareOptions;
use ktest_render::{RenderOptions, ReportOptions, format_report};
use ktest_types::{ColorMode, DeltaTest, RowOrder};
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

/// Progress tick of re-executed benchmark runs.
const WATCH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Parser)]
#[command(
    name = "ktest",
    version,
    about = "Benchmarks and phpunit tests for KPHP projects"
)]
struct Cli {
    /// Verbose logging (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Args)]
struct ProjectArgs {
    /// Project root with composer.json and ktest.toml (defaults to the current directory)
    #[arg(long)]
    project_root: Option<PathBuf>,

    /// Keep the temporary build directory
    #[arg(long, default_value_t = false)]
    no_cleanup: bool,
}

#[derive(Debug, Args)]
struct CompilerArgs {
    /// kphp2cpp binary
    #[arg(long)]
    kphp2cpp_binary: Option<PathBuf>,

    /// Comma-separated include directories passed to kphp2cpp
    #[arg(long)]
    include_dirs: Option<String>,
}

#[derive(Debug, Args)]
struct InterpreterArgs {
    /// PHP interpreter command
    #[arg(long)]
    php: Option<String>,

    /// opcache.preload script
    #[arg(long)]
    preload: Option<PathBuf>,

    /// Run with the JIT disabled
    #[arg(long, default_value_t = false)]
    no_jit: bool,
}

#[derive(Debug, Args)]
struct BenchArgs {
    /// Benchmark file or directory
    #[arg(default_value = ".")]
    target: PathBuf,

    /// Samples per benchmark
    #[arg(long)]
    count: Option<u32>,

    /// Regexp over Class::method selecting benchmarks to run
    #[arg(long, default_value = ".*")]
    run: String,

    /// Report allocations per operation
    #[arg(long, default_value_t = false)]
    benchmem: bool,

    /// Print TeamCity service messages
    #[arg(long, default_value_t = false)]
    teamcity: bool,

    /// Collect profiler output into this directory
    #[arg(long)]
    profile_dir: Option<PathBuf>,

    /// Require the composer autoloader only when running under PHP
    #[arg(long, default_value_t = false)]
    disable_kphp_autoload: bool,

    #[command(flatten)]
    project: ProjectArgs,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build and run phpunit tests with KPHP.
    Phpunit {
        /// Test file or directory
        #[arg(default_value = "tests")]
        target: PathBuf,

        /// Source directory linked into the build, relative to the project root
        #[arg(long)]
        src_dir: Option<PathBuf>,

        #[command(flatten)]
        compiler: CompilerArgs,

        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Build benchmarks with KPHP and print their results.
    #[command(args_override_self = true)]
    Bench {
        #[command(flatten)]
        bench: BenchArgs,

        #[command(flatten)]
        compiler: CompilerArgs,
    },

    /// Run benchmarks with the PHP interpreter.
    #[command(args_override_self = true)]
    BenchPhp {
        #[command(flatten)]
        bench: BenchArgs,

        #[command(flatten)]
        php: InterpreterArgs,
    },

    /// Compare two benchmarks (name patterns) or two benchmark files.
    BenchAb {
        old: String,
        new: String,

        /// Output colors
        #[arg(long, default_value = "auto")]
        colorize: ColorMode,

        /// Extra arguments for `ktest bench`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        bench_args: Vec<String>,
    },

    /// Compare PHP and KPHP results of the same benchmarks.
    BenchVsPhp {
        /// Samples per benchmark
        #[arg(long)]
        count: Option<u32>,

        /// PHP interpreter command
        #[arg(long)]
        php: Option<String>,

        /// kphp2cpp binary
        #[arg(long)]
        kphp2cpp_binary: Option<PathBuf>,

        /// Add a geometric mean row
        #[arg(long, default_value_t = false)]
        geomean: bool,

        /// Output colors
        #[arg(long, default_value = "auto")]
        colorize: ColorMode,

        /// Extra arguments for both benchmark runs
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        bench_args: Vec<String>,
    },

    /// Compare saved benchmark outputs.
    Benchstat {
        /// Significance test: none, u-test or t-test
        #[arg(long, default_value = "utest")]
        delta_test: DeltaTest,

        /// Significance level
        #[arg(long, default_value_t = 0.05)]
        alpha: f64,

        /// Add a geometric mean row
        #[arg(long, default_value_t = false)]
        geomean: bool,

        /// Comma-separated labels that split results into tables
        #[arg(long, default_value = ktest_app::DEFAULT_SPLIT)]
        split: String,

        /// Row order: [-]delta, [-]name or none
        #[arg(long, default_value = "none")]
        sort: RowOrder,

        /// Output colors
        #[arg(long, default_value = "auto")]
        colorize: ColorMode,

        /// Result files, one configuration each
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Check that a script prints the same output under PHP and KPHP.
    Compare {
        script: PathBuf,

        #[command(flatten)]
        compiler: CompilerArgs,

        /// PHP interpreter command
        #[arg(long)]
        php: Option<String>,

        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Print the resolved toolchain settings.
    Env,

    /// Print the ktest version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    if let Err(err) = ctrlc::set_handler(|| {
        cleanup_registered();
        std::process::exit(130);
    }) {
        tracing::warn!("failed to install Ctrl+C handler: {err}");
    }

    match real_main(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .try_init();
}

fn real_main(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.cmd {
        Command::Phpunit {
            target,
            src_dir,
            compiler,
            project,
        } => {
            let root = project_root(&project)?;
            let settings = settings(
                &root,
                ToolchainFlags {
                    src_dir,
                    ..compiler_flags(compiler)
                },
            )?;
            let req = PhpunitRequest {
                target,
                src_dir: settings.src_dir.clone(),
                kphp2cpp: settings.require_kphp2cpp()?.to_path_buf(),
                include_dirs: settings.include_dirs.clone(),
                project_root: root,
                no_cleanup: project.no_cleanup,
            };
            let mut stdout = std::io::stdout().lock();
            let report = PhpunitUseCase::new(StdProcessRunner)?.execute(&req, &mut stdout)?;
            write!(stdout, "{}", format_report(&report, &ReportOptions::default()))?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Bench { bench, compiler } => {
            let root = project_root(&bench.project)?;
            let settings = settings(&root, bench_flags(&bench, compiler_flags(compiler)))?;
            let backend = BenchBackend::Kphp {
                binary: settings.require_kphp2cpp()?.to_path_buf(),
                include_dirs: settings.include_dirs.clone(),
            };
            run_bench(bench, root, backend, &settings)
        }

        Command::BenchPhp { bench, php } => {
            let root = project_root(&bench.project)?;
            let flags = ToolchainFlags {
                php: php.php,
                preload: php.preload,
                no_jit: php.no_jit,
                ..ToolchainFlags::default()
            };
            let settings = settings(&root, bench_flags(&bench, flags))?;
            let backend = BenchBackend::Php {
                command: settings.php.clone(),
                jit: settings.jit,
            };
            run_bench(bench, root, backend, &settings)
        }

        Command::BenchAb {
            old,
            new,
            colorize,
            bench_args,
        } => {
            let req = BenchAbRequest {
                old,
                new,
                bench_args,
                colorize: colorize.resolve(std::io::stdout().is_terminal()),
            };
            let launcher = SelfExecLauncher::current(WATCH_INTERVAL)?;
            print!("{}", BenchAbUseCase::new(launcher).execute(&req)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::BenchVsPhp {
            count,
            php,
            kphp2cpp_binary,
            geomean,
            colorize,
            bench_args,
        } => {
            let root = std::env::current_dir().context("get current dir")?;
            let settings = settings(
                &root,
                ToolchainFlags {
                    kphp2cpp_binary,
                    php,
                    count,
                    ..ToolchainFlags::default()
                },
            )?;
            let req = VsPhpRequest {
                count: settings.count,
                php: settings.php.clone(),
                kphp2cpp: settings.kphp2cpp.clone(),
                bench_args,
                geomean,
                colorize: colorize.resolve(std::io::stdout().is_terminal()),
            };
            let launcher = SelfExecLauncher::current(WATCH_INTERVAL)?;
            print!("{}", BenchVsPhpUseCase::new(launcher).execute(&req)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Benchstat {
            delta_test,
            alpha,
            geomean,
            split,
            sort,
            colorize,
            files,
        } => {
            let req = BenchstatRequest {
                files,
                compare: CompareOptions {
                    delta_test,
                    alpha,
                    geomean,
                    order: sort,
                },
                split: split_keys(&split),
                render: RenderOptions {
                    colorize: colorize.resolve(std::io::stdout().is_terminal()),
                    ..RenderOptions::default()
                },
            };
            print!("{}", BenchstatUseCase.execute(&req)?);
            Ok(ExitCode::SUCCESS)
        }

        Command::Compare {
            script,
            compiler,
            php,
            project,
        } => {
            let root = project_root(&project)?;
            let settings = settings(
                &root,
                ToolchainFlags {
                    php,
                    ..compiler_flags(compiler)
                },
            )?;
            let req = CompareRequest {
                script,
                php: settings.php.clone(),
                kphp2cpp: settings.require_kphp2cpp()?.to_path_buf(),
                include_dirs: settings.include_dirs.clone(),
                project_root: root,
                no_cleanup: project.no_cleanup,
            };
            let outcome = CompareUseCase::new(StdProcessRunner).execute(&req)?;
            println!("{}", outcome.message());
            Ok(match outcome {
                CompareOutcome::Same => ExitCode::SUCCESS,
                CompareOutcome::Differs(_) => ExitCode::from(1),
            })
        }

        Command::Env => {
            let root = std::env::current_dir().context("get current dir")?;
            for line in settings(&root, ToolchainFlags::default())?.env_lines() {
                println!("{line}");
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Version => {
            println!("ktest {}", env!("CARGO_PKG_VERSION"));
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run_bench(bench: BenchArgs, root: PathBuf, backend: BenchBackend, settings: &Settings) -> anyhow::Result<ExitCode> {
    let req = BenchRequest {
        target: bench.target,
        project_root: root,
        backend,
        count: settings.count,
        run_filter: bench.run,
        benchmem: settings.benchmem,
        teamcity: bench.teamcity,
        profile_dir: bench.profile_dir,
        disable_kphp_autoload: settings.disable_kphp_autoload,
        preload: settings.preload.clone(),
        no_cleanup: bench.project.no_cleanup,
    };
    let mut stdout = std::io::stdout().lock();
    let outcome = BenchUseCase::new(StdProcessRunner)?.execute(&req, &mut stdout)?;
    for profile in &outcome.profiles {
        tracing::info!("profile: {}", profile.display());
    }
    if outcome.classes_failed > 0 {
        tracing::warn!("{} benchmark classes failed", outcome.classes_failed);
    }
    Ok(ExitCode::SUCCESS)
}

fn project_root(project: &ProjectArgs) -> anyhow::Result<PathBuf> {
    match &project.project_root {
        Some(root) => Ok(root.clone()),
        None => std::env::current_dir().context("get current dir"),
    }
}

fn compiler_flags(compiler: CompilerArgs) -> ToolchainFlags {
    ToolchainFlags {
        kphp2cpp_binary: compiler.kphp2cpp_binary,
        include_dirs: compiler.include_dirs,
        ..ToolchainFlags::default()
    }
}

fn bench_flags(bench: &BenchArgs, base: ToolchainFlags) -> ToolchainFlags {
    ToolchainFlags {
        count: bench.count,
        benchmem: bench.benchmem,
        disable_kphp_autoload: bench.disable_kphp_autoload,
        ..base
    }
}

fn settings(root: &std::path::Path, flags: ToolchainFlags) -> anyhow::Result<Settings> {
    let config = load_config(root)?;
    Ok(resolve_settings(&flags, &EnvSnapshot::capture(), &config, locate_kphp2cpp))
}

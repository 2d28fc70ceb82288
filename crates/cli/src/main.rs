use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use namediff::commands::{run_command, RunArgs, EXIT_OK};
use namediff_core::services::orchestrator::CancelFlag;
use tracing_subscriber::EnvFilter;

/// Differential tester for install_name_tool reimplementations.
///
/// Every dylib found under PATH is mutated by both Apple's install_name_tool
/// and the candidate tool, on separate copies, and the two outputs are
/// compared byte-for-byte (`--strict`) or by their dyld-relevant load commands.
#[derive(Parser, Debug)]
#[command(
    name = "namediff",
    version,
    about = "Compare an install_name_tool clone against the reference tool",
    long_about = None
)]
struct Cli {
    /// Dylib file or directory to search for dylibs.
    path: PathBuf,

    /// Candidate install_name_tool binary. Built from --source-root when omitted.
    #[arg(long)]
    candidate_tool: Option<PathBuf>,

    /// Reference install_name_tool (defaults to `install_name_tool` on PATH).
    #[arg(long)]
    reference_tool: Option<PathBuf>,

    /// Load-command lister (defaults to `otool`).
    #[arg(long)]
    otool: Option<PathBuf>,

    /// Architecture lister (defaults to `lipo`).
    #[arg(long)]
    lipo: Option<PathBuf>,

    /// Crate root used to build the candidate tool when none is given.
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Harness config file (JSON or YAML).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Maximum number of files to test.
    #[arg(long)]
    max_files: Option<usize>,

    /// Verbose output.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,

    /// Require bit-for-bit identical output.
    #[arg(long, default_value_t = false)]
    strict: bool,

    /// Skip fat/universal binaries.
    #[arg(long, default_value_t = false)]
    skip_fat: bool,

    /// Comma-separated operations: change_id, add_rpath, delete_rpath, change_rpath, change_dylib.
    #[arg(long)]
    operations: Option<String>,

    /// Seed for generated paths, to reproduce a run.
    #[arg(long)]
    seed: Option<u64>,

    /// Write a JSON report of every case to this file.
    #[arg(long)]
    report: Option<PathBuf>,
}

impl From<Cli> for RunArgs {
    fn from(cli: Cli) -> Self {
        RunArgs {
            path: cli.path,
            candidate_tool: cli.candidate_tool,
            reference_tool: cli.reference_tool,
            otool: cli.otool,
            lipo: cli.lipo,
            source_root: cli.source_root,
            config: cli.config,
            max_files: cli.max_files,
            verbose: cli.verbose,
            strict: cli.strict,
            skip_fat: cli.skip_fat,
            operations: cli.operations,
            seed: cli.seed,
            report: cli.report,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Stop before the next file or operation on Ctrl-C; recorded cases are kept.
fn install_interrupt_handler(cancel: &CancelFlag) {
    let flag = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || flag.cancel()) {
        tracing::warn!(error = %e, "failed to install interrupt handler");
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancelFlag::new();
    install_interrupt_handler(&cancel);

    let code = run_command(&RunArgs::from(cli), cancel)?;
    if code != EXIT_OK {
        std::process::exit(code);
    }
    Ok(())
}

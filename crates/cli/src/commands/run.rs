use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;

use namediff_core::config::{load_config, HarnessConfig};
use namediff_core::model::OperationKind;
use namediff_core::services::operands::PathGenerator;
use namediff_core::services::orchestrator::{CancelFlag, Orchestrator, RunOptions};
use namediff_core::services::process::SystemExecutor;

use crate::commands::{
    build_candidate_tool, build_report, find_dylibs, print_summary, write_report, ConsoleListener,
    ReportContext,
};
use crate::{canonicalize_or_current, sha256_file};

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILURES: i32 = 1;
pub const EXIT_INTERRUPTED: i32 = 130;

/// Inputs of a run as given on the command line. `None`/`false` defer to
/// the config file and environment.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub path: PathBuf,
    pub candidate_tool: Option<PathBuf>,
    pub reference_tool: Option<PathBuf>,
    pub otool: Option<PathBuf>,
    pub lipo: Option<PathBuf>,
    pub source_root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub max_files: Option<usize>,
    pub verbose: bool,
    pub strict: bool,
    pub skip_fat: bool,
    pub operations: Option<String>,
    pub seed: Option<u64>,
    pub report: Option<PathBuf>,
}

/// Merge defaults, config file, environment and flags, in that order.
pub fn resolve_config(args: &RunArgs) -> Result<HarnessConfig> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => HarnessConfig::default(),
    };
    config.tools.apply_env();

    if let Some(p) = &args.candidate_tool {
        config.tools.candidate_tool = Some(p.clone());
    }
    if let Some(p) = &args.reference_tool {
        config.tools.reference_tool = p.clone();
    }
    if let Some(p) = &args.otool {
        config.tools.otool = p.clone();
    }
    if let Some(p) = &args.lipo {
        config.tools.lipo = p.clone();
    }
    if let Some(list) = &args.operations {
        config.operations = Some(OperationKind::parse_list(list)?);
    }
    if args.max_files.is_some() {
        config.max_files = args.max_files;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.strict |= args.strict;
    config.skip_fat |= args.skip_fat;
    Ok(config)
}

/// Run the full differential matrix and return the process exit code.
///
/// Fatal conditions (no candidate tool, no input files, bad config) are
/// returned as `Err`; test failures are reflected in the exit code only.
pub fn run_command(args: &RunArgs, cancel: CancelFlag) -> Result<i32> {
    let mut config = resolve_config(args)?;

    let candidate = match config.tools.candidate_tool.clone() {
        Some(path) => path,
        None => {
            let source_root = args.source_root.as_deref().unwrap_or(Path::new("."));
            let root = canonicalize_or_current(source_root)?;
            build_candidate_tool(&root)?
        }
    };
    let candidate = canonicalize_or_current(&candidate)?;
    if !candidate.is_file() {
        return Err(anyhow!("Candidate tool not found at {}", candidate.display()));
    }
    config.tools.candidate_tool = Some(candidate.clone());
    println!("Using candidate tool: {}", candidate.display());

    let files = find_dylibs(&args.path, config.max_files)?;
    if files.is_empty() {
        return Err(anyhow!("No dylib files found in {}", args.path.display()));
    }
    println!("Found {} dylib(s) to test", files.len());

    let operations = config.operations();
    let names: Vec<&str> = operations.iter().map(|k| k.as_str()).collect();
    println!("Testing operations: {}", names.join(", "));
    println!();

    let generator = match config.seed {
        Some(seed) => PathGenerator::seeded(seed),
        None => PathGenerator::from_entropy(),
    };
    let options = RunOptions {
        strict: config.strict,
        skip_fat: config.skip_fat,
        operations: operations.clone(),
    };
    let executor = SystemExecutor;
    let mut orchestrator =
        Orchestrator::new(&executor, &config.tools, &config.timeouts, options, generator)
            .with_cancel(cancel);
    if let Some(dir) = &config.scratch_dir {
        orchestrator = orchestrator.with_scratch_root(dir.clone());
    }

    let started_at = Utc::now().to_rfc3339();
    let mut listener = ConsoleListener::new(args.verbose);
    let summary = orchestrator.run(&files, &mut listener)?;
    let finished_at = Utc::now().to_rfc3339();

    print_summary(&summary.tally, summary.cancelled);

    if let Some(report_path) = &args.report {
        let ctx = ReportContext {
            started_at,
            finished_at,
            reference_tool: config.tools.reference_tool.clone(),
            candidate_tool: candidate.clone(),
            candidate_sha256: sha256_file(&candidate).ok(),
            strict: config.strict,
            operations,
        };
        write_report(report_path, &build_report(&ctx, &summary))
            .context("Run finished but the report could not be saved")?;
        println!("Report written to {}", report_path.display());
    }

    Ok(if summary.cancelled {
        EXIT_INTERRUPTED
    } else if summary.has_failures() {
        EXIT_FAILURES
    } else {
        EXIT_OK
    })
}

use std::path::Path;

use namediff_core::model::{BinaryMetadata, FileReport, Outcome, Tally, TestCase};
use namediff_core::services::compare::format_list;
use namediff_core::services::orchestrator::RunListener;

use crate::display_name;

/// Prints progress the way a terminal user wants it: failures and errors
/// immediately, passes and skips only when verbose.
#[derive(Debug, Default)]
pub struct ConsoleListener {
    pub verbose: bool,
}

impl ConsoleListener {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }
}

impl RunListener for ConsoleListener {
    fn file_started(&mut self, index: usize, total: usize, path: &Path, meta: &BinaryMetadata) {
        println!("[{index}/{total}] Testing {}...", display_name(path));
        if self.verbose {
            println!("  Install name: {}", meta.identity_path.as_deref().unwrap_or("None"));
            println!("  RPaths: {}", format_list(&meta.search_paths));
            println!("  Is fat: {}", meta.is_universal);
        }
    }

    fn case_finished(&mut self, case: &TestCase) {
        for line in case_lines(case, self.verbose) {
            println!("{line}");
        }
    }

    fn file_skipped(&mut self, _path: &Path, reason: &str) {
        println!("  SKIPPED ({reason})");
    }

    fn file_finished(&mut self, report: &FileReport) {
        if self.verbose && !report.cases.is_empty() {
            println!(
                "  {} passed, {} failed, {} skipped, {} errors",
                report.passed(),
                report.failed(),
                report.skipped(),
                report.errors()
            );
        }
    }
}

/// Lines printed for a finished case; empty for quiet passes and skips.
pub fn case_lines(case: &TestCase, verbose: bool) -> Vec<String> {
    match case.outcome {
        Outcome::Pass if verbose => vec![format!("  PASS: {}", case.name)],
        Outcome::Skip if verbose => vec![format!("  SKIP: {} - {}", case.name, case.message)],
        Outcome::Pass | Outcome::Skip => vec![],
        Outcome::Fail => vec![
            format!("  FAIL: {}", case.name),
            format!("    {}", case.message),
            format!(
                "    Candidate size: {}, Reference size: {}",
                case.candidate_size, case.reference_size
            ),
        ],
        Outcome::Error => vec![format!("  ERROR: {}", case.name), format!("    {}", case.message)],
    }
}

pub fn print_summary(tally: &Tally, interrupted: bool) {
    println!();
    println!("{}", "=".repeat(60));
    println!("SUMMARY");
    println!("{}", "=".repeat(60));
    if interrupted {
        println!("  (interrupted; partial results)");
    }
    println!("  Passed:  {}", tally.passed);
    println!("  Failed:  {}", tally.failed);
    println!("  Skipped: {}", tally.skipped);
    println!("  Errors:  {}", tally.errors);
    println!();
}

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use namediff_core::model::{FileReport, OperationKind, Tally};
use namediff_core::services::orchestrator::RunSummary;

/// JSON document written by `--report`.
#[derive(Debug, Serialize)]
pub struct RunReport<'a> {
    pub version: &'static str,
    pub started_at: String,
    pub finished_at: String,
    pub reference_tool: PathBuf,
    pub candidate_tool: PathBuf,
    pub candidate_sha256: Option<String>,
    pub strict: bool,
    pub operations: Vec<OperationKind>,
    pub interrupted: bool,
    pub files: Vec<FileEntry<'a>>,
    pub totals: Tally,
}

#[derive(Debug, Serialize)]
pub struct FileEntry<'a> {
    #[serde(flatten)]
    pub report: &'a FileReport,
    pub counts: Tally,
}

impl<'a> FileEntry<'a> {
    pub fn new(report: &'a FileReport) -> Self {
        Self { report, counts: report.tally() }
    }
}

/// Tool and timing context captured around a run.
#[derive(Debug, Clone)]
pub struct ReportContext {
    pub started_at: String,
    pub finished_at: String,
    pub reference_tool: PathBuf,
    pub candidate_tool: PathBuf,
    pub candidate_sha256: Option<String>,
    pub strict: bool,
    pub operations: Vec<OperationKind>,
}

pub fn build_report<'a>(ctx: &ReportContext, summary: &'a RunSummary) -> RunReport<'a> {
    RunReport {
        version: namediff_core::version(),
        started_at: ctx.started_at.clone(),
        finished_at: ctx.finished_at.clone(),
        reference_tool: ctx.reference_tool.clone(),
        candidate_tool: ctx.candidate_tool.clone(),
        candidate_sha256: ctx.candidate_sha256.clone(),
        strict: ctx.strict,
        operations: ctx.operations.clone(),
        interrupted: summary.cancelled,
        files: summary.reports.iter().map(FileEntry::new).collect(),
        totals: summary.tally,
    }
}

pub fn write_report(path: &Path, report: &RunReport<'_>) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("Failed to serialize run report")?;
    fs::write(path, json)
        .with_context(|| format!("Failed to write run report at {}", path.display()))?;
    Ok(())
}

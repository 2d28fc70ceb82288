//! Drives the {file x operation} matrix and records outcomes.
//!
//! Per file: inspect, then for each selected and applicable operation run the
//! reference tool and the candidate into a scratch directory owned by that
//! file, judge the outputs, and append the case. The scratch directory is a
//! `TempDir` and is removed on every exit path.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rand::Rng;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{Timeouts, ToolPaths};
use crate::model::{BinaryMetadata, FileReport, Operation, OperationKind, Outcome, Tally, TestCase};
use crate::services::compare::Comparator;
use crate::services::inspect::MetadataExtractor;
use crate::services::operands::PathGenerator;
use crate::services::process::ToolExecutor;
use crate::services::runner::{Tool, ToolRole, ToolRunner};

pub const FAT_SKIP_MESSAGE: &str = "fat binary";

/// Conditions that abort a run before any file is tested.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("Candidate tool not found at {}", .0.display())]
    MissingCandidate(PathBuf),
    #[error("No candidate tool configured")]
    NoCandidate,
    #[error("No input files to test")]
    NoInputFiles,
}

/// Cooperative run-level interrupt. Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Knobs that shape a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub strict: bool,
    pub skip_fat: bool,
    pub operations: Vec<OperationKind>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self { strict: false, skip_fat: false, operations: OperationKind::DEFAULT.to_vec() }
    }
}

/// Progress notifications; every method defaults to a no-op.
pub trait RunListener {
    fn file_started(
        &mut self,
        _index: usize,
        _total: usize,
        _path: &Path,
        _meta: &BinaryMetadata,
    ) {
    }
    fn case_finished(&mut self, _case: &TestCase) {}
    fn file_skipped(&mut self, _path: &Path, _reason: &str) {}
    fn file_finished(&mut self, _report: &FileReport) {}
}

/// Listener that ignores everything.
pub struct SilentListener;

impl RunListener for SilentListener {}

/// Everything recorded by a run, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<FileReport>,
    pub tally: Tally,
    pub cancelled: bool,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.tally.has_failures()
    }
}

pub struct Orchestrator<'a, R: Rng> {
    pub executor: &'a dyn ToolExecutor,
    pub tools: &'a ToolPaths,
    pub timeouts: &'a Timeouts,
    pub options: RunOptions,
    pub paths: PathGenerator<R>,
    pub cancel: CancelFlag,
    /// Parent of the per-file scratch directories; the system temp dir when unset.
    pub scratch_root: Option<PathBuf>,
}

impl<'a, R: Rng> Orchestrator<'a, R> {
    pub fn new(
        executor: &'a dyn ToolExecutor,
        tools: &'a ToolPaths,
        timeouts: &'a Timeouts,
        options: RunOptions,
        paths: PathGenerator<R>,
    ) -> Self {
        Self {
            executor,
            tools,
            timeouts,
            options,
            paths,
            cancel: CancelFlag::new(),
            scratch_root: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    fn candidate(&self) -> Result<&'a Path, HarnessError> {
        let tools: &'a ToolPaths = self.tools;
        let path = tools.candidate_tool.as_deref().ok_or(HarnessError::NoCandidate)?;
        if !path.is_file() {
            return Err(HarnessError::MissingCandidate(path.to_path_buf()));
        }
        Ok(path)
    }

    /// Test every file in order. Only fatal preconditions return `Err`;
    /// per-case problems are recorded as outcomes.
    pub fn run(
        &mut self,
        files: &[PathBuf],
        listener: &mut dyn RunListener,
    ) -> Result<RunSummary, HarnessError> {
        let candidate = self.candidate()?;
        if files.is_empty() {
            return Err(HarnessError::NoInputFiles);
        }

        let mut summary = RunSummary::default();
        for (idx, file) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                info!(remaining = files.len() - idx, "run interrupted");
                summary.cancelled = true;
                break;
            }
            let (report, finished) =
                self.test_file_until_cancelled(candidate, file, idx + 1, files.len(), listener);
            summary.tally.merge(&report.tally());
            listener.file_finished(&report);
            summary.reports.push(report);
            if !finished {
                info!(remaining = files.len() - idx - 1, "run interrupted");
                summary.cancelled = true;
                break;
            }
        }
        Ok(summary)
    }

    /// Run the selected operations against one file.
    pub fn test_file(
        &mut self,
        candidate: &Path,
        file: &Path,
        index: usize,
        total: usize,
        listener: &mut dyn RunListener,
    ) -> FileReport {
        self.test_file_until_cancelled(candidate, file, index, total, listener).0
    }

    /// Like `test_file`; the flag is false when cancellation cut the
    /// operation loop short.
    fn test_file_until_cancelled(
        &mut self,
        candidate: &Path,
        file: &Path,
        index: usize,
        total: usize,
        listener: &mut dyn RunListener,
    ) -> (FileReport, bool) {
        let extractor = MetadataExtractor::new(self.executor, self.tools, self.timeouts);
        let meta = extractor.inspect(file);
        listener.file_started(index, total, file, &meta);
        let mut report = FileReport::new(file, meta);

        if self.options.skip_fat && report.metadata.is_universal {
            listener.file_skipped(file, FAT_SKIP_MESSAGE);
            for kind in self.options.operations.clone() {
                let op = self.placeholder_operation(kind, &report.metadata);
                report.push(TestCase::new(op, Outcome::Skip, FAT_SKIP_MESSAGE));
            }
            return (report, true);
        }

        let kinds = self.options.operations.clone();
        let planned: Vec<Operation> = kinds
            .into_iter()
            .filter_map(|kind| {
                let op = self.plan(kind, &report.metadata);
                if op.is_none() {
                    debug!(file = %file.display(), op = %kind, "not applicable");
                }
                op
            })
            .collect();

        let scratch = match self.scratch_dir() {
            Ok(dir) => dir,
            Err(e) => {
                warn!(file = %file.display(), error = %e, "scratch directory unavailable");
                let message = format!("scratch directory unavailable: {e}");
                for op in planned {
                    let case = TestCase::new(op, Outcome::Error, message.clone());
                    listener.case_finished(&case);
                    report.push(case);
                }
                return (report, true);
            }
        };

        for op in planned {
            if self.cancel.is_cancelled() {
                return (report, false);
            }
            let case = self.run_case(candidate, file, scratch.path(), &extractor, op);
            listener.case_finished(&case);
            report.push(case);
        }

        (report, true)
    }

    fn scratch_dir(&self) -> io::Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("namediff-");
        match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
    }

    /// Operation for `kind` with generated arguments, or `None` when the file
    /// lacks what the operation needs.
    pub fn plan(&mut self, kind: OperationKind, meta: &BinaryMetadata) -> Option<Operation> {
        match kind {
            OperationKind::ChangeIdentity => {
                meta.identity_path.as_ref()?;
                Some(Operation::ChangeIdentity { new_path: self.paths.new_path() })
            }
            OperationKind::AddSearchPath => {
                Some(Operation::AddSearchPath { path: self.paths.new_path() })
            }
            OperationKind::DeleteSearchPath => {
                let first = meta.search_paths.first()?;
                Some(Operation::DeleteSearchPath { path: first.clone() })
            }
            OperationKind::RenameSearchPath => {
                let first = meta.search_paths.first()?;
                Some(Operation::RenameSearchPath {
                    old_path: first.clone(),
                    new_path: self.paths.new_path(),
                })
            }
            OperationKind::ChangeDependency => {
                let first = meta.referenced_libraries.first()?;
                Some(Operation::ChangeDependency {
                    old_path: first.clone(),
                    new_path: self.paths.new_path(),
                })
            }
        }
    }

    /// Operation recorded for cases that are never executed; falls back to
    /// empty arguments when the file does not support the kind.
    fn placeholder_operation(&mut self, kind: OperationKind, meta: &BinaryMetadata) -> Operation {
        self.plan(kind, meta).unwrap_or_else(|| match kind {
            OperationKind::ChangeIdentity => Operation::ChangeIdentity { new_path: String::new() },
            OperationKind::AddSearchPath => Operation::AddSearchPath { path: String::new() },
            OperationKind::DeleteSearchPath => Operation::DeleteSearchPath { path: String::new() },
            OperationKind::RenameSearchPath => {
                Operation::RenameSearchPath { old_path: String::new(), new_path: String::new() }
            }
            OperationKind::ChangeDependency => {
                Operation::ChangeDependency { old_path: String::new(), new_path: String::new() }
            }
        })
    }

    fn run_case(
        &self,
        candidate: &Path,
        file: &Path,
        scratch: &Path,
        extractor: &MetadataExtractor<'_>,
        op: Operation,
    ) -> TestCase {
        let kind = op.kind();
        let reference_out = scratch.join(format!("reference_{kind}.dylib"));
        let candidate_out = scratch.join(format!("candidate_{kind}.dylib"));

        let runner = ToolRunner::new(self.executor, self.timeouts.tool());
        let reference = Tool { role: ToolRole::Reference, path: &self.tools.reference_tool };
        let ref_run = runner.run(reference, file, &reference_out, &op);
        let candidate = Tool { role: ToolRole::Candidate, path: candidate };
        let cand_run = runner.run(candidate, file, &candidate_out, &op);

        if !ref_run.success {
            let message = format!("Reference tool failed: {}", ref_run.message);
            return TestCase::new(op, Outcome::Skip, message);
        }
        if !cand_run.success {
            let message = format!("Candidate tool failed: {}", cand_run.message);
            return TestCase::new(op, Outcome::Error, message);
        }

        let sizes = (file_size(&candidate_out), file_size(&reference_out));
        let comparator = Comparator::new(extractor);
        match comparator.compare(&reference_out, &candidate_out, self.options.strict) {
            Ok(cmp) if cmp.equivalent => {
                TestCase::new(op, Outcome::Pass, cmp.message).with_sizes(sizes.0, sizes.1)
            }
            Ok(cmp) => TestCase::new(op, Outcome::Fail, cmp.message).with_sizes(sizes.0, sizes.1),
            Err(e) => TestCase::new(op, Outcome::Error, format!("failed to read outputs: {e}"))
                .with_sizes(sizes.0, sizes.1),
        }
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

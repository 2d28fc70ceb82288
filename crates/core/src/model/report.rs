use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{BinaryMetadata, Operation};

/// Final verdict of one test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Both tools succeeded and the outputs are equivalent.
    Pass,
    /// Both tools succeeded but the outputs differ under the active policy.
    Fail,
    /// Not attempted, or the reference tool itself rejected the operation.
    Skip,
    /// The reference tool succeeded and the candidate did not.
    Error,
}

impl Outcome {
    pub fn label(self) -> &'static str {
        match self {
            Outcome::Pass => "PASS",
            Outcome::Fail => "FAIL",
            Outcome::Skip => "SKIP",
            Outcome::Error => "ERROR",
        }
    }
}

/// One operation applied to one file through both tools.
///
/// Built once its outcome is known; never revised afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub operation: Operation,
    pub outcome: Outcome,
    pub message: String,
    /// Output sizes in bytes; zero unless both tools produced a file.
    pub candidate_size: u64,
    pub reference_size: u64,
}

impl TestCase {
    pub fn new(operation: Operation, outcome: Outcome, message: impl Into<String>) -> Self {
        Self {
            name: operation.kind().as_str().to_string(),
            operation,
            outcome,
            message: message.into(),
            candidate_size: 0,
            reference_size: 0,
        }
    }

    pub fn with_sizes(mut self, candidate_size: u64, reference_size: u64) -> Self {
        self.candidate_size = candidate_size;
        self.reference_size = reference_size;
        self
    }
}

/// Ordered record of every case run against one input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileReport {
    pub path: PathBuf,
    /// Metadata captured before any mutation.
    pub metadata: BinaryMetadata,
    pub cases: Vec<TestCase>,
}

impl FileReport {
    pub fn new(path: impl Into<PathBuf>, metadata: BinaryMetadata) -> Self {
        Self { path: path.into(), metadata, cases: Vec::new() }
    }

    pub fn push(&mut self, case: TestCase) {
        self.cases.push(case);
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.cases.iter().filter(|c| c.outcome == outcome).count()
    }

    pub fn passed(&self) -> usize {
        self.count(Outcome::Pass)
    }

    pub fn failed(&self) -> usize {
        self.count(Outcome::Fail)
    }

    pub fn skipped(&self) -> usize {
        self.count(Outcome::Skip)
    }

    pub fn errors(&self) -> usize {
        self.count(Outcome::Error)
    }

    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for case in &self.cases {
            tally.record(case.outcome);
        }
        tally
    }
}

/// Outcome counters; only ever grow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl Tally {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Pass => self.passed += 1,
            Outcome::Fail => self.failed += 1,
            Outcome::Skip => self.skipped += 1,
            Outcome::Error => self.errors += 1,
        }
    }

    pub fn merge(&mut self, other: &Tally) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped + self.errors
    }

    /// True when any case failed or errored; drives the process exit code.
    pub fn has_failures(&self) -> bool {
        self.failed > 0 || self.errors > 0
    }
}

//! Metadata extraction from `otool -l` and `lipo -info` reports.
//!
//! Extraction is advisory: a missing tool, a timeout, a non-zero exit or an
//! unrecognised report all degrade to empty metadata instead of failing.

use std::ffi::OsString;
use std::path::Path;

use tracing::{debug, warn};

use crate::config::{Timeouts, ToolPaths};
use crate::model::BinaryMetadata;
use crate::services::process::ToolExecutor;

/// How many lines after a `cmd` marker are searched for its name/path field.
pub const LOOKAHEAD_LINES: usize = 10;

/// Phrase `lipo -info` prints only for multi-architecture containers.
pub const FAT_MARKER: &str = "Architectures in the fat file";

const ID_MARKER: &str = "cmd LC_ID_DYLIB";
const RPATH_MARKER: &str = "cmd LC_RPATH";
const DYLIB_MARKERS: [&str; 4] = [
    "cmd LC_LOAD_DYLIB",
    "cmd LC_LOAD_WEAK_DYLIB",
    "cmd LC_REEXPORT_DYLIB",
    "cmd LC_LAZY_LOAD_DYLIB",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Record {
    Identity,
    SearchPath,
    Library,
}

impl Record {
    fn classify(line: &str) -> Option<Self> {
        if line == ID_MARKER {
            Some(Record::Identity)
        } else if line == RPATH_MARKER {
            Some(Record::SearchPath)
        } else if DYLIB_MARKERS.contains(&line) {
            Some(Record::Library)
        } else {
            None
        }
    }

    fn field(self) -> &'static str {
        match self {
            Record::SearchPath => "path ",
            Record::Identity | Record::Library => "name ",
        }
    }
}

/// Parse an `otool -l` report into load-command metadata.
///
/// Each recognised `cmd` line opens a window of `LOOKAHEAD_LINES` lines in
/// which the first `name`/`path` field supplies the value, cut at the
/// trailing ` (offset N)` annotation. The first identity record wins; search
/// paths and libraries accumulate in report order. Anything else is ignored.
pub fn parse_load_commands(report: &str) -> BinaryMetadata {
    let lines: Vec<&str> = report.lines().collect();
    let mut meta = BinaryMetadata::default();

    for (i, line) in lines.iter().enumerate() {
        let Some(record) = Record::classify(line.trim()) else {
            continue;
        };
        let end = (i + LOOKAHEAD_LINES).min(lines.len());
        let value = lines[i..end].iter().find_map(|l| field_value(l, record.field()));
        let Some(value) = value else {
            continue;
        };
        match record {
            Record::Identity => {
                if meta.identity_path.is_none() {
                    meta.identity_path = Some(value);
                }
            }
            Record::SearchPath => meta.search_paths.push(value),
            Record::Library => meta.referenced_libraries.push(value),
        }
    }

    meta
}

fn field_value(line: &str, field: &str) -> Option<String> {
    let (_, rest) = line.split_once(field)?;
    let value = match rest.split_once(" (offset") {
        Some((value, _)) => value,
        None => rest,
    };
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// True when a `lipo -info` report describes a fat container.
pub fn is_fat_report(report: &str) -> bool {
    report.contains(FAT_MARKER)
}

/// Runs the introspection tools against a file and parses their output.
pub struct MetadataExtractor<'a> {
    pub executor: &'a dyn ToolExecutor,
    pub tools: &'a ToolPaths,
    pub timeouts: &'a Timeouts,
}

impl<'a> MetadataExtractor<'a> {
    pub fn new(
        executor: &'a dyn ToolExecutor,
        tools: &'a ToolPaths,
        timeouts: &'a Timeouts,
    ) -> Self {
        Self { executor, tools, timeouts }
    }

    /// Full snapshot: load commands plus the universal flag.
    pub fn inspect(&self, path: &Path) -> BinaryMetadata {
        let mut meta = self.load_commands(path);
        meta.is_universal = self.is_universal(path);
        debug!(
            path = %path.display(),
            identity = ?meta.identity_path,
            rpaths = meta.search_paths.len(),
            dylibs = meta.referenced_libraries.len(),
            universal = meta.is_universal,
            "inspected"
        );
        meta
    }

    /// Load-command metadata only; `is_universal` is left false.
    pub fn load_commands(&self, path: &Path) -> BinaryMetadata {
        let args = [OsString::from("-l"), path.as_os_str().to_os_string()];
        match self.executor.execute(&self.tools.otool, &args, self.timeouts.inspect()) {
            Ok(output) if output.success() => {
                let meta = parse_load_commands(&output.stdout);
                if meta.is_empty() {
                    debug!(path = %path.display(), "no install-name load commands recognised");
                }
                meta
            }
            Ok(output) => {
                debug!(path = %path.display(), code = ?output.code, "otool rejected file");
                BinaryMetadata::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "load-command listing unavailable");
                BinaryMetadata::default()
            }
        }
    }

    /// Whether the architecture lister reports more than one slice.
    pub fn is_universal(&self, path: &Path) -> bool {
        let args = [OsString::from("-info"), path.as_os_str().to_os_string()];
        match self.executor.execute(&self.tools.lipo, &args, self.timeouts.arch()) {
            Ok(output) => is_fat_report(&output.stdout),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "architecture listing unavailable");
                false
            }
        }
    }
}

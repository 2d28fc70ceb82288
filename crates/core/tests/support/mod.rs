//! Simulated Mach-O toolchain for driving the engine without real tools.
//!
//! A fake dylib is a text file holding an `otool -l` style report. The fake
//! `otool` prints the file back, the fake `lipo` looks for a `fat: yes`
//! header, and the fake editors parse the report, apply the requested
//! edit and write the report back.

#![allow(dead_code)]

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use namediff_core::config::ToolPaths;
use namediff_core::model::BinaryMetadata;
use namediff_core::services::inspect::parse_load_commands;
use namediff_core::services::process::{ExecError, ProcessOutput, ToolExecutor};

pub const REFERENCE: &str = "reference";
pub const CANDIDATE: &str = "candidate";
pub const OTOOL: &str = "otool";
pub const LIPO: &str = "lipo";

const FAT_HEADER: &str = "fat: yes";
const PADDING: &str = "\n# alignment padding\n";

/// Behaviour of a simulated install-name editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorMode {
    /// Applies the edit like the real tool.
    Correct,
    /// Correct, plus trailing bytes that carry no load-command meaning.
    Pads,
    /// Reports success for `-delete_rpath` without removing anything.
    IgnoresDelete,
    /// Always exits 1 with a diagnostic.
    Fails,
    /// Always exits 1 with an empty error stream.
    FailsSilently,
    /// Executable cannot be found.
    Missing,
    /// Never finishes within the timeout.
    Hangs,
}

pub struct FakeToolchain {
    pub reference: EditorMode,
    pub candidate: EditorMode,
    pub otool_available: bool,
    calls: Mutex<Vec<String>>,
}

impl Default for FakeToolchain {
    fn default() -> Self {
        Self::new(EditorMode::Correct, EditorMode::Correct)
    }
}

impl FakeToolchain {
    pub fn new(reference: EditorMode, candidate: EditorMode) -> Self {
        Self { reference, candidate, otool_available: true, calls: Mutex::new(Vec::new()) }
    }

    pub fn candidate(mode: EditorMode) -> Self {
        Self::new(EditorMode::Correct, mode)
    }

    /// Program names and flags of every invocation, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn editor_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(REFERENCE) || c.starts_with(CANDIDATE))
            .collect()
    }
}

impl ToolExecutor for FakeToolchain {
    fn execute(
        &self,
        program: &Path,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<ProcessOutput, ExecError> {
        let name = program.file_name().and_then(|n| n.to_str()).unwrap_or_default().to_string();
        let args: Vec<String> = args.iter().map(|a| a.to_string_lossy().to_string()).collect();
        let flag = args.first().cloned().unwrap_or_default();
        self.calls.lock().unwrap().push(format!("{name} {flag}"));

        let target = PathBuf::from(args.last().cloned().unwrap_or_default());
        match name.as_str() {
            OTOOL if !self.otool_available => Err(ExecError::NotFound(program.to_path_buf())),
            OTOOL => Ok(ok(fs::read_to_string(&target)?)),
            LIPO => {
                let body = fs::read_to_string(&target)?;
                if body.starts_with(FAT_HEADER) {
                    Ok(ok("Architectures in the fat file: lib are: x86_64 arm64\n"))
                } else {
                    Ok(ok("Non-fat file: lib is architecture: arm64\n"))
                }
            }
            REFERENCE => edit(self.reference, program, &args, timeout),
            CANDIDATE => edit(self.candidate, program, &args, timeout),
            _ => Err(ExecError::NotFound(program.to_path_buf())),
        }
    }
}

fn edit(
    mode: EditorMode,
    program: &Path,
    args: &[String],
    timeout: Duration,
) -> Result<ProcessOutput, ExecError> {
    match mode {
        EditorMode::Missing => return Err(ExecError::NotFound(program.to_path_buf())),
        EditorMode::Hangs => return Err(ExecError::Timeout(timeout)),
        EditorMode::Fails => return Ok(failure("error: simulated failure")),
        EditorMode::FailsSilently => return Ok(failure("")),
        _ => {}
    }

    let target = PathBuf::from(&args[args.len() - 1]);
    let body = fs::read_to_string(&target)?;
    let fat = body.starts_with(FAT_HEADER);
    let mut meta = parse_load_commands(&body);
    meta.is_universal = fat;

    match args[0].as_str() {
        "-id" => {
            let new = &args[1];
            match &meta.identity_path {
                None => return Ok(failure("error: input file has no LC_ID_DYLIB")),
                Some(current) if current == new => {
                    return Ok(failure("error: new install name is the same as the current one"))
                }
                Some(_) => meta.identity_path = Some(new.clone()),
            }
        }
        "-add_rpath" => {
            let path = &args[1];
            if meta.search_paths.contains(path) {
                return Ok(failure(&format!("error: would duplicate path: {path}")));
            }
            meta.search_paths.push(path.clone());
        }
        "-delete_rpath" => {
            let path = &args[1];
            let Some(pos) = meta.search_paths.iter().position(|p| p == path) else {
                return Ok(failure(&format!("error: no LC_RPATH load command with path: {path}")));
            };
            if mode != EditorMode::IgnoresDelete {
                meta.search_paths.remove(pos);
            }
        }
        "-rpath" => {
            let (old, new) = (&args[1], &args[2]);
            let Some(pos) = meta.search_paths.iter().position(|p| p == old) else {
                return Ok(failure(&format!("error: no LC_RPATH load command with path: {old}")));
            };
            meta.search_paths[pos] = new.clone();
        }
        "-change" => {
            let (old, new) = (&args[1], &args[2]);
            for lib in meta.referenced_libraries.iter_mut().filter(|l| l.as_str() == old.as_str()) {
                *lib = new.clone();
            }
        }
        other => return Ok(failure(&format!("error: unknown option: {other}"))),
    }

    let mut out = render(&meta);
    if mode == EditorMode::Pads {
        out.push_str(PADDING);
    }
    fs::write(&target, out)?;
    Ok(ok(""))
}

pub fn ok(stdout: impl Into<String>) -> ProcessOutput {
    ProcessOutput { code: Some(0), stdout: stdout.into(), stderr: String::new() }
}

pub fn failure(stderr: &str) -> ProcessOutput {
    ProcessOutput { code: Some(1), stdout: String::new(), stderr: stderr.to_string() }
}

/// Render metadata as an `otool -l` style report.
pub fn render(meta: &BinaryMetadata) -> String {
    let mut out = String::new();
    if meta.is_universal {
        out.push_str(FAT_HEADER);
        out.push('\n');
    }
    out.push_str("fake.dylib:\n");
    let mut index = 0;
    let mut command = |out: &mut String, cmd: &str, field: &str, value: &str| {
        out.push_str(&format!("Load command {index}\n"));
        out.push_str(&format!("          cmd {cmd}\n"));
        out.push_str(&format!("      cmdsize {}\n", 24 + value.len()));
        out.push_str(&format!("{field:>13} {value} (offset 24)\n"));
        index += 1;
    };
    if let Some(id) = &meta.identity_path {
        command(&mut out, "LC_ID_DYLIB", "name", id);
    }
    for lib in &meta.referenced_libraries {
        command(&mut out, "LC_LOAD_DYLIB", "name", lib);
    }
    for rpath in &meta.search_paths {
        command(&mut out, "LC_RPATH", "path", rpath);
    }
    out
}

pub fn metadata(identity: Option<&str>, rpaths: &[&str], dylibs: &[&str]) -> BinaryMetadata {
    BinaryMetadata {
        identity_path: identity.map(str::to_string),
        search_paths: rpaths.iter().map(|s| s.to_string()).collect(),
        referenced_libraries: dylibs.iter().map(|s| s.to_string()).collect(),
        is_universal: false,
    }
}

/// The library used throughout the scenarios.
pub fn foo_metadata() -> BinaryMetadata {
    metadata(
        Some("@rpath/lib/libFoo.dylib"),
        &["@loader_path/../lib"],
        &["/usr/lib/libSystem.B.dylib"],
    )
}

pub fn write_fake_dylib(dir: &Path, name: &str, meta: &BinaryMetadata) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, render(meta)).unwrap();
    path
}

/// Tool paths whose file names route to the fake toolchain. The candidate
/// exists on disk so run-level preflight checks pass.
pub fn fake_tools(dir: &Path) -> ToolPaths {
    let candidate = dir.join(CANDIDATE);
    fs::write(&candidate, b"#!fake").unwrap();
    ToolPaths {
        reference_tool: PathBuf::from(REFERENCE),
        candidate_tool: Some(candidate),
        otool: PathBuf::from(OTOOL),
        lipo: PathBuf::from(LIPO),
    }
}

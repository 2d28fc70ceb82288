//! Runs one install-name editor against a private, writable copy of the input.

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use tracing::debug;

use crate::model::Operation;
use crate::services::process::{ExecError, ToolExecutor};

/// Which side of the comparison a tool plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolRole {
    Reference,
    Candidate,
}

impl fmt::Display for ToolRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolRole::Reference => f.write_str("reference tool"),
            ToolRole::Candidate => f.write_str("candidate tool"),
        }
    }
}

/// An install-name editor executable and its role.
#[derive(Debug, Clone, Copy)]
pub struct Tool<'p> {
    pub role: ToolRole,
    pub path: &'p Path,
}

/// Result of one tool invocation; `message` is empty on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    pub success: bool,
    pub message: String,
}

impl ToolRun {
    fn ok() -> Self {
        Self { success: true, message: String::new() }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self { success: false, message: message.into() }
    }
}

pub struct ToolRunner<'a> {
    pub executor: &'a dyn ToolExecutor,
    pub timeout: Duration,
}

impl<'a> ToolRunner<'a> {
    pub fn new(executor: &'a dyn ToolExecutor, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// Copy `input` to `output`, then apply `operation` to `output` in place.
    pub fn run(
        &self,
        tool: Tool<'_>,
        input: &Path,
        output: &Path,
        operation: &Operation,
    ) -> ToolRun {
        if let Err(e) = safe_copy(input, output) {
            return ToolRun::failed(format!("failed to copy {}: {e}", input.display()));
        }

        let mut args: Vec<OsString> =
            operation.tool_args().into_iter().map(OsString::from).collect();
        args.push(output.as_os_str().to_os_string());

        let run = match self.executor.execute(tool.path, &args, self.timeout) {
            Ok(out) if out.success() => ToolRun::ok(),
            Ok(out) => {
                let stderr = out.stderr.trim();
                if stderr.is_empty() {
                    ToolRun::failed("unknown error")
                } else {
                    ToolRun::failed(stderr)
                }
            }
            Err(ExecError::Timeout(_)) => ToolRun::failed("timeout"),
            Err(ExecError::NotFound(path)) => {
                ToolRun::failed(format!("{} not found at {}", tool.role, path.display()))
            }
            Err(ExecError::Io(e)) => ToolRun::failed(format!("failed to run {}: {e}", tool.role)),
        };
        debug!(role = %tool.role, op = %operation.kind(), success = run.success, "tool finished");
        run
    }
}

/// Copy file contents and read/write permission bits, nothing else.
///
/// Extended attributes and file flags are not carried over, and the copy is
/// always owner-writable even when the source is a read-only system library.
pub fn safe_copy(src: &Path, dst: &Path) -> io::Result<u64> {
    let mut reader = fs::File::open(src)?;
    let mut writer = fs::File::create(dst)?;
    let copied = io::copy(&mut reader, &mut writer)?;
    drop(writer);

    let src_perms = fs::metadata(src)?.permissions();
    fs::set_permissions(dst, writable(src_perms))?;
    Ok(copied)
}

#[cfg(unix)]
fn writable(perms: fs::Permissions) -> fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    fs::Permissions::from_mode((perms.mode() & 0o666) | 0o600)
}

#[cfg(not(unix))]
fn writable(mut perms: fs::Permissions) -> fs::Permissions {
    perms.set_readonly(false);
    perms
}

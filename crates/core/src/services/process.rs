//! Process-execution capability shared by every external tool the harness
//! drives: the two install-name editors and the introspection tools.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Exit status and captured streams of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Executable not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Process timed out after {0:?}")]
    Timeout(Duration),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Runs an external program to completion or until `timeout` elapses.
///
/// Implemented by `SystemExecutor` for real runs; tests substitute scripted
/// executors so no Mach-O tooling is needed.
pub trait ToolExecutor: Send + Sync {
    fn execute(
        &self,
        program: &Path,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<ProcessOutput, ExecError>;
}

/// Executor backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemExecutor;

impl ToolExecutor for SystemExecutor {
    fn execute(
        &self,
        program: &Path,
        args: &[OsString],
        timeout: Duration,
    ) -> Result<ProcessOutput, ExecError> {
        debug!(program = %program.display(), ?args, "spawning");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => ExecError::NotFound(program.to_path_buf()),
                _ => ExecError::Io(e),
            })?;

        let deadline = Instant::now() + timeout;
        // Drain both pipes while waiting; otool reports can exceed the pipe buffer.
        let (tx, rx) = mpsc::channel();
        let mut pending = 0;
        if let Some(pipe) = child.stdout.take() {
            drain(Stream::Stdout, pipe, tx.clone());
            pending += 1;
        }
        if let Some(pipe) = child.stderr.take() {
            drain(Stream::Stderr, pipe, tx.clone());
            pending += 1;
        }
        drop(tx);

        let status = match child.wait_timeout(timeout)? {
            Some(status) => status,
            None => {
                warn!(program = %program.display(), ?timeout, "process timed out; killing");
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExecError::Timeout(timeout));
            }
        };

        // A background process started by the tool may keep the pipes open
        // after it exits; the readers are then abandoned at the deadline.
        let mut output = ProcessOutput { code: status.code(), ..ProcessOutput::default() };
        while pending > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(remaining) {
                Ok((Stream::Stdout, bytes)) => output.stdout = decode(&bytes),
                Ok((Stream::Stderr, bytes)) => output.stderr = decode(&bytes),
                Err(RecvTimeoutError::Timeout) => {
                    warn!(program = %program.display(), ?timeout, "output still open after exit");
                    return Err(ExecError::Timeout(timeout));
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
            pending -= 1;
        }
        Ok(output)
    }
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

fn drain<R: Read + Send + 'static>(stream: Stream, mut pipe: R, tx: Sender<(Stream, Vec<u8>)>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send((stream, buf));
    });
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).to_string()
}

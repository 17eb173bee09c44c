//! Scoped execution of external commands.
//!
//! A spawned child is owned by a guard for the whole call. Whether the
//! call returns normally, times out, errors, or unwinds, the guard kills
//! and reaps the child before control leaves [`ScopedCommand::run`].

use crate::error::{MigrateError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// Output of a finished command.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

/// A command run to completion inside one call.
#[derive(Debug, Clone)]
pub struct ScopedCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Duration,
}

impl ScopedCommand {
    /// Creates a command with a five minute timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
            timeout: Duration::from_secs(300),
        }
    }

    /// Splits a command line on whitespace. Returns `None` if it is blank.
    pub fn parse(command_line: &str) -> Option<Self> {
        let mut words = command_line.split_whitespace();
        let program = words.next()?;
        Some(Self::new(program).args(words))
    }

    /// Appends an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Sets the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// The command line, for messages.
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Runs the command and waits for it.
    ///
    /// A non-zero exit is returned as an unsuccessful [`ProcessOutput`];
    /// failing to spawn and exceeding the timeout are errors.
    pub fn run(&self) -> Result<ProcessOutput> {
        let start = Instant::now();

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        debug!(command = %self.display(), "spawning");
        let child = cmd.spawn().map_err(|e| self.error(e.to_string()))?;
        let mut guard = ChildGuard::new(child);

        // Drain both pipes so a chatty child cannot block on a full buffer.
        let stdout = guard.child_mut().stdout.take().map(drain);
        let stderr = guard.child_mut().stderr.take().map(drain);

        let status = guard
            .wait_timeout(self.timeout)
            .map_err(|e| self.error(e.to_string()))?;

        let Some(status) = status else {
            drop(guard);
            warn!(command = %self.display(), timeout = ?self.timeout, "command timed out");
            return Err(self.error(format!("timed out after {:?}", self.timeout)));
        };

        Ok(ProcessOutput {
            success: status.success(),
            exit_code: status.code(),
            stdout: collect(stdout),
            stderr: collect(stderr),
            duration: start.elapsed(),
        })
    }

    fn error(&self, message: String) -> MigrateError {
        MigrateError::Process {
            command: self.display(),
            message,
        }
    }
}

/// Owns a child process until it has been reaped.
struct ChildGuard {
    child: Child,
    reaped: bool,
}

impl ChildGuard {
    fn new(child: Child) -> Self {
        Self { child, reaped: false }
    }

    fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    fn wait_timeout(&mut self, timeout: Duration) -> std::io::Result<Option<ExitStatus>> {
        let status = self.child.wait_timeout(timeout)?;
        self.reaped = status.is_some();
        Ok(status)
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        buf
    })
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|buf| String::from_utf8_lossy(&buf).into_owned())
        .unwrap_or_default()
}

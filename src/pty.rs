//! Process supervision under a pseudo-terminal
//!
//! The transporter buffers differently when its output is a pipe, so it is
//! run attached to a pty. Its merged output is split into lines and handed to
//! a callback one at a time, in arrival order, before the next read.
//!
//! The working-directory change needed by the Java strategy is process-wide.
//! Only one supervised run may be active at a time; concurrent runs from
//! several threads are not supported.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use crate::command::Command;
use crate::error::TransportError;

/// Shell used to interpret command lines.
pub const SHELL: &str = "/bin/sh";

/// Exit status of `sh` when the command could not be found.
const COMMAND_NOT_FOUND: u32 = 127;

/// `EIO`: reading a pty master after the child side closed.
#[cfg(unix)]
const EIO: i32 = 5;

/// Callback receiving each output line. Returning an error stops the run.
pub type LineHandler<'a> = dyn FnMut(&str) -> Result<(), TransportError> + 'a;

/// How the process ended, independent of what it printed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// Process-level failure: spawn error, unreadable output, missing binary
    pub exception: Option<String>,
    /// Exit status of the child, if it was reaped
    pub exit_status: Option<u32>,
}

impl ProcessOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            exception: Some(message.into()),
            exit_status: None,
        }
    }
}

/// Runs a command and streams its output lines
pub trait ProcessRunner: Send + Sync {
    /// Run `command` to completion, calling `on_line` for every line.
    ///
    /// Failures of the process itself are reported in the returned
    /// [`ProcessOutcome`]; `Err` is only returned when `on_line` fails, after
    /// the child has been killed.
    fn run(
        &self,
        command: &Command,
        on_line: &mut LineHandler<'_>,
    ) -> Result<ProcessOutcome, TransportError>;
}

/// Changes the process working directory and restores it on drop.
pub struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    pub fn enter(dir: &Path) -> Result<Self, std::io::Error> {
        let previous = std::env::current_dir()?;
        std::env::set_current_dir(dir)?;
        Ok(Self { previous })
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(
                dir = %self.previous.display(),
                error = %e,
                "failed to restore working directory"
            );
        }
    }
}

/// [`ProcessRunner`] backed by the native pty system
pub struct PtySupervisor {
    size: PtySize,
}

impl Default for PtySupervisor {
    fn default() -> Self {
        Self {
            size: PtySize {
                rows: 24,
                cols: 160,
                pixel_width: 0,
                pixel_height: 0,
            },
        }
    }
}

impl PtySupervisor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProcessRunner for PtySupervisor {
    fn run(
        &self,
        command: &Command,
        on_line: &mut LineHandler<'_>,
    ) -> Result<ProcessOutcome, TransportError> {
        let _guard = match command.working_dir() {
            Some(dir) => match WorkingDirGuard::enter(dir) {
                Ok(guard) => Some(guard),
                Err(e) => {
                    return Ok(ProcessOutcome::failed(format!(
                        "cannot change into {}: {}",
                        dir.display(),
                        e
                    )))
                }
            },
            None => None,
        };

        let program = command.program();
        if program.is_absolute() && !program.exists() {
            return Ok(ProcessOutcome::failed(format!(
                "No such file or directory - {}",
                program.display()
            )));
        }

        let pair = match native_pty_system().openpty(self.size) {
            Ok(pair) => pair,
            Err(e) => return Ok(ProcessOutcome::failed(format!("failed to open pty: {}", e))),
        };

        let mut builder = CommandBuilder::new(SHELL);
        builder.arg("-c");
        builder.arg(command.line());
        // portable-pty would otherwise start the child in $HOME.
        match std::env::current_dir() {
            Ok(cwd) => builder.cwd(cwd),
            Err(e) => return Ok(ProcessOutcome::failed(e.to_string())),
        }

        tracing::debug!(program = %program.display(), "spawning transporter");
        let mut child = match pair.slave.spawn_command(builder) {
            Ok(child) => child,
            Err(e) => {
                return Ok(ProcessOutcome::failed(format!(
                    "failed to execute '{}': {}",
                    program.display(),
                    e
                )))
            }
        };
        // The master only sees EOF once every slave handle is closed.
        drop(pair.slave);

        let reader = match pair.master.try_clone_reader() {
            Ok(reader) => reader,
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Ok(ProcessOutcome::failed(format!("failed to read pty: {}", e)));
            }
        };

        let mut outcome = ProcessOutcome::default();
        match pump_lines(BufReader::new(reader), on_line) {
            Ok(None) => {}
            Ok(Some(read_error)) => outcome.exception = Some(read_error),
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(e);
            }
        }

        match child.wait() {
            Ok(status) => {
                let code = status.exit_code();
                tracing::debug!(exit_status = code, "transporter exited");
                if code == COMMAND_NOT_FOUND && outcome.exception.is_none() {
                    outcome.exception = Some(format!(
                        "failed to execute '{}': command not found",
                        program.display()
                    ));
                }
                outcome.exit_status = Some(code);
            }
            Err(e) => {
                outcome.exception.get_or_insert_with(|| e.to_string());
            }
        }

        Ok(outcome)
    }
}

/// Read `reader` to the end, delivering each complete line.
///
/// A trailing fragment without a newline is delivered once the stream ends.
/// Returns the text of a read failure other than end of stream.
pub fn pump_lines<R: BufRead>(
    mut reader: R,
    on_line: &mut LineHandler<'_>,
) -> Result<Option<String>, TransportError> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf) {
            Ok(0) => return Ok(None),
            Ok(_) => on_line(&decode_line(&buf))?,
            Err(e) => {
                if !buf.is_empty() {
                    on_line(&decode_line(&buf))?;
                }
                if is_end_of_stream(&e) {
                    return Ok(None);
                }
                return Ok(Some(format!("failed to read transporter output: {}", e)));
            }
        }
    }
}

fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(|c| c == '\n' || c == '\r')
        .to_string()
}

#[cfg(unix)]
fn is_end_of_stream(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(EIO)
}

#[cfg(not(unix))]
fn is_end_of_stream(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::BrokenPipe
}

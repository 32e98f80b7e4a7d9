//! itms-transporter: drive Apple's iTMSTransporter and make sense of its output
//!
//! The transporter has no machine-readable output. It prints human-oriented
//! log lines on an interactive terminal, so this crate runs it under a
//! pseudo-terminal, classifies every line as it arrives, and reduces the run
//! to a single outcome plus the diagnostics that explain it.
//!
//! # Overview
//!
//! ```text
//! TransportSession ──▶ Executor (shell script | java) ──▶ Command
//!        │
//!        └──▶ ProcessRunner (pty) ──lines──▶ OutputParser ──▶ TransferReport
//! ```
//!
//! # Line classes
//!
//! | Pattern | Effect |
//! |---------|--------|
//! | known noise | ignored |
//! | `> ERROR: text` | appended to errors, may raise a [`Signal`] |
//! | `> WARN: text` | appended to warnings |
//! | `> DBG-X: Returning N` | `N != 0` aborts with [`ErrorKind::Transfer`] |
//! | `> text` | echoed at debug level unless output is hidden |
//!
//! # Outcomes
//!
//! - `Ok(report)` with `report.success == false` - soft failure: captured
//!   errors, spawn failure, or a missing download package
//! - `Err(e)` with `e.kind == ErrorKind::Transfer` - the transporter itself
//!   returned a non-zero status

mod classifier;
mod command;
mod config;
mod error;
mod escape;
mod executor;
mod parser;
mod pty;
mod session;

pub use classifier::{classify_line, rule_names, Classification, LineKind, Signal, SKIP_ERRORS};
pub use command::{
    package_path, Command, Credentials, TransferMode, PACKAGE_EXTENSION, PASSWORD_PLACEHOLDER,
};
pub use config::{
    Strategy, TransporterConfig, TransporterPaths, DEFAULT_ITMS_PATH,
    ENV_ADDITIONAL_UPLOAD_PARAMETERS, ENV_AVOID_SHELL_SCRIPT, ENV_ITMS_PATH,
};
pub use error::{ErrorKind, TransportError};
pub use escape::{escape_password, shell_escape};
pub use executor::{executor_for, BoxedExecutor, Executor, JavaExecutor, ShellScriptExecutor};
pub use parser::{Diagnostics, OutputParser};
pub use pty::{
    pump_lines, LineHandler, ProcessOutcome, ProcessRunner, PtySupervisor, WorkingDirGuard,
};
pub use session::{
    password_is_safe, CredentialStore, NoopCredentialStore, TransferReport, TransportSession,
    DEFAULT_DOWNLOAD_DIR,
};

//! Transport sessions
//!
//! A [`TransportSession`] runs one upload or one download at a time: it
//! builds the command, runs it under the supervisor, feeds the output to a
//! fresh [`OutputParser`], and applies the filesystem post-conditions.
//!
//! Soft failures come back as a [`TransferReport`] with `success == false`.
//! A non-zero transporter return code comes back as
//! [`ErrorKind::Transfer`](crate::ErrorKind::Transfer).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use crate::classifier::Signal;
use crate::command::{package_path, Command, Credentials};
use crate::config::TransporterConfig;
use crate::error::TransportError;
use crate::executor::{executor_for, BoxedExecutor};
use crate::parser::{Diagnostics, OutputParser};
use crate::pty::{ProcessRunner, PtySupervisor};

/// Destination used when a download names none.
pub const DEFAULT_DOWNLOAD_DIR: &str = "/tmp";

const RERUN_GUIDANCE: &str = "Please run this tool again to apply the new password";
const BUILD_NUMBER_GUIDANCE: &str =
    "You have to change the build number of your app to upload your ipa file";
const SPECIAL_CHARACTERS_GUIDANCE: &str = "Password contains special characters, which may not \
    be handled properly by iTMSTransporter. If you experience problems uploading to iTunes \
    Connect, please consider changing your password to something with only alphanumeric characters.";
const GENERIC_FAILURE_GUIDANCE: &str = "Could not download/upload from iTunes Connect! It's \
    probably related to your password or your internet connection.";

/// Stored-credential collaborator
pub trait CredentialStore: Send + Sync {
    /// Forget the stored password of `user` so the next run asks again.
    fn invalidate_credentials(&self, user: &str);
}

/// A store that keeps nothing
#[derive(Debug, Default)]
pub struct NoopCredentialStore;

impl CredentialStore for NoopCredentialStore {
    fn invalidate_credentials(&self, user: &str) {
        tracing::debug!(user, "no credential store configured, nothing to invalidate");
    }
}

/// Outcome of one upload or download
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub success: bool,
    /// Side-signals raised by the transporter output
    pub signals: BTreeSet<Signal>,
    pub diagnostics: Diagnostics,
    /// Actionable messages shown to the user, in the order they were raised
    pub guidance: Vec<String>,
}

impl TransferReport {
    pub fn has_signal(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    fn advise(&mut self, message: &str) {
        if !self.guidance.iter().any(|g| g == message) {
            self.guidance.push(message.to_string());
        }
    }
}

/// `true` if the transporter is known to handle every character of `password`.
pub fn password_is_safe(password: &str) -> bool {
    password
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '$' | '_'))
}

/// Drives the transporter for one set of credentials
pub struct TransportSession {
    config: TransporterConfig,
    credentials: Credentials,
    executor: BoxedExecutor,
    runner: Box<dyn ProcessRunner>,
    credential_store: Arc<dyn CredentialStore>,
}

impl TransportSession {
    /// Create a session using the pty supervisor and no credential store.
    pub fn new(config: TransporterConfig, credentials: Credentials) -> Self {
        let executor = executor_for(&config);
        Self {
            config,
            credentials,
            executor,
            runner: Box::new(PtySupervisor::new()),
            credential_store: Arc::new(NoopCredentialStore),
        }
    }

    pub fn with_runner(mut self, runner: Box<dyn ProcessRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.credential_store = store;
        self
    }

    /// The download command, with the password masked unless `reveal` is set.
    pub fn download_command(&self, app_id: &str, dir: &Path, reveal: bool) -> Command {
        let credentials = self.credentials_for_display(reveal);
        self.executor.build_download_command(&credentials, app_id, dir)
    }

    /// The upload command for the package of `app_id` under `dir`, with the
    /// password masked unless `reveal` is set.
    pub fn upload_command(&self, app_id: &str, dir: &Path, reveal: bool) -> Command {
        let credentials = self.credentials_for_display(reveal);
        self.executor
            .build_upload_command(&credentials, &package_path(dir, app_id))
    }

    fn credentials_for_display(&self, reveal: bool) -> Credentials {
        if reveal {
            self.credentials.clone()
        } else {
            self.credentials.masked()
        }
    }

    /// Download the latest metadata package of `app_id` into `dir`
    /// (`/tmp` when `None`).
    ///
    /// Succeeds only if the transporter run is clean and
    /// `<dir>/<app_id>.itmsp` exists afterwards.
    pub fn download(&self, app_id: &str, dir: Option<&Path>) -> Result<TransferReport, TransportError> {
        validate_app_id(app_id)?;
        let dir = dir.unwrap_or_else(|| Path::new(DEFAULT_DOWNLOAD_DIR));

        tracing::info!("Going to download app metadata from iTunes Connect");
        let command = self.download_command(app_id, dir, true);
        tracing::debug!("{}", self.download_command(app_id, dir, false).line());

        let mut report = self.execute(&command)?;
        if self.config.test_mode {
            return Ok(report);
        }

        let itmsp_path = package_path(dir, app_id);
        report.success = report.success && itmsp_path.is_dir();

        if report.success {
            tracing::info!(
                "Successfully downloaded the latest package from iTunes Connect to {}",
                itmsp_path.display()
            );
        } else {
            self.handle_error(&mut report);
        }
        Ok(report)
    }

    /// Upload the package `<dir>/<app_id>.itmsp`.
    ///
    /// The package directory is removed after a successful upload.
    pub fn upload(&self, app_id: &str, dir: &Path) -> Result<TransferReport, TransportError> {
        validate_app_id(app_id)?;
        let package = package_path(dir, app_id);

        tracing::info!("Going to upload updated app to iTunes Connect");
        tracing::info!("This might take a few minutes, please don't interrupt the script");

        let command = self.upload_command(app_id, dir, true);
        tracing::debug!("{}", self.upload_command(app_id, dir, false).line());

        let mut report = self.execute(&command)?;

        if report.success {
            let rule = "-".repeat(102);
            tracing::info!("{}", rule);
            tracing::info!(
                "Successfully uploaded package to iTunes Connect. It might take a few minutes until it's visible online."
            );
            tracing::info!("{}", rule);

            if !self.config.test_mode {
                remove_package(&package);
            }
        } else {
            self.handle_error(&mut report);
        }
        Ok(report)
    }

    /// Run `command` and interpret its output.
    fn execute(&self, command: &Command) -> Result<TransferReport, TransportError> {
        if self.config.hide_output {
            tracing::info!("Waiting for iTunes Connect transporter to be finished.");
            tracing::info!("iTunes Transporter progress... this might take a few minutes...");
        }

        let mut parser = OutputParser::new(self.config.hide_output);
        let mut report = TransferReport::default();

        let result = {
            let mut on_line = |line: &str| -> Result<(), TransportError> {
                let classification = parser.parse_line(line)?;
                match classification.signal {
                    Some(Signal::InvalidCredentials) if !self.config.test_mode => {
                        self.credential_store
                            .invalidate_credentials(&self.credentials.user);
                        tracing::error!("{}", RERUN_GUIDANCE);
                        report.advise(RERUN_GUIDANCE);
                    }
                    Some(Signal::RedundantBinaryUpload) => report.advise(BUILD_NUMBER_GUIDANCE),
                    _ => {}
                }
                Ok(())
            };
            self.runner.run(command, &mut on_line)
        };
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                return Err(e
                    .with_signals(parser.signals().clone())
                    .with_guidance(report.guidance))
            }
        };

        if let Some(exception) = outcome.exception {
            parser.record_exception(exception);
        }
        parser.record_exit_status(outcome.exit_status);
        parser.flush();

        let (diagnostics, signals) = parser.finish();
        report.success = diagnostics.is_clean();
        report.diagnostics = diagnostics;
        report.signals = signals;
        Ok(report)
    }

    fn handle_error(&self, report: &mut TransferReport) {
        if !password_is_safe(self.credentials.password()) {
            tracing::warn!("{}", SPECIAL_CHARACTERS_GUIDANCE);
            report.advise(SPECIAL_CHARACTERS_GUIDANCE);
        }
        tracing::error!("{}", GENERIC_FAILURE_GUIDANCE);
        report.advise(GENERIC_FAILURE_GUIDANCE);
    }
}

fn validate_app_id(app_id: &str) -> Result<(), TransportError> {
    if app_id.trim().is_empty() {
        return Err(TransportError::input("app id must not be empty"));
    }
    Ok(())
}

fn remove_package(package: &Path) {
    match std::fs::remove_dir_all(package) {
        Ok(()) => tracing::debug!(path = %package.display(), "removed uploaded package"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            path = %package.display(),
            error = %e,
            "failed to remove uploaded package"
        ),
    }
}

//! Invocation through the `iTMSTransporter` wrapper script

use std::path::Path;
use super::{Executor, KEYSTORE_SIZE, TRANSFER_PROTOCOL};
use crate::command::{Command, Credentials, TransferMode};
use crate::config::TransporterPaths;
use crate::escape::escape_password;

/// Runs the transporter through its shell script.
///
/// The script changes into its install directory by itself, so commands
/// carry no working directory.
pub struct ShellScriptExecutor {
    paths: TransporterPaths,
    additional_upload_params: Option<String>,
}

impl ShellScriptExecutor {
    pub fn new(paths: TransporterPaths, additional_upload_params: Option<String>) -> Self {
        Self {
            paths,
            additional_upload_params,
        }
    }

    fn login_tokens(&self, mode: TransferMode, credentials: &Credentials) -> Vec<String> {
        vec![
            format!("\"{}\"", self.paths.transporter.display()),
            format!("-m {}", mode.as_str()),
            format!("-u \"{}\"", credentials.user),
            format!("-p {}", escape_password(credentials.password())),
        ]
    }
}

impl Executor for ShellScriptExecutor {
    fn build_upload_command(&self, credentials: &Credentials, source: &Path) -> Command {
        let mut tokens = self.login_tokens(TransferMode::Upload, credentials);
        tokens.push(format!("-f '{}'", source.display()));
        // Comes before -t so it can override the protocol.
        tokens.push(self.additional_upload_params.clone().unwrap_or_default());
        tokens.push(format!("-t '{}'", TRANSFER_PROTOCOL));
        tokens.push(format!("-k {}", KEYSTORE_SIZE));
        Command::new(&self.paths.transporter, tokens)
    }

    fn build_download_command(
        &self,
        credentials: &Credentials,
        app_id: &str,
        destination: &Path,
    ) -> Command {
        let mut tokens = self.login_tokens(TransferMode::LookupMetadata, credentials);
        tokens.push(format!("-apple_id {}", app_id));
        tokens.push(format!("-destination '{}'", destination.display()));
        Command::new(&self.paths.transporter, tokens)
    }

    fn name(&self) -> &'static str {
        "shell-script"
    }
}

//! Command construction strategies
//!
//! Both strategies build the same logical invocation: the `upload` mode
//! sends a package directory, the `lookupMetadata` mode fetches one. They
//! differ only in how the transporter is reached and how arguments are
//! escaped.

mod java;
mod shell_script;

use std::path::Path;
use crate::command::{Command, Credentials};
use crate::config::{Strategy, TransporterConfig};

pub use java::JavaExecutor;
pub use shell_script::ShellScriptExecutor;

/// Transfer protocol passed with `-t` unless overridden.
pub(crate) const TRANSFER_PROTOCOL: &str = "Signiant";
/// Value passed with `-k`.
pub(crate) const KEYSTORE_SIZE: &str = "100000";

/// Builds transporter commands
pub trait Executor: Send + Sync {
    /// Command uploading the package directory at `source`.
    fn build_upload_command(&self, credentials: &Credentials, source: &Path) -> Command;

    /// Command downloading the metadata package of `app_id` into `destination`.
    fn build_download_command(
        &self,
        credentials: &Credentials,
        app_id: &str,
        destination: &Path,
    ) -> Command;

    /// Short name for logging
    fn name(&self) -> &'static str;
}

/// A boxed executor
pub type BoxedExecutor = Box<dyn Executor>;

/// Return the executor selected by `config.strategy`.
pub fn executor_for(config: &TransporterConfig) -> BoxedExecutor {
    match config.strategy {
        Strategy::ShellScript => Box::new(ShellScriptExecutor::new(
            config.paths.clone(),
            config.additional_upload_params.clone(),
        )),
        Strategy::Java => Box::new(JavaExecutor::new(
            config.paths.clone(),
            config.additional_upload_params.clone(),
        )),
    }
}

//! Transporter configuration
//!
//! Everything a session needs to know about its environment is held in a
//! [`TransporterConfig`] value: no process-wide flags are consulted after
//! construction.

use std::path::{Path, PathBuf};

/// Install directory override.
pub const ENV_ITMS_PATH: &str = "FASTLANE_ITUNES_TRANSPORTER_PATH";
/// Extra upload parameters, inserted verbatim into the upload command.
pub const ENV_ADDITIONAL_UPLOAD_PARAMETERS: &str =
    "DELIVER_ITMSTRANSPORTER_ADDITIONAL_UPLOAD_PARAMETERS";
/// Any value selects the direct Java invocation.
pub const ENV_AVOID_SHELL_SCRIPT: &str = "FASTLANE_EXPERIMENTAL_TRANSPORTER_AVOID_SHELL_SCRIPT";

/// Where Xcode ships the transporter when no override is set.
pub const DEFAULT_ITMS_PATH: &str =
    "/Applications/Xcode.app/Contents/Applications/Application Loader.app/Contents/itms";

/// How the transporter is launched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Through the `iTMSTransporter` shell script
    #[default]
    ShellScript,
    /// Through the bundled Java runtime, bypassing the script
    Java,
}

/// Locations inside a transporter install
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransporterPaths {
    /// Install directory; also the working directory of the Java strategy
    pub itms_dir: PathBuf,
    /// The `iTMSTransporter` wrapper script
    pub transporter: PathBuf,
    /// Bundled `java` executable
    pub java_executable: PathBuf,
    /// `java.ext.dirs` value
    pub java_ext_dir: PathBuf,
    /// Launcher jar put on the classpath
    pub java_jar: PathBuf,
}

impl TransporterPaths {
    /// Derive every path from the install directory.
    pub fn from_itms_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            itms_dir: dir.to_path_buf(),
            transporter: dir.join("bin").join("iTMSTransporter"),
            java_executable: dir.join("java").join("bin").join("java"),
            java_ext_dir: dir.join("java").join("lib").join("ext"),
            java_jar: dir.join("lib").join("itmstransporter-launcher.jar"),
        }
    }
}

impl Default for TransporterPaths {
    fn default() -> Self {
        Self::from_itms_dir(DEFAULT_ITMS_PATH)
    }
}

/// Configuration for a transport session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransporterConfig {
    /// Suppress plain transporter output, showing a single waiting notice
    pub hide_output: bool,
    /// Skip filesystem checks, package cleanup and credential invalidation
    pub test_mode: bool,
    /// Command construction strategy
    pub strategy: Strategy,
    /// Extra upload parameters, inserted unescaped before `-t`
    pub additional_upload_params: Option<String>,
    /// Transporter install locations
    pub paths: TransporterPaths,
}

impl Default for TransporterConfig {
    fn default() -> Self {
        Self {
            hide_output: true,
            test_mode: false,
            strategy: Strategy::default(),
            additional_upload_params: None,
            paths: TransporterPaths::default(),
        }
    }
}

impl TransporterConfig {
    /// Build a config from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let paths = lookup(ENV_ITMS_PATH)
            .filter(|p| !p.is_empty())
            .map(TransporterPaths::from_itms_dir)
            .unwrap_or_default();
        let strategy = if lookup(ENV_AVOID_SHELL_SCRIPT).is_some() {
            Strategy::Java
        } else {
            Strategy::ShellScript
        };

        Self {
            strategy,
            additional_upload_params: lookup(ENV_ADDITIONAL_UPLOAD_PARAMETERS)
                .filter(|p| !p.is_empty()),
            paths,
            ..Self::default()
        }
    }

    /// Derive `hide_output` from a global verbosity setting.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.hide_output = !verbose;
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_paths(mut self, paths: TransporterPaths) -> Self {
        self.paths = paths;
        self
    }

    pub fn with_additional_upload_params(mut self, params: Option<String>) -> Self {
        self.additional_upload_params = params;
        self
    }
}

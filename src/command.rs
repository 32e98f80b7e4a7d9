//! Commands and credentials
//!
//! A [`Command`] is the fully escaped transporter invocation, built once and
//! never modified. [`Credentials`] keeps the password out of `Debug` output.

use std::fmt;
use std::path::{Path, PathBuf};

/// Placeholder shown instead of the real password in diagnostic output.
pub const PASSWORD_PLACEHOLDER: &str = "YourPassword";

/// Extension of the package directory exchanged with the transporter.
pub const PACKAGE_EXTENSION: &str = "itmsp";

/// Transporter login
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    password: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// The same user with the password replaced by [`PASSWORD_PLACEHOLDER`].
    pub fn masked(&self) -> Self {
        Self::new(self.user.clone(), PASSWORD_PLACEHOLDER)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<hidden>")
            .finish()
    }
}

/// Transporter mode flag (`-m`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Upload,
    LookupMetadata,
}

impl TransferMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferMode::Upload => "upload",
            TransferMode::LookupMetadata => "lookupMetadata",
        }
    }
}

/// A shell-ready transporter invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Command {
    program: PathBuf,
    tokens: Vec<String>,
    working_dir: Option<PathBuf>,
}

impl Command {
    /// `tokens` is the whole escaped command line, starting with the
    /// quoted program. `program` is the same path, unescaped.
    pub fn new(program: impl Into<PathBuf>, tokens: Vec<String>) -> Self {
        Self {
            program: program.into(),
            tokens,
            working_dir: None,
        }
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// The unescaped program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Escaped tokens, program included.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Directory the command must run from, if any.
    pub fn working_dir(&self) -> Option<&Path> {
        self.working_dir.as_deref()
    }

    /// The full command line handed to `/bin/sh -c`.
    pub fn line(&self) -> String {
        self.tokens
            .iter()
            .filter(|a| !a.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Tokens may carry a password.
        f.debug_struct("Command")
            .field("program", &self.program)
            .field("tokens", &self.tokens.len())
            .field("working_dir", &self.working_dir)
            .finish()
    }
}

/// `<dir>/<app_id>.itmsp`
pub fn package_path(dir: &Path, app_id: &str) -> PathBuf {
    dir.join(format!("{}.{}", app_id, PACKAGE_EXTENSION))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_hides_password() {
        let creds = Credentials::new("me@example.com", "hunter2");
        let debug = format!("{:?}", creds);
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_credentials_masked() {
        let creds = Credentials::new("me", "secret").masked();
        assert_eq!(creds.user, "me");
        assert_eq!(creds.password(), PASSWORD_PLACEHOLDER);
    }

    #[test]
    fn test_command_line_skips_empty_tokens() {
        let cmd = Command::new(
            "/bin/tool",
            vec!["/bin/tool".into(), "-m upload".into(), String::new(), "-k 100000".into()],
        );
        assert_eq!(cmd.line(), "/bin/tool -m upload -k 100000");
        assert!(cmd.working_dir().is_none());
    }

    #[test]
    fn test_command_debug_hides_tokens() {
        let cmd = Command::new("/bin/tool", vec!["-p 'secret'".into()]).with_working_dir("/opt");
        let debug = format!("{:?}", cmd);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("/opt"));
    }

    #[test]
    fn test_package_path() {
        assert_eq!(
            package_path(Path::new("/tmp"), "123"),
            PathBuf::from("/tmp/123.itmsp")
        );
    }
}

//! Direct invocation of the transporter's bundled Java runtime
//!
//! Bypasses the wrapper script and its quoting problems. Every user-supplied
//! argument is escaped individually, stderr is merged into stdout, and the
//! command must run from the install directory.

use std::path::Path;
use super::{Executor, KEYSTORE_SIZE, TRANSFER_PROTOCOL};
use crate::command::{Command, Credentials, TransferMode};
use crate::config::TransporterPaths;
use crate::escape::shell_escape;

const ENTRY_POINT: &str = "com.apple.transporter.Application";

const JVM_FLAGS: &[&str] = &[
    "-XX:NewSize=2m",
    "-Xms32m",
    "-Xmx1024m",
    "-Xms1024m",
    "-Djava.awt.headless=true",
    "-Dsun.net.http.retryPost=false",
];

/// Runs the transporter's Java application directly.
pub struct JavaExecutor {
    paths: TransporterPaths,
    additional_upload_params: Option<String>,
}

impl JavaExecutor {
    pub fn new(paths: TransporterPaths, additional_upload_params: Option<String>) -> Self {
        Self {
            paths,
            additional_upload_params,
        }
    }

    fn login_tokens(&self, mode: TransferMode, credentials: &Credentials) -> Vec<String> {
        let mut tokens = vec![
            shell_escape(&self.paths.java_executable.to_string_lossy()),
            format!(
                "-Djava.ext.dirs={}",
                shell_escape(&self.paths.java_ext_dir.to_string_lossy())
            ),
        ];
        tokens.extend(JVM_FLAGS.iter().map(|f| f.to_string()));
        tokens.push(format!(
            "-classpath {}",
            shell_escape(&self.paths.java_jar.to_string_lossy())
        ));
        tokens.push(ENTRY_POINT.to_string());
        tokens.push(format!("-m {}", mode.as_str()));
        tokens.push(format!("-u {}", shell_escape(&credentials.user)));
        tokens.push(format!("-p {}", shell_escape(credentials.password())));
        tokens
    }

    fn finish(&self, mut tokens: Vec<String>) -> Command {
        tokens.push("2>&1".to_string());
        Command::new(&self.paths.java_executable, tokens).with_working_dir(&self.paths.itms_dir)
    }
}

impl Executor for JavaExecutor {
    fn build_upload_command(&self, credentials: &Credentials, source: &Path) -> Command {
        let mut tokens = self.login_tokens(TransferMode::Upload, credentials);
        tokens.push(format!("-f {}", shell_escape(&source.to_string_lossy())));
        tokens.push(self.additional_upload_params.clone().unwrap_or_default());
        tokens.push(format!("-t {}", TRANSFER_PROTOCOL));
        tokens.push(format!("-k {}", KEYSTORE_SIZE));
        self.finish(tokens)
    }

    fn build_download_command(
        &self,
        credentials: &Credentials,
        app_id: &str,
        destination: &Path,
    ) -> Command {
        let mut tokens = self.login_tokens(TransferMode::LookupMetadata, credentials);
        tokens.push(format!("-apple_id {}", shell_escape(app_id)));
        tokens.push(format!(
            "-destination {}",
            shell_escape(&destination.to_string_lossy())
        ));
        self.finish(tokens)
    }

    fn name(&self) -> &'static str {
        "java"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PREFIX: &str = "/itms/java/bin/java -Djava.ext.dirs=/itms/java/lib/ext \
        -XX:NewSize=2m -Xms32m -Xmx1024m -Xms1024m -Djava.awt.headless=true \
        -Dsun.net.http.retryPost=false -classpath /itms/lib/itmstransporter-launcher.jar \
        com.apple.transporter.Application";

    fn executor(params: Option<&str>) -> JavaExecutor {
        JavaExecutor::new(
            TransporterPaths::from_itms_dir("/itms"),
            params.map(str::to_string),
        )
    }

    #[test]
    fn test_upload_command() {
        let cmd = executor(None).build_upload_command(
            &Credentials::new("user@example.com", "pass word'"),
            Path::new("/tmp/my dir/123.itmsp"),
        );
        assert_eq!(
            cmd.line(),
            format!(
                "{} -m upload -u user@example.com -p pass\\ word\\' \
                 -f /tmp/my\\ dir/123.itmsp -t Signiant -k 100000 2>&1",
                PREFIX
            )
        );
        assert_eq!(cmd.working_dir(), Some(Path::new("/itms")));
        assert_eq!(cmd.program(), Path::new("/itms/java/bin/java"));
    }

    #[test]
    fn test_upload_command_additional_params() {
        let cmd = executor(Some("-t Aspera")).build_upload_command(
            &Credentials::new("u", "p"),
            Path::new("/tmp/1.itmsp"),
        );
        assert!(cmd
            .line()
            .ends_with("-f /tmp/1.itmsp -t Aspera -t Signiant -k 100000 2>&1"));
    }

    #[test]
    fn test_download_command() {
        let cmd = executor(Some("-t Aspera")).build_download_command(
            &Credentials::new("u", "$ecret"),
            "987",
            Path::new("/tmp"),
        );
        assert_eq!(
            cmd.line(),
            format!(
                "{} -m lookupMetadata -u u -p \\$ecret -apple_id 987 -destination /tmp 2>&1",
                PREFIX
            )
        );
        assert_eq!(cmd.working_dir(), Some(Path::new("/itms")));
    }
}

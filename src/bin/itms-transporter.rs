//! itms-transporter CLI
//!
//! Upload or download an App Store metadata package through iTMSTransporter.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use itms_transporter::{
    CredentialStore, Credentials, Strategy, TransferReport, TransportError, TransportSession,
    TransporterConfig, TransporterPaths, DEFAULT_DOWNLOAD_DIR,
};
use tracing_subscriber::EnvFilter;

const PASSWORD_VARS: &[&str] = &["ITMS_TRANSPORTER_PASSWORD", "FASTLANE_PASSWORD"];

#[derive(Parser, Debug)]
#[command(name = "itms-transporter")]
#[command(version)]
#[command(about = "Upload or download App Store packages with iTMSTransporter")]
struct Cli {
    /// Apple ID used to log in
    #[arg(short = 'u', long)]
    user: String,

    /// Show all transporter output
    #[arg(short, long)]
    verbose: bool,

    /// Invoke the bundled Java runtime instead of the wrapper script
    #[arg(long = "avoid-shell-script")]
    avoid_shell_script: bool,

    /// Transporter install directory
    #[arg(long = "itms-path")]
    itms_path: Option<PathBuf>,

    /// Skip package checks, cleanup and credential invalidation
    #[arg(long = "test-mode")]
    test_mode: bool,

    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Download the latest metadata package
    Download {
        app_id: String,
        /// Destination directory [default: /tmp]
        dir: Option<PathBuf>,
    },
    /// Upload <DIR>/<APP_ID>.itmsp
    Upload { app_id: String, dir: PathBuf },
    /// Print the command that would run, password masked
    Command {
        mode: Mode,
        app_id: String,
        dir: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Mode {
    Download,
    Upload,
}

/// Credentials come from the environment, so there is nothing stored to
/// forget; tell the user what to change instead.
struct EnvCredentialStore;

impl CredentialStore for EnvCredentialStore {
    fn invalidate_credentials(&self, user: &str) {
        tracing::warn!(
            "The password for {} was rejected; update {} before running again",
            user,
            PASSWORD_VARS[0]
        );
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            if let Some(err) = e.downcast_ref::<TransportError>() {
                if err.is_transfer() {
                    eprintln!("error: {}", err);
                    for signal in &err.signals {
                        eprintln!("signal: {}", signal);
                    }
                    for line in &err.guidance {
                        eprintln!("{}", line);
                    }
                    return ExitCode::from(2);
                }
            }
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<bool> {
    let mut config = TransporterConfig::from_env()
        .with_verbose(cli.verbose)
        .with_test_mode(cli.test_mode);
    if cli.avoid_shell_script {
        config = config.with_strategy(Strategy::Java);
    }
    if let Some(ref dir) = cli.itms_path {
        config = config.with_paths(TransporterPaths::from_itms_dir(dir));
    }

    let password = match &cli.action {
        // Never printed, so a placeholder is enough.
        Action::Command { .. } => read_password().unwrap_or_default(),
        _ => read_password()?,
    };
    let session = TransportSession::new(config, Credentials::new(cli.user, password))
        .with_credential_store(Arc::new(EnvCredentialStore));

    let report = match cli.action {
        Action::Download { app_id, dir } => {
            let dir = dir.unwrap_or_else(|| PathBuf::from(DEFAULT_DOWNLOAD_DIR));
            session.download(&app_id, Some(&dir))?
        }
        Action::Upload { app_id, dir } => session.upload(&app_id, &dir)?,
        Action::Command { mode, app_id, dir } => {
            let command = match mode {
                Mode::Download => session.download_command(&app_id, &dir, false),
                Mode::Upload => session.upload_command(&app_id, &dir, false),
            };
            println!("{}", command.line());
            if let Some(wd) = command.working_dir() {
                println!("# run from {}", wd.display());
            }
            return Ok(true);
        }
    };

    print_report(&report);
    Ok(report.success)
}

fn read_password() -> Result<String> {
    PASSWORD_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
        .with_context(|| format!("no password given: set {}", PASSWORD_VARS.join(" or ")))
}

fn print_report(report: &TransferReport) {
    for signal in &report.signals {
        println!("signal: {}", signal);
    }
    for line in &report.guidance {
        println!("{}", line);
    }
    if let Some(code) = report.diagnostics.return_code {
        println!("transporter returned {}", code);
    }
}

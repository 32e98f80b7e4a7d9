//! Transport errors

use std::collections::BTreeSet;
use std::fmt;
use crate::classifier::Signal;

/// The kind of transport error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The transporter reported a non-zero return code
    Transfer,
    /// Invalid arguments passed to a transfer
    InvalidInput,
    /// IO error
    Io,
}

/// A transport error with optional transporter context
#[derive(Debug)]
pub struct TransportError {
    pub kind: ErrorKind,
    pub message: String,
    /// Return code parsed from the transporter output
    pub return_code: Option<u32>,
    /// `ERROR:` lines captured before the failure
    pub errors: Vec<String>,
    /// `WARN:` lines captured before the failure
    pub warnings: Vec<String>,
    /// Side-signals raised before the failure
    pub signals: BTreeSet<Signal>,
    /// Guidance already given to the user
    pub guidance: Vec<String>,
}

impl TransportError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            return_code: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            signals: BTreeSet::new(),
            guidance: Vec::new(),
        }
    }

    pub fn with_return_code(mut self, code: u32) -> Self {
        self.return_code = Some(code);
        self
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn with_signals(mut self, signals: BTreeSet<Signal>) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_guidance(mut self, guidance: Vec<String>) -> Self {
        self.guidance = guidance;
        self
    }

    /// Whether the transporter raised `signal` before failing.
    pub fn has_signal(&self, signal: Signal) -> bool {
        self.signals.contains(&signal)
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, msg)
    }

    /// The transporter declared failure with a non-zero return code.
    pub fn transfer(code: u32, errors: &[String], warnings: &[String]) -> Self {
        Self::new(
            ErrorKind::Transfer,
            format!("Return status of iTunes Transporter was {}", code),
        )
        .with_return_code(code)
        .with_errors(errors.to_vec())
        .with_warnings(warnings.to_vec())
    }

    pub fn is_transfer(&self) -> bool {
        self.kind == ErrorKind::Transfer
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.errors.is_empty() {
            write!(f, ": {}", self.errors.join("\n"))?;
        }
        Ok(())
    }
}

impl std::error::Error for TransportError {}

impl From<std::io::Error> for TransportError {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_error_display_lists_errors() {
        let errors = vec!["first".to_string(), "second".to_string()];
        let err = TransportError::transfer(3, &errors, &[]);
        assert!(err.is_transfer());
        assert_eq!(err.return_code, Some(3));
        assert_eq!(
            err.to_string(),
            "Return status of iTunes Transporter was 3: first\nsecond"
        );
    }

    #[test]
    fn test_transfer_error_without_errors() {
        let err = TransportError::transfer(1, &[], &["careful".to_string()]);
        assert_eq!(err.to_string(), "Return status of iTunes Transporter was 1");
        assert_eq!(err.warnings, vec!["careful"]);
    }

    #[test]
    fn test_signals_attached_to_transfer_error() {
        let err = TransportError::transfer(1, &[], &[])
            .with_signals(BTreeSet::from([Signal::RedundantBinaryUpload]))
            .with_guidance(vec!["bump the build".to_string()]);
        assert!(err.has_signal(Signal::RedundantBinaryUpload));
        assert!(!err.has_signal(Signal::InvalidCredentials));
        assert_eq!(err.guidance, vec!["bump the build"]);
        assert_eq!(err.to_string(), "Return status of iTunes Transporter was 1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: TransportError = io.into();
        assert_eq!(err.kind, ErrorKind::Io);
        assert_eq!(err.to_string(), "gone");
    }
}

//! Output accumulation
//!
//! [`OutputParser`] feeds each line through [`classify_line`] and keeps the
//! per-session state: captured errors and warnings, the return code, and the
//! side-signals raised so far. A non-zero return code stops the session with
//! [`ErrorKind::Transfer`](crate::ErrorKind::Transfer).

use std::collections::BTreeSet;
use crate::classifier::{classify_line, Classification, LineKind, Signal};
use crate::error::TransportError;

/// Everything learned from one transporter run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    /// Messages from `ERROR:` lines, in arrival order
    pub errors: Vec<String>,
    /// Messages from `WARN:` lines, in arrival order
    pub warnings: Vec<String>,
    /// Present iff a `DBG-X: Returning N` line was seen
    pub return_code: Option<u32>,
    /// Process-level failure, e.g. the transporter could not be started
    pub exception: Option<String>,
    /// Exit status of the child, informational only
    pub exit_status: Option<u32>,
}

impl Diagnostics {
    /// No process-level exception and no captured errors.
    pub fn is_clean(&self) -> bool {
        self.exception.is_none() && self.errors.is_empty()
    }
}

/// Line-by-line accumulator for a single session
pub struct OutputParser {
    hide_output: bool,
    diagnostics: Diagnostics,
    signals: BTreeSet<Signal>,
}

impl OutputParser {
    /// `hide_output` suppresses plain transporter output; errors, warnings
    /// and return codes are reported either way.
    pub fn new(hide_output: bool) -> Self {
        Self {
            hide_output,
            diagnostics: Diagnostics::default(),
            signals: BTreeSet::new(),
        }
    }

    /// Classify one complete line and record what it carries.
    ///
    /// Returns an error only for a non-zero return code; by then all
    /// warnings and errors seen so far have been logged.
    pub fn parse_line(&mut self, line: &str) -> Result<Classification, TransportError> {
        let classification = classify_line(line);

        if classification.kind == LineKind::Skip {
            tracing::trace!(line, "skipping known transporter noise");
            return Ok(classification);
        }

        match &classification.kind {
            LineKind::Error(message) => {
                self.diagnostics.errors.push(message.clone());
                tracing::error!("[Transporter Error Output]: {}", message);
                match classification.signal {
                    Some(Signal::InvalidCredentials) => {
                        self.signals.insert(Signal::InvalidCredentials);
                    }
                    Some(Signal::RedundantBinaryUpload) => {
                        self.signals.insert(Signal::RedundantBinaryUpload);
                        tracing::error!("{}", message);
                        tracing::error!(
                            "You have to change the build number of your app to upload your ipa file"
                        );
                    }
                    None => {}
                }
            }
            LineKind::Warning(message) => {
                self.diagnostics.warnings.push(message.clone());
                tracing::warn!("[Transporter Warning Output]: {}", message);
            }
            LineKind::Skip | LineKind::Plain(_) | LineKind::Unmatched => {}
        }

        if let Some(code) = classification.return_code {
            self.diagnostics.return_code = Some(code);
            if code != 0 {
                tracing::error!("Transporter transfer failed.");
                self.flush();
                return Err(TransportError::transfer(
                    code,
                    &self.diagnostics.errors,
                    &self.diagnostics.warnings,
                ));
            }
            tracing::info!("iTunes Transporter successfully finished its job");
        }

        if let LineKind::Plain(message) = &classification.kind {
            if !self.hide_output {
                tracing::debug!("[Transporter]: {}", message);
            }
        }

        Ok(classification)
    }

    /// Record a process-level failure.
    pub fn record_exception(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{}", message);
        self.diagnostics.exception = Some(message);
    }

    pub fn record_exit_status(&mut self, status: Option<u32>) {
        self.diagnostics.exit_status = status;
    }

    /// Log the accumulated warnings and errors, warnings first.
    pub fn flush(&self) {
        if !self.diagnostics.warnings.is_empty() {
            tracing::warn!("{}", self.diagnostics.warnings.join("\n"));
        }
        if !self.diagnostics.errors.is_empty() {
            tracing::error!("{}", self.diagnostics.errors.join("\n"));
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn signals(&self) -> &BTreeSet<Signal> {
        &self.signals
    }

    /// Consume the parser, returning what it accumulated.
    pub fn finish(self) -> (Diagnostics, BTreeSet<Signal>) {
        (self.diagnostics, self.signals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(parser: &mut OutputParser, lines: &[&str]) -> Result<(), TransportError> {
        for line in lines {
            parser.parse_line(line)?;
        }
        Ok(())
    }

    #[test]
    fn test_skip_line_records_nothing() {
        let mut parser = OutputParser::new(false);
        parser
            .parse_line("> ERROR: An exception has occurred: Scheduling automatic restart in 1 minute")
            .unwrap();
        assert_eq!(parser.diagnostics(), &Diagnostics::default());
        assert!(parser.signals().is_empty());
    }

    #[test]
    fn test_invalid_credentials_line() {
        let mut parser = OutputParser::new(true);
        let c = parser
            .parse_line("> ERROR: Your Apple ID or password was entered incorrectly")
            .unwrap();
        assert_eq!(c.signal, Some(Signal::InvalidCredentials));
        assert_eq!(
            parser.diagnostics().errors,
            vec!["Your Apple ID or password was entered incorrectly"]
        );
        assert_eq!(parser.signals().len(), 1);
        assert!(parser.signals().contains(&Signal::InvalidCredentials));
        assert!(!parser.diagnostics().is_clean());
    }

    #[test]
    fn test_warnings_accumulate_in_order() {
        let mut parser = OutputParser::new(true);
        feed(&mut parser, &["> WARN: one", "> WARN: two", "> WARN: one"]).unwrap();
        assert_eq!(parser.diagnostics().warnings, vec!["one", "two", "one"]);
        assert!(parser.diagnostics().is_clean());
    }

    #[test]
    fn test_return_code_zero_succeeds() {
        let mut parser = OutputParser::new(true);
        feed(&mut parser, &["> INFO: hello", "> DBG-X: Returning 0"]).unwrap();
        assert_eq!(parser.diagnostics().return_code, Some(0));
        assert!(parser.diagnostics().is_clean());
    }

    #[test]
    fn test_return_code_non_zero_is_fatal_without_errors() {
        let mut parser = OutputParser::new(true);
        let err = feed(&mut parser, &["> WARN: careful", "> DBG-X: Returning 1"]).unwrap_err();
        assert!(err.is_transfer());
        assert_eq!(err.return_code, Some(1));
        assert!(err.errors.is_empty());
        assert_eq!(err.warnings, vec!["careful"]);
        assert_eq!(parser.diagnostics().return_code, Some(1));
    }

    #[test]
    fn test_fatal_error_carries_prior_errors() {
        let mut parser = OutputParser::new(true);
        let err = feed(
            &mut parser,
            &["> ERROR: first", "> ERROR: second", "> DBG-X: Returning 3"],
        )
        .unwrap_err();
        assert_eq!(err.return_code, Some(3));
        assert_eq!(err.errors, vec!["first", "second"]);
    }

    #[test]
    fn test_errors_with_zero_return_code_stay_soft() {
        let mut parser = OutputParser::new(true);
        feed(&mut parser, &["> ERROR: broken", "> DBG-X: Returning 0"]).unwrap();
        assert_eq!(parser.diagnostics().return_code, Some(0));
        assert!(!parser.diagnostics().is_clean());
    }

    #[test]
    fn test_exception_is_not_clean() {
        let mut parser = OutputParser::new(true);
        parser.record_exception("No such file or directory");
        let (diagnostics, signals) = parser.finish();
        assert!(!diagnostics.is_clean());
        assert!(diagnostics.errors.is_empty());
        assert!(signals.is_empty());
    }

    #[test]
    fn test_order_of_unrelated_lines_does_not_matter() {
        let before = ["> ERROR: e1", "> WARN: w1", "> INFO: p1", "> INFO: p2", "noise"];
        let orders: [[usize; 5]; 3] = [[0, 1, 2, 3, 4], [4, 3, 2, 1, 0], [2, 0, 4, 1, 3]];

        let mut results = Vec::new();
        for order in orders {
            let mut parser = OutputParser::new(false);
            for i in order {
                parser.parse_line(before[i]).unwrap();
            }
            parser.parse_line("> DBG-X: Returning 0").unwrap();
            let (diagnostics, signals) = parser.finish();
            results.push((diagnostics.is_clean(), diagnostics.errors, diagnostics.warnings, signals));
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert!(!results[0].0);
    }
}

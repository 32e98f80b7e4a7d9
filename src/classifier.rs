//! Transporter output classification
//!
//! The transporter prints free-form log lines such as
//!
//! ```text
//! [2016-11-14 10:00:00 CET] <main>  INFO: Configuring logging...
//! [2016-11-14 10:00:01 CET] <main> ERROR: Your Apple ID or password was entered incorrectly
//! [2016-11-14 10:00:01 CET] <main> DBG-X: Returning 1
//! ```
//!
//! Each line is matched against an ordered rule list. The first rule that
//! matches decides the [`LineKind`]; the return-code pattern is evaluated on
//! its own and can fire together with any kind except [`LineKind::Skip`].

use std::sync::OnceLock;
use regex::Regex;

/// Known-benign lines that look like errors.
pub const SKIP_ERRORS: &[&str] =
    &["ERROR: An exception has occurred: Scheduling automatic restart in 1 minute"];

const ERROR_PATTERN: &str = r">\s*ERROR:\s+(.+)";
const WARNING_PATTERN: &str = r">\s*WARN:\s+(.+)";
const OUTPUT_PATTERN: &str = r">\s+(.+)";
const RETURN_CODE_PATTERN: &str = r">\sDBG-X:\sReturning\s+(\d+)";

const INVALID_CREDENTIALS_PHRASES: &[&str] = &[
    "Your Apple ID or password was entered incorrectly",
    "This Apple ID has been locked for security reasons",
];

const REDUNDANT_BINARY_PHRASE: &str =
    "Redundant Binary Upload. There already exists a binary upload with build";

/// Caller-visible condition that needs action outside the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Signal {
    /// Stored credentials were rejected or the account is locked
    InvalidCredentials,
    /// The build number was already uploaded
    RedundantBinaryUpload,
}

impl Signal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Signal::InvalidCredentials => "invalid-credentials",
            Signal::RedundantBinaryUpload => "redundant-binary-upload",
        }
    }

    /// Detect a signal in the text captured from an `ERROR:` line.
    pub fn from_error(message: &str) -> Option<Signal> {
        if INVALID_CREDENTIALS_PHRASES.iter().any(|p| message.contains(p)) {
            Some(Signal::InvalidCredentials)
        } else if message.contains(REDUNDANT_BINARY_PHRASE) {
            Some(Signal::RedundantBinaryUpload)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a line carries, apart from a return code
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// Known noise, ignored entirely
    Skip,
    /// `ERROR:` line with its captured message
    Error(String),
    /// `WARN:` line with its captured message
    Warning(String),
    /// Any other log-shaped line
    Plain(String),
    /// Nothing recognizable
    Unmatched,
}

/// Result of classifying one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub kind: LineKind,
    /// Status from a `DBG-X: Returning N` line
    pub return_code: Option<u32>,
    /// Side-signal raised by an `ERROR:` line
    pub signal: Option<Signal>,
}

impl Classification {
    fn new(kind: LineKind) -> Self {
        Self {
            kind,
            return_code: None,
            signal: None,
        }
    }
}

/// One entry of the ordered rule list
struct Rule {
    name: &'static str,
    pattern: Regex,
    build: fn(String) -> LineKind,
}

struct Rules {
    skip: Regex,
    content: Vec<Rule>,
    return_code: Regex,
}

fn compile(pattern: &str) -> Regex {
    // Patterns are compile-time constants.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid built-in pattern {}: {}", pattern, e))
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| {
        let skip = SKIP_ERRORS
            .iter()
            .map(|s| regex::escape(s))
            .collect::<Vec<_>>()
            .join("|");
        Rules {
            skip: compile(&skip),
            content: vec![
                Rule {
                    name: "error",
                    pattern: compile(ERROR_PATTERN),
                    build: LineKind::Error,
                },
                Rule {
                    name: "warning",
                    pattern: compile(WARNING_PATTERN),
                    build: LineKind::Warning,
                },
                Rule {
                    name: "output",
                    pattern: compile(OUTPUT_PATTERN),
                    build: LineKind::Plain,
                },
            ],
            return_code: compile(RETURN_CODE_PATTERN),
        }
    })
}

/// Classify a single complete line of transporter output.
pub fn classify_line(line: &str) -> Classification {
    let rules = rules();

    if rules.skip.is_match(line) {
        return Classification::new(LineKind::Skip);
    }

    let kind = rules
        .content
        .iter()
        .find_map(|rule| {
            rule.pattern
                .captures(line)
                .and_then(|caps| caps.get(1))
                .map(|m| (rule.build)(m.as_str().to_string()))
        })
        .unwrap_or(LineKind::Unmatched);

    let signal = match &kind {
        LineKind::Error(message) => Signal::from_error(message),
        _ => None,
    };

    // Digits that overflow are still a non-zero status.
    let return_code = rules
        .return_code
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().parse::<u32>().unwrap_or(u32::MAX));

    Classification {
        kind,
        return_code,
        signal,
    }
}

/// Names of the content rules in evaluation order.
pub fn rule_names() -> Vec<&'static str> {
    rules().content.iter().map(|r| r.name).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_order() {
        assert_eq!(rule_names(), vec!["error", "warning", "output"]);
    }

    #[test]
    fn test_skip_line() {
        let line = "[2016-11-14 10:00:00 CET] <main> ERROR: An exception has occurred: \
                    Scheduling automatic restart in 1 minute";
        let c = classify_line(line);
        assert_eq!(c.kind, LineKind::Skip);
        assert!(c.return_code.is_none());
        assert!(c.signal.is_none());
    }

    #[test]
    fn test_error_line() {
        let c = classify_line("[2016] <main> ERROR: ITMS-90000: Something broke");
        assert_eq!(c.kind, LineKind::Error("ITMS-90000: Something broke".into()));
        assert!(c.signal.is_none());
        assert!(c.return_code.is_none());
    }

    #[test]
    fn test_error_line_without_space_after_marker() {
        let c = classify_line(">ERROR: tight");
        assert_eq!(c.kind, LineKind::Error("tight".into()));
    }

    #[test]
    fn test_invalid_credentials_signal() {
        let c = classify_line("> ERROR: Your Apple ID or password was entered incorrectly");
        assert_eq!(
            c.kind,
            LineKind::Error("Your Apple ID or password was entered incorrectly".into())
        );
        assert_eq!(c.signal, Some(Signal::InvalidCredentials));

        let c = classify_line("> ERROR: This Apple ID has been locked for security reasons.");
        assert_eq!(c.signal, Some(Signal::InvalidCredentials));
    }

    #[test]
    fn test_invalid_credentials_requires_exact_phrase() {
        let c = classify_line("> ERROR: Your password is fine but the network is not");
        assert!(c.signal.is_none());
        // Only ERROR lines raise signals.
        let c = classify_line("> WARN: Your Apple ID or password was entered incorrectly");
        assert!(c.signal.is_none());
    }

    #[test]
    fn test_redundant_binary_signal() {
        let c = classify_line(
            "> ERROR: ERROR ITMS-4238: \"Redundant Binary Upload. There already exists a \
             binary upload with build version '1.0' for train '1.0'\"",
        );
        assert_eq!(c.signal, Some(Signal::RedundantBinaryUpload));
    }

    #[test]
    fn test_warning_line() {
        let c = classify_line("[2016] <main>  WARN: Slow network");
        assert_eq!(c.kind, LineKind::Warning("Slow network".into()));
    }

    #[test]
    fn test_return_code_zero() {
        let c = classify_line("> DBG-X: Returning 0");
        assert_eq!(c.return_code, Some(0));
        assert_eq!(c.kind, LineKind::Plain("DBG-X: Returning 0".into()));
    }

    #[test]
    fn test_return_code_non_zero() {
        let c = classify_line("[2016] <main> DBG-X: Returning 1");
        assert_eq!(c.return_code, Some(1));
    }

    #[test]
    fn test_return_code_overflow_is_non_zero() {
        let c = classify_line("> DBG-X: Returning 99999999999999999999");
        assert_eq!(c.return_code, Some(u32::MAX));
    }

    #[test]
    fn test_plain_line() {
        let c = classify_line("[2016] <main>  INFO: Configuring logging...");
        assert_eq!(c.kind, LineKind::Plain("INFO: Configuring logging...".into()));
    }

    #[test]
    fn test_unmatched_line() {
        let c = classify_line("Picked up _JAVA_OPTIONS: -Xmx1g");
        assert_eq!(c.kind, LineKind::Unmatched);
        assert!(c.return_code.is_none());
    }

    #[test]
    fn test_signal_names() {
        assert_eq!(Signal::InvalidCredentials.to_string(), "invalid-credentials");
        assert_eq!(Signal::RedundantBinaryUpload.as_str(), "redundant-binary-upload");
    }
}

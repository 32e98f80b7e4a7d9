//! Shell escaping
//!
//! `shell_escape` produces a single shell word that expands back to its input:
//! every character outside `[A-Za-z0-9_\-.,:+/@]` is backslash-escaped, and a
//! newline is wrapped in single quotes. The empty string becomes `''`.
//!
//! `escape_password` builds the password token for the wrapper-script
//! invocation, which is expanded twice: once by the shell running the
//! command line, once by the script when it evaluates its arguments.

/// Escape a string as a single POSIX shell word.
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }

    let mut out = String::with_capacity(s.len() * 2);
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '_' | '-' | '.' | ',' | ':' | '+' | '/' | '@' => {
                out.push(c)
            }
            '\n' => out.push_str("'\n'"),
            _ => {
                out.push('\\');
                out.push(c);
            }
        }
    }
    out
}

/// Escape a password for the wrapper-script command line.
///
/// A backslash-escaped quote means nothing inside single quotes, so each
/// `\'` produced by [`shell_escape`] becomes `'"\'"'`: close the quoted
/// string, emit `\'` from a double-quoted literal, reopen the quoted string.
/// The result is wrapped in single quotes.
pub fn escape_password(password: &str) -> String {
    let escaped = shell_escape(password).replace("\\'", "'\"\\'\"'");
    format!("'{}'", escaped)
}

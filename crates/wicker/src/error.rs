use std::fmt;

use thiserror::Error;

/// What kind of parse failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input at the cursor did not match the failing rule.
    Unexpected,
    /// The cursor was at end of input when the failure occurred.
    EndOfInput,
    /// Matching the failing rule again at the same position would recurse
    /// forever (a shift-shift conflict).
    LeftRecursion,
}

/// The error type for failed parses.
///
/// Carries the 1-based position of the failure, a short excerpt of the
/// remaining input, and the set of inputs the failing rule would have
/// accepted. A left-recursion conflict is also a `ParseError`, so an
/// enclosing choice treats it like any other failed alternative and moves
/// on; it surfaces to the caller only when no alternative succeeds.
///
/// ## Example
/// ```rust
/// use wicker::{lit, ErrorKind, Rule};
///
/// let rule: Rule = lit("foo");
/// let err = rule.parse("bar").unwrap_err();
///
/// assert_eq!(err.kind(), ErrorKind::Unexpected);
/// assert_eq!((err.line(), err.column()), (1, 1));
/// assert_eq!(err.expected(), ["foo"]);
/// ```
#[derive(Error, Clone, PartialEq, Eq)]
#[error("{line}:{col}: Unexpected text: {found}. Expected one of: {}", .expected.join(", "))]
pub struct ParseError {
    pub(crate) line: usize,
    pub(crate) col: usize,
    pub(crate) found: String,
    pub(crate) expected: Vec<String>,
    pub(crate) kind: ErrorKind,
}

impl ParseError {
    /// 1-based line of the failure.
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based column of the failure.
    pub fn column(&self) -> usize {
        self.col
    }

    /// Up to ten characters of the input remaining at the failure.
    pub fn found(&self) -> &str {
        self.found.as_ref()
    }

    /// The inputs the failing rule would have accepted.
    pub fn expected(&self) -> &[String] {
        self.expected.as_ref()
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// True when the failure happened at end of input.
    pub fn is_eof(&self) -> bool {
        self.kind == ErrorKind::EndOfInput
    }

    /// True when the failure was a cut left recursion.
    pub fn is_left_recursion(&self) -> bool {
        self.kind == ErrorKind::LeftRecursion
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ERROR@{}:{} {:?} {:?} expecting {:?}",
            self.line, self.col, self.kind, self.found, self.expected
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_format() {
        let err = ParseError {
            line: 3,
            col: 7,
            found: "oops".to_string(),
            expected: vec!["foo".to_string(), "bar".to_string()],
            kind: ErrorKind::Unexpected,
        };
        assert_eq!(
            err.to_string(),
            "3:7: Unexpected text: oops. Expected one of: foo, bar"
        );
    }

    #[test]
    fn debug_shows_kind_and_position() {
        let err = ParseError {
            line: 1,
            col: 1,
            found: String::new(),
            expected: vec!["foo".to_string()],
            kind: ErrorKind::EndOfInput,
        };
        assert_eq!(
            format!("{err:?}"),
            "ERROR@1:1 EndOfInput \"\" expecting [\"foo\"]"
        );
    }
}

//! Parse results and leveled diagnostics.
//!
//! Parsers never fail with `Err`: they return a [`ParseResult`] holding an
//! optional value plus every diagnostic collected on the way, so callers can
//! inspect partial success.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A line/column location. Lines and columns are 1-based; `0` marks "unknown".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Byte offset range, end exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// Where a token or node comes from: offsets plus line/column range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub offset: Span,
    pub start: Location,
    pub end: Location,
}

impl Position {
    pub fn new(offset: Span, start: Location, end: Location) -> Self {
        assert!(offset.start <= offset.end, "position offsets are reversed");
        Self { offset, start, end }
    }

    /// A position is valid once it points at real source text.
    pub fn is_valid(&self) -> bool {
        self.start.line > 0 && self.end.line > 0 && self.offset.start <= self.offset.end
    }

    /// Smallest position covering every valid input; the default (empty)
    /// position when none are valid.
    pub fn merge<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Position {
        positions
            .into_iter()
            .filter(|p| p.is_valid())
            .fold(None, |acc: Option<Position>, p| match acc {
                None => Some(*p),
                Some(a) => Some(Position {
                    offset: Span {
                        start: a.offset.start.min(p.offset.start),
                        end: a.offset.end.max(p.offset.end),
                    },
                    start: a.start.min(p.start),
                    end: a.end.max(p.end),
                }),
            })
            .unwrap_or_default()
    }

    pub fn to(&self, other: &Position) -> Position {
        Position::merge([self, other])
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_valid() {
            write!(f, "{}:{}", self.start.line, self.start.column)
        } else {
            write!(f, "?")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Warning,
    Info,
    Hint,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Hint => "hint",
        })
    }
}

/// Machine-readable diagnostic category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    InvalidSyntax,
    UnexpectedToken,
    UnterminatedLiteral,
    UnknownType,
    UnknownEntity,
    UnknownAttribute,
    DuplicateEntity,
    UnsupportedStatement,
    UnsupportedDialect,
    InvalidJson,
    IgnoredConstruct,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidSyntax => "invalid_syntax",
            Self::UnexpectedToken => "unexpected_token",
            Self::UnterminatedLiteral => "unterminated_literal",
            Self::UnknownType => "unknown_type",
            Self::UnknownEntity => "unknown_entity",
            Self::UnknownAttribute => "unknown_attribute",
            Self::DuplicateEntity => "duplicate_entity",
            Self::UnsupportedStatement => "unsupported_statement",
            Self::UnsupportedDialect => "unsupported_dialect",
            Self::InvalidJson => "invalid_json",
            Self::IgnoredConstruct => "ignored_construct",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: Level,
    pub kind: DiagnosticKind,
    pub message: String,
    pub position: Position,
}

impl Diagnostic {
    pub fn new(level: Level, kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Self {
            level,
            kind,
            message: message.into(),
            position,
        }
    }

    pub fn error(kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Self::new(Level::Error, kind, message, position)
    }

    pub fn warning(kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Self::new(Level::Warning, kind, message, position)
    }

    pub fn info(kind: DiagnosticKind, message: impl Into<String>, position: Position) -> Self {
        Self::new(Level::Info, kind, message, position)
    }

    pub fn is_error(&self) -> bool {
        self.level == Level::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] at {}: {}",
            self.level,
            self.kind.as_str(),
            self.position,
            self.message
        )
    }
}

/// A value (possibly partial) and the diagnostics produced while building it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseResult<T> {
    pub value: Option<T>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> ParseResult<T> {
    pub fn success(value: T) -> Self {
        Self {
            value: Some(value),
            diagnostics: Vec::new(),
        }
    }

    pub fn partial(value: T, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            value: Some(value),
            diagnostics,
        }
    }

    pub fn failure(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            value: None,
            diagnostics,
        }
    }

    pub fn value(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<T> {
        self.value
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.level == Level::Warning)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    /// Value present and no error-level diagnostics.
    pub fn is_clean(&self) -> bool {
        self.value.is_some() && !self.has_errors()
    }

    pub fn with_diagnostics(mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) -> Self {
        self.diagnostics.extend(diagnostics);
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseResult<U> {
        ParseResult {
            value: self.value.map(f),
            diagnostics: self.diagnostics,
        }
    }

    /// Chains a dependent parse; diagnostics of both stages are kept, in order.
    pub fn and_then<U>(self, f: impl FnOnce(T) -> ParseResult<U>) -> ParseResult<U> {
        match self.value {
            Some(value) => {
                let next = f(value);
                let mut diagnostics = self.diagnostics;
                diagnostics.extend(next.diagnostics);
                ParseResult {
                    value: next.value,
                    diagnostics,
                }
            }
            None => ParseResult::failure(self.diagnostics),
        }
    }

    pub fn fold<U>(
        self,
        on_value: impl FnOnce(T, Vec<Diagnostic>) -> U,
        on_failure: impl FnOnce(Vec<Diagnostic>) -> U,
    ) -> U {
        match self.value {
            Some(value) => on_value(value, self.diagnostics),
            None => on_failure(self.diagnostics),
        }
    }

    /// Gathers many results; failed items are dropped but keep their diagnostics.
    pub fn collect(results: impl IntoIterator<Item = ParseResult<T>>) -> ParseResult<Vec<T>> {
        let mut values = Vec::new();
        let mut diagnostics = Vec::new();
        for result in results {
            values.extend(result.value);
            diagnostics.extend(result.diagnostics);
        }
        ParseResult::partial(values, diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pos(start: usize, end: usize, line: usize, col: usize, end_col: usize) -> Position {
        Position::new(Span { start, end }, Location::new(line, col), Location::new(line, end_col))
    }

    #[test]
    fn test_merge_positions() {
        let a = pos(4, 8, 1, 5, 9);
        let b = pos(20, 25, 2, 3, 8);
        let merged = Position::merge([&a, &b]);
        assert_eq!(merged.offset, Span { start: 4, end: 25 });
        assert_eq!(merged.start, Location::new(1, 5));
        assert_eq!(merged.end, Location::new(2, 8));
    }

    #[test]
    fn test_merge_skips_invalid() {
        let a = pos(4, 8, 1, 5, 9);
        let merged = Position::merge([&Position::default(), &a]);
        assert_eq!(merged, a);
        assert_eq!(Position::merge([&Position::default()]), Position::default());
        assert_eq!(Position::merge(std::iter::empty()), Position::default());
    }

    #[test]
    fn test_and_then_concatenates_diagnostics() {
        let first = ParseResult::partial(
            1,
            vec![Diagnostic::warning(DiagnosticKind::UnknownType, "a", Position::default())],
        );
        let result = first.and_then(|n| {
            ParseResult::partial(
                n + 1,
                vec![Diagnostic::error(DiagnosticKind::InvalidSyntax, "b", Position::default())],
            )
        });
        assert_eq!(result.value, Some(2));
        let messages: Vec<_> = result.diagnostics.iter().map(|d| d.message.as_str()).collect();
        assert_eq!(messages, vec!["a", "b"]);
        assert!(result.has_errors());
        assert!(!result.is_clean());
    }

    #[test]
    fn test_and_then_short_circuits_on_failure() {
        let failed: ParseResult<i32> =
            ParseResult::failure(vec![Diagnostic::error(DiagnosticKind::InvalidSyntax, "x", Position::default())]);
        let result = failed.and_then(|n| ParseResult::success(n * 2));
        assert!(result.value.is_none());
        assert_eq!(result.errors().count(), 1);
    }

    #[test]
    fn test_collect_and_fold() {
        let results = vec![
            ParseResult::success(1),
            ParseResult::failure(vec![Diagnostic::error(DiagnosticKind::InvalidSyntax, "bad", Position::default())]),
            ParseResult::success(3),
        ];
        let collected = ParseResult::collect(results);
        assert_eq!(collected.value, Some(vec![1, 3]));
        let summary = collected.fold(|v, d| format!("{} values, {} diagnostics", v.len(), d.len()), |_| "none".into());
        assert_eq!(summary, "2 values, 1 diagnostics");
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::error(DiagnosticKind::UnexpectedToken, "expected FROM", pos(7, 8, 1, 8, 9));
        assert_eq!(d.to_string(), "error [unexpected_token] at 1:8: expected FROM");
    }
}

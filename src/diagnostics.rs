//! Diagnostic collection for a single compilation run.
//!
//! The lexer and the parser both receive a `&mut ErrorHandler` and append to
//! it instead of failing. Reporting never clears the handler, so the same run
//! can be reported (or inspected by a test) as many times as needed.

use std::fmt;
use std::io::{self, Write};

use log::debug;
use serde::Serialize;

use crate::compiler::lexer::Position;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    /// Reserved: nothing in the front end emits warnings yet.
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => f.write_str("error"),
            Severity::Warning => f.write_str("warning"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticStage {
    Lexical,
    Syntax,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCode {
    // Lexical
    UnexpectedCharacter,
    UnterminatedString,
    UnterminatedComment,
    MalformedNumber,
    InvalidEscape,

    // Syntax
    ExpectedToken,
    ExpectedExpression,
    ExpectedIdentifier,
    InvalidAssignmentTarget,
    MissingInitializer,
    NestingTooDeep,
}

impl DiagnosticCode {
    pub fn stage(&self) -> DiagnosticStage {
        match self {
            DiagnosticCode::UnexpectedCharacter
            | DiagnosticCode::UnterminatedString
            | DiagnosticCode::UnterminatedComment
            | DiagnosticCode::MalformedNumber
            | DiagnosticCode::InvalidEscape => DiagnosticStage::Lexical,
            DiagnosticCode::ExpectedToken
            | DiagnosticCode::ExpectedExpression
            | DiagnosticCode::ExpectedIdentifier
            | DiagnosticCode::InvalidAssignmentTarget
            | DiagnosticCode::MissingInitializer
            | DiagnosticCode::NestingTooDeep => DiagnosticStage::Syntax,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::UnexpectedCharacter => "E0101",
            DiagnosticCode::UnterminatedString => "E0102",
            DiagnosticCode::UnterminatedComment => "E0103",
            DiagnosticCode::MalformedNumber => "E0104",
            DiagnosticCode::InvalidEscape => "E0105",
            DiagnosticCode::ExpectedToken => "E0201",
            DiagnosticCode::ExpectedExpression => "E0202",
            DiagnosticCode::ExpectedIdentifier => "E0203",
            DiagnosticCode::InvalidAssignmentTarget => "E0204",
            DiagnosticCode::MissingInitializer => "E0205",
            DiagnosticCode::NestingTooDeep => "E0206",
        }
    }

    /// Codes whose literal runs to the end of the source, leaving nothing
    /// for the parser to find there.
    fn swallows_rest(&self) -> bool {
        matches!(
            self,
            DiagnosticCode::UnterminatedString | DiagnosticCode::UnterminatedComment
        )
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    pub position: Position,
    pub lexeme: Option<String>,
}

impl Diagnostic {
    pub fn error(code: DiagnosticCode, message: impl Into<String>, position: Position) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
            position,
            lexeme: None,
        }
    }

    pub fn warning(code: DiagnosticCode, message: impl Into<String>, position: Position) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, message, position)
        }
    }

    pub fn with_lexeme(mut self, lexeme: impl Into<String>) -> Self {
        self.lexeme = Some(lexeme.into());
        self
    }

    pub fn stage(&self) -> DiagnosticStage {
        self.code.stage()
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Line {}, column {}: {}[{}]: {}",
            self.position.line, self.position.column, self.severity, self.code, self.message
        )?;
        if let Some(lexeme) = &self.lexeme {
            write!(f, ", found '{}'", lexeme)?;
        }
        Ok(())
    }
}

/// Ordered sink for the diagnostics of one run, in detection order.
#[derive(Debug, Default, Clone)]
pub struct ErrorHandler {
    diagnostics: Vec<Diagnostic>,
}

impl ErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        debug!("recorded {:?} diagnostic: {}", diagnostic.stage(), diagnostic);
        self.diagnostics.push(diagnostic);
    }

    pub fn error(&mut self, code: DiagnosticCode, message: impl Into<String>, position: Position) {
        self.record(Diagnostic::error(code, message, position));
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.severity == Severity::Error)
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// True once an unterminated string or comment consumed the end of the
    /// source. Errors the parser would raise at end-of-input are then
    /// consequences of that one defect.
    pub fn swallowed_end_of_input(&self) -> bool {
        self.diagnostics.iter().any(|d| d.code.swallows_rest())
    }

    /// One line per diagnostic, in detection order.
    pub fn format_report(&self) -> String {
        let mut out = String::new();
        for diagnostic in &self.diagnostics {
            out.push_str(&diagnostic.to_string());
            out.push('\n');
        }
        out
    }

    pub fn report_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(self.format_report().as_bytes())
    }

    pub fn report(&self) {
        eprint!("{}", self.format_report());
    }
}

impl fmt::Display for ErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format_report().trim_end())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize, column: usize) -> Position {
        Position { line, column, offset: 0 }
    }

    #[test]
    fn test_empty_handler_has_no_errors() {
        let handler = ErrorHandler::new();
        assert!(!handler.has_errors());
        assert!(handler.is_empty());
        assert_eq!(handler.format_report(), "");
    }

    #[test]
    fn test_warnings_do_not_count_as_errors() {
        let mut handler = ErrorHandler::new();
        handler.record(Diagnostic::warning(
            DiagnosticCode::ExpectedToken,
            "Redundant ';'",
            at(1, 1),
        ));
        assert!(!handler.has_errors());
        assert_eq!(handler.error_count(), 0);
        assert_eq!(handler.diagnostics().len(), 1);
    }

    #[test]
    fn test_report_preserves_detection_order() {
        let mut handler = ErrorHandler::new();
        handler.error(DiagnosticCode::UnexpectedCharacter, "Unexpected character '@'", at(1, 9));
        handler.record(
            Diagnostic::error(DiagnosticCode::ExpectedToken, "Expected ';' after expression", at(2, 3))
                .with_lexeme("}"),
        );

        let report = handler.format_report();
        let lines: Vec<&str> = report.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Line 1, column 9: error[E0101]: Unexpected character '@'",
                "Line 2, column 3: error[E0201]: Expected ';' after expression, found '}'",
            ]
        );
    }

    #[test]
    fn test_report_is_idempotent() {
        let mut handler = ErrorHandler::new();
        handler.error(DiagnosticCode::MalformedNumber, "Expected digit after '.'", at(4, 2));

        let mut first = Vec::new();
        let mut second = Vec::new();
        handler.report_to(&mut first).unwrap();
        handler.report_to(&mut second).unwrap();
        assert_eq!(first, second);
        assert_eq!(handler.error_count(), 1);
    }

    #[test]
    fn test_stage_follows_code() {
        assert_eq!(DiagnosticCode::UnterminatedString.stage(), DiagnosticStage::Lexical);
        assert_eq!(DiagnosticCode::ExpectedExpression.stage(), DiagnosticStage::Syntax);
    }

    #[test]
    fn test_swallowed_end_of_input() {
        let mut handler = ErrorHandler::new();
        handler.error(DiagnosticCode::MalformedNumber, "bad", at(1, 1));
        assert!(!handler.swallowed_end_of_input());
        handler.error(DiagnosticCode::UnterminatedComment, "Unterminated block comment", at(2, 1));
        assert!(handler.swallowed_end_of_input());
    }
}

use std::iter::Peekable;
use std::str::CharIndices;

use log::{debug, trace};
use serde::Serialize;

use crate::diagnostics::{Diagnostic, DiagnosticCode, ErrorHandler};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TokenKind {
    // Keywords
    Var, Const, Print, If, Else, While, Func, Return, Import,
    True, False,

    // Literals
    Identifier(String), Integer(i64), Float(f64), StringLiteral(String),

    // Operators
    Plus, Minus, Star, Slash, Percent,
    Eq, EqEq, Neq, Lt, Gt, LtEq, GtEq,
    And, Or, Bang,

    // Punctuation
    LParen, RParen, LBrace, RBrace, Comma, Semicolon,

    /// A character the lexer could not classify. Already reported.
    Illegal,
    Eof,
}

impl TokenKind {
    /// Keywords that can only appear at the start of a statement.
    pub fn starts_statement(&self) -> bool {
        matches!(
            self,
            TokenKind::Var
                | TokenKind::Const
                | TokenKind::Print
                | TokenKind::If
                | TokenKind::While
                | TokenKind::Func
                | TokenKind::Return
                | TokenKind::Import
        )
    }
}

/// Looked up once the whole identifier has been scanned.
fn keyword(ident: &str) -> Option<TokenKind> {
    let kind = match ident {
        "var" => TokenKind::Var,
        "const" => TokenKind::Const,
        "print" => TokenKind::Print,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "func" => TokenKind::Func,
        "return" => TokenKind::Return,
        "import" => TokenKind::Import,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        _ => return None,
    };
    Some(kind)
}

/// 1-based line and column, plus the byte offset into the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub offset: usize,
}

impl Default for Position {
    fn default() -> Self {
        Self { line: 1, column: 1, offset: 0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub kind: TokenKind,
    /// Exact source text of the token (quotes included for strings).
    pub lexeme: String,
    pub position: Position,
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    errors: &'a mut ErrorHandler,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, errors: &'a mut ErrorHandler) -> Self {
        Lexer {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            errors,
        }
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia();
            let start = self.position();
            let Some(c) = self.bump() else { break };

            let kind = match c {
                '{' => TokenKind::LBrace,
                '}' => TokenKind::RBrace,
                '(' => TokenKind::LParen,
                ')' => TokenKind::RParen,
                ',' => TokenKind::Comma,
                ';' => TokenKind::Semicolon,
                '+' => TokenKind::Plus,
                '-' => TokenKind::Minus,
                '*' => TokenKind::Star,
                '/' => TokenKind::Slash,
                '%' => TokenKind::Percent,
                '=' => {
                    if self.eat('=') { TokenKind::EqEq } else { TokenKind::Eq }
                }
                '!' => {
                    if self.eat('=') { TokenKind::Neq } else { TokenKind::Bang }
                }
                '<' => {
                    if self.eat('=') { TokenKind::LtEq } else { TokenKind::Lt }
                }
                '>' => {
                    if self.eat('=') { TokenKind::GtEq } else { TokenKind::Gt }
                }
                '&' => {
                    if self.eat('&') {
                        TokenKind::And
                    } else {
                        self.illegal(c, start, Some("did you mean '&&'?"))
                    }
                }
                '|' => {
                    if self.eat('|') {
                        TokenKind::Or
                    } else {
                        self.illegal(c, start, Some("did you mean '||'?"))
                    }
                }
                '"' => self.read_string(start),
                c if c.is_ascii_digit() => self.read_number(start),
                c if c.is_alphabetic() || c == '_' => self.read_identifier(start),
                _ => self.illegal(c, start, None),
            };

            let end = self.offset();
            let token = Token {
                kind,
                lexeme: self.source[start.offset..end].to_string(),
                position: start,
            };
            trace!("token {:?} at {}:{}", token.kind, start.line, start.column);
            tokens.push(token);
        }

        tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: String::new(),
            position: self.position(),
        });
        debug!("lexed {} tokens", tokens.len());
        tokens
    }

    fn offset(&mut self) -> usize {
        self.chars
            .peek()
            .map(|&(i, _)| i)
            .unwrap_or(self.source.len())
    }

    fn position(&mut self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.offset(),
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, c)| c)
    }

    fn bump(&mut self) -> Option<char> {
        let (_, c) = self.chars.next()?;
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn rest_starts_with(&mut self, prefix: &str) -> bool {
        let offset = self.offset();
        self.source[offset..].starts_with(prefix)
    }

    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.bump();
                }
                Some('/') if self.rest_starts_with("//") => {
                    while let Some(c) = self.peek() {
                        if c == '\n' { break; }
                        self.bump();
                    }
                }
                Some('/') if self.rest_starts_with("/*") => {
                    let start = self.position();
                    self.bump();
                    self.bump();
                    let mut closed = false;
                    while let Some(c) = self.bump() {
                        if c == '*' && self.eat('/') {
                            closed = true;
                            break;
                        }
                    }
                    if !closed {
                        self.errors.error(
                            DiagnosticCode::UnterminatedComment,
                            "Unterminated block comment",
                            start,
                        );
                    }
                }
                _ => return,
            }
        }
    }

    fn illegal(&mut self, c: char, start: Position, hint: Option<&str>) -> TokenKind {
        let message = match hint {
            Some(hint) => format!("Unexpected character '{}' ({})", c, hint),
            None => format!("Unexpected character '{}'", c),
        };
        self.errors
            .record(Diagnostic::error(DiagnosticCode::UnexpectedCharacter, message, start).with_lexeme(c));
        TokenKind::Illegal
    }

    fn read_string(&mut self, start: Position) -> TokenKind {
        let mut s = String::new();
        loop {
            let escape_at = self.position();
            match self.bump() {
                None => {
                    self.errors.error(
                        DiagnosticCode::UnterminatedString,
                        "Unterminated string literal",
                        start,
                    );
                    return TokenKind::StringLiteral(s);
                }
                Some('"') => return TokenKind::StringLiteral(s),
                Some('\\') => match self.bump() {
                    Some('n') => s.push('\n'),
                    Some('t') => s.push('\t'),
                    Some('r') => s.push('\r'),
                    Some('0') => s.push('\0'),
                    Some('\\') => s.push('\\'),
                    Some('"') => s.push('"'),
                    Some(other) => {
                        self.errors.record(
                            Diagnostic::error(
                                DiagnosticCode::InvalidEscape,
                                format!("Unknown escape sequence '\\{}'", other),
                                escape_at,
                            )
                            .with_lexeme(format!("\\{}", other)),
                        );
                        s.push(other);
                    }
                    // Reported as unterminated on the next iteration.
                    None => {}
                },
                Some(c) => s.push(c),
            }
        }
    }

    fn read_number(&mut self, start: Position) -> TokenKind {
        let source = self.source;
        self.skip_digits();

        if !self.eat('.') {
            let end = self.offset();
            let text = &source[start.offset..end];
            return match text.parse::<i64>() {
                Ok(value) => TokenKind::Integer(value),
                Err(_) => {
                    self.malformed_number("Integer literal out of range", start, text);
                    TokenKind::Integer(0)
                }
            };
        }

        let fraction_start = self.offset();
        self.skip_digits();
        let end = self.offset();
        let text = &source[start.offset..end];
        if end == fraction_start {
            self.malformed_number("Malformed number: expected digit after '.'", start, text);
            return TokenKind::Float(0.0);
        }
        match text.parse::<f64>() {
            Ok(value) if value.is_finite() => TokenKind::Float(value),
            _ => {
                self.malformed_number("Number literal out of range", start, text);
                TokenKind::Float(0.0)
            }
        }
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
    }

    fn malformed_number(&mut self, message: &str, start: Position, text: &str) {
        self.errors.record(
            Diagnostic::error(DiagnosticCode::MalformedNumber, message, start).with_lexeme(text),
        );
    }

    fn read_identifier(&mut self, start: Position) -> TokenKind {
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        let end = self.offset();
        let s = &self.source[start.offset..end];
        keyword(s).unwrap_or_else(|| TokenKind::Identifier(s.to_string()))
    }
}

/// Lexes `source` in one pass, recording problems in `errors`.
pub fn tokenize(source: &str, errors: &mut ErrorHandler) -> Vec<Token> {
    Lexer::new(source, errors).tokenize()
}

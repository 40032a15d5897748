use super::lexer::{Position, Token, TokenKind};
use crate::ast::{BinaryOp, Expr, Literal, Parameter, Program, Stmt, UnaryOp};
use crate::diagnostics::{Diagnostic, DiagnosticCode, ErrorHandler};
use crate::serializer;
use log::{debug, trace};
use serde_json::Value as JsonValue;

pub const DEFAULT_MAX_DEPTH: usize = 64;
/// Highest nesting limit a configuration may ask for.
pub const MAX_DEPTH_LIMIT: usize = 256;

/// A diagnostic has been recorded; unwind to the enclosing statement and
/// synchronize there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseError;

type ParseResult<T> = Result<T, ParseError>;

pub struct Parser<'e> {
    tokens: Vec<Token>,
    pos: usize,
    errors: &'e mut ErrorHandler,
    panic_mode: bool,
    depth: usize,
    max_depth: usize,
    program: Program,
    parsed: bool,
}

impl<'e> Parser<'e> {
    pub fn new(mut tokens: Vec<Token>, errors: &'e mut ErrorHandler) -> Self {
        if !matches!(tokens.last(), Some(Token { kind: TokenKind::Eof, .. })) {
            let position = tokens.last().map(end_of).unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                position,
            });
        }
        Parser {
            tokens,
            pos: 0,
            errors,
            panic_mode: false,
            depth: 0,
            max_depth: DEFAULT_MAX_DEPTH,
            program: Program::default(),
            parsed: false,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.clamp(1, MAX_DEPTH_LIMIT);
        self
    }

    /// Parses the whole token sequence. Always returns a program, possibly
    /// missing the statements that failed; check the error handler before
    /// trusting it. Later calls return the same tree.
    pub fn parse(&mut self) -> &Program {
        if !self.parsed {
            let mut body = Vec::new();
            while !self.is_at_end() {
                if let Some(stmt) = self.declaration() {
                    body.push(stmt);
                }
            }
            debug!(
                "parsed {} statements from {} tokens ({} errors recorded)",
                body.len(),
                self.tokens.len(),
                self.errors.error_count()
            );
            self.program = Program::new(body);
            self.parsed = true;
        }
        &self.program
    }

    pub fn into_program(mut self) -> Program {
        self.parse();
        self.program
    }

    /// JSON for the last parsed program, whether or not errors were recorded.
    pub fn to_json(&self) -> Result<JsonValue, String> {
        serializer::to_json(&self.program)
    }

    // --- Token cursor ---

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    fn peek_next(&self) -> &Token {
        let next = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[next]
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.pos += 1;
        }
        &self.tokens[self.pos - 1]
    }

    fn match_token(&mut self, token: TokenKind) -> bool {
        if self.check(&token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn check(&self, token: &TokenKind) -> bool {
        if self.is_at_end() { return false; }
        // Payload-carrying kinds compare by variant only
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(token)
    }

    fn is_at_end(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn consume(&mut self, expected: TokenKind, msg: &str) -> ParseResult<&Token> {
        if self.check(&expected) {
            Ok(self.advance())
        } else {
            Err(self.error_at_current(DiagnosticCode::ExpectedToken, msg))
        }
    }

    fn consume_identifier(&mut self, msg: &str) -> ParseResult<String> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Ok(name)
        } else {
            Err(self.error_at_current(DiagnosticCode::ExpectedIdentifier, msg))
        }
    }

    /// Optional type name written after a declared name: `var x int`.
    fn type_annotation(&mut self) -> Option<String> {
        if let TokenKind::Identifier(name) = &self.peek().kind {
            let name = name.clone();
            self.advance();
            Some(name)
        } else {
            None
        }
    }

    // --- Diagnostics & recovery ---

    fn error_at_current(&mut self, code: DiagnosticCode, message: impl Into<String>) -> ParseError {
        let token = self.peek().clone();
        self.error_at(&token, code, message)
    }

    fn error_at(&mut self, token: &Token, code: DiagnosticCode, message: impl Into<String>) -> ParseError {
        if self.panic_mode {
            return ParseError;
        }
        self.panic_mode = true;

        // Both of these were already reported by the lexer.
        let lexed_away = match token.kind {
            TokenKind::Illegal => true,
            TokenKind::Eof => self.errors.swallowed_end_of_input(),
            _ => false,
        };
        if lexed_away {
            trace!("suppressed follow-up error at {}:{}", token.position.line, token.position.column);
            return ParseError;
        }

        let diagnostic = Diagnostic::error(code, message, token.position);
        let diagnostic = match token.kind {
            TokenKind::Eof => diagnostic.with_lexeme("end of input"),
            _ => diagnostic.with_lexeme(token.lexeme.clone()),
        };
        self.errors.record(diagnostic);
        ParseError
    }

    /// Skips tokens until a plausible statement boundary: just after a `;`,
    /// before a statement keyword or a `}`, or at end of input. Braces opened
    /// by the failed statement are skipped together with their body, along
    /// with any `else` branches that follow. Skips at least one token when
    /// the failed statement consumed nothing.
    fn synchronize(&mut self, start: usize) {
        self.panic_mode = false;
        let mut open = self.tokens[start..self.pos]
            .iter()
            .fold(0usize, |open, token| match token.kind {
                TokenKind::LBrace => open + 1,
                TokenKind::RBrace => open.saturating_sub(1),
                _ => open,
            });
        let mut closed = false;
        let mut skip_one = self.pos == start;

        while !self.is_at_end() {
            if open == 0 && !skip_one {
                let previous = &self.previous().kind;
                let kind = &self.peek().kind;
                if *previous == TokenKind::Semicolon {
                    break;
                }
                if closed && *kind != TokenKind::Else {
                    break;
                }
                if *previous != TokenKind::Else && (kind.starts_statement() || *kind == TokenKind::RBrace) {
                    break;
                }
            }
            skip_one = false;

            closed = false;
            match self.peek().kind {
                TokenKind::LBrace => open += 1,
                TokenKind::RBrace if open > 0 => {
                    open -= 1;
                    closed = open == 0;
                }
                _ => {}
            }
            trace!("skipping {:?} while synchronizing", self.peek().kind);
            self.advance();
        }
    }

    /// Runs `rule` one nesting level deeper, or reports and bails out once
    /// the configured depth is reached.
    fn nested<T>(&mut self, rule: fn(&mut Self) -> T, too_deep: fn() -> T) -> T {
        if self.depth >= self.max_depth {
            let message = self.too_deep_message();
            self.error_at_current(DiagnosticCode::NestingTooDeep, message);
            return too_deep();
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    fn too_deep_message(&self) -> String {
        format!("Nesting exceeds the maximum depth of {}", self.max_depth)
    }

    // --- Statements ---

    /// One statement with recovery. `None` when the statement was dropped.
    fn declaration(&mut self) -> Option<Stmt> {
        let start = self.pos;
        let result = self.parse_statement();
        if self.panic_mode {
            self.synchronize(start);
        }
        result.ok()
    }

    fn parse_statement(&mut self) -> ParseResult<Stmt> {
        match self.peek().kind {
            TokenKind::Var => self.parse_var(),
            TokenKind::Const => self.parse_const(),
            TokenKind::Print => self.parse_print(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Func => self.parse_func(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Import => self.parse_import(),
            TokenKind::LBrace => {
                let body = self.parse_block("Expect '{' to start block")?;
                Ok(Stmt::Block { body })
            }
            _ => self.parse_expression_statement(),
        }
    }

    fn parse_block(&mut self, open_msg: &str) -> ParseResult<Vec<Stmt>> {
        self.consume(TokenKind::LBrace, open_msg)?;
        self.nested(Self::block_body, || Err(ParseError))
    }

    fn block_body(&mut self) -> ParseResult<Vec<Stmt>> {
        let mut block = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                block.push(stmt);
            }
        }
        self.consume(TokenKind::RBrace, "Expect '}' after block")?;
        Ok(block)
    }

    fn parse_var(&mut self) -> ParseResult<Stmt> {
        self.advance(); // Eat 'var'
        let name = self.consume_identifier("Expect variable name after 'var'")?;
        let var_type = self.type_annotation();

        let initializer = if self.match_token(TokenKind::Eq) {
            Some(self.parse_expression())
        } else {
            None
        };

        self.consume(TokenKind::Semicolon, "Expect ';' after variable declaration")?;
        Ok(Stmt::VarDecl { name, var_type, initializer })
    }

    fn parse_const(&mut self) -> ParseResult<Stmt> {
        self.advance(); // Eat 'const'
        let name = self.consume_identifier("Expect constant name after 'const'")?;
        let var_type = self.type_annotation();

        if !self.match_token(TokenKind::Eq) {
            let message = format!("Constant '{}' must be initialized", name);
            return Err(self.error_at_current(DiagnosticCode::MissingInitializer, message));
        }
        let initializer = self.parse_expression();

        self.consume(TokenKind::Semicolon, "Expect ';' after constant declaration")?;
        Ok(Stmt::ConstDecl { name, var_type, initializer })
    }

    fn parse_print(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let expression = self.parse_expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after print statement")?;
        Ok(Stmt::Print { expression })
    }

    fn parse_if(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let condition = self.parse_expression();
        let consequence = self.parse_block("Expect '{' after if condition")?;

        let mut alternative = Vec::new();
        if self.match_token(TokenKind::Else) {
            if self.check(&TokenKind::If) {
                // Each `else if` link sits one level deeper in the tree
                alternative.push(self.nested(Self::parse_if, || Err(ParseError))?);
            } else {
                alternative = self.parse_block("Expect '{' after 'else'")?;
            }
        }

        Ok(Stmt::If { condition, consequence, alternative })
    }

    fn parse_while(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let condition = self.parse_expression();
        let body = self.parse_block("Expect '{' after while condition")?;
        Ok(Stmt::While { condition, body })
    }

    fn parse_func(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let name = self.consume_identifier("Expect function name after 'func'")?;
        let parameters = self.parse_params_list()?;
        let return_type = self.type_annotation();
        let body = self.parse_block("Expect '{' before function body")?;
        Ok(Stmt::FunctionDecl { name, parameters, return_type, body })
    }

    fn parse_params_list(&mut self) -> ParseResult<Vec<Parameter>> {
        self.consume(TokenKind::LParen, "Expect '(' after function name")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                let name = self.consume_identifier("Expect parameter name")?;
                let param_type = self.type_annotation();
                params.push(Parameter { name, param_type });
                if !self.match_token(TokenKind::Comma) { break; }
            }
        }
        self.consume(TokenKind::RParen, "Expect ')' after parameters")?;
        Ok(params)
    }

    fn parse_return(&mut self) -> ParseResult<Stmt> {
        self.advance();
        let value = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression())
        };
        self.consume(TokenKind::Semicolon, "Expect ';' after return value")?;
        Ok(Stmt::Return { value })
    }

    fn parse_import(&mut self) -> ParseResult<Stmt> {
        self.advance(); // Eat 'import'
        let module_name = self.consume_identifier("Expect module name after 'import'")?;
        self.consume(TokenKind::Semicolon, "Expect ';' after import")?;
        Ok(Stmt::Import { module_name })
    }

    fn parse_expression_statement(&mut self) -> ParseResult<Stmt> {
        let expression = self.parse_expression();
        self.consume(TokenKind::Semicolon, "Expect ';' after expression")?;
        Ok(Stmt::ExpressionStatement { expression })
    }

    // --- Expressions ---
    // assignment > || > && > equality > comparison > additive > multiplicative > unary > primary
    //
    // Expression rules never fail: a broken sub-expression becomes Expr::Error
    // and the statement rule decides what to do once it sees panic mode.

    pub fn parse_expression(&mut self) -> Expr {
        self.nested(Self::parse_assignment, || Expr::Error)
    }

    fn parse_assignment(&mut self) -> Expr {
        let target = self.parse_logical_or();

        if self.check(&TokenKind::Eq) {
            let equals = self.advance().clone();
            // Right-associative: a = b = c
            let value = self.parse_expression();

            return match target {
                Expr::Variable { name } => Expr::Assign {
                    name,
                    value: Box::new(value),
                },
                Expr::Error => Expr::Error,
                _ => {
                    self.error_at(&equals, DiagnosticCode::InvalidAssignmentTarget, "Invalid assignment target");
                    Expr::Error
                }
            };
        }

        target
    }

    fn parse_logical_or(&mut self) -> Expr {
        self.binary_level(Self::parse_logical_and, |kind| match kind {
            TokenKind::Or => Some(BinaryOp::Or),
            _ => None,
        })
    }

    fn parse_logical_and(&mut self) -> Expr {
        self.binary_level(Self::parse_equality, |kind| match kind {
            TokenKind::And => Some(BinaryOp::And),
            _ => None,
        })
    }

    fn parse_equality(&mut self) -> Expr {
        self.binary_level(Self::parse_comparison, |kind| match kind {
            TokenKind::EqEq => Some(BinaryOp::Equal),
            TokenKind::Neq => Some(BinaryOp::NotEqual),
            _ => None,
        })
    }

    fn parse_comparison(&mut self) -> Expr {
        self.binary_level(Self::parse_additive, |kind| match kind {
            TokenKind::Lt => Some(BinaryOp::LessThan),
            TokenKind::Gt => Some(BinaryOp::GreaterThan),
            TokenKind::LtEq => Some(BinaryOp::LessEqual),
            TokenKind::GtEq => Some(BinaryOp::GreaterEqual),
            _ => None,
        })
    }

    fn parse_additive(&mut self) -> Expr {
        self.binary_level(Self::parse_multiplicative, |kind| match kind {
            TokenKind::Plus => Some(BinaryOp::Add),
            TokenKind::Minus => Some(BinaryOp::Sub),
            _ => None,
        })
    }

    fn parse_multiplicative(&mut self) -> Expr {
        self.binary_level(Self::parse_unary, |kind| match kind {
            TokenKind::Star => Some(BinaryOp::Mul),
            TokenKind::Slash => Some(BinaryOp::Div),
            TokenKind::Percent => Some(BinaryOp::Modulo),
            _ => None,
        })
    }

    /// One left-associative precedence level. Every fold makes the tree one
    /// level taller, so the chain counts against the nesting limit too.
    fn binary_level(
        &mut self,
        operand: fn(&mut Self) -> Expr,
        operator: fn(&TokenKind) -> Option<BinaryOp>,
    ) -> Expr {
        let mut left = operand(self);
        let mut height = left.depth();

        while let Some(op) = operator(&self.peek().kind) {
            let op_token = self.advance().clone();
            let right = operand(self);
            height = height.max(right.depth()) + 1;

            if self.depth + height > self.max_depth {
                let message = self.too_deep_message();
                self.error_at(&op_token, DiagnosticCode::NestingTooDeep, message);
                left = Expr::Error;
                height = 1;
            } else {
                left = Expr::binary(left, op, right);
            }
        }
        left
    }

    fn parse_unary(&mut self) -> Expr {
        let op = match self.peek().kind {
            TokenKind::Minus => UnaryOp::Negate,
            TokenKind::Plus => UnaryOp::Plus,
            TokenKind::Bang => UnaryOp::Not,
            _ => return self.parse_primary(),
        };
        self.advance();
        // Recursive so that `--x` and `!-x` nest
        let operand = self.nested(Self::parse_unary, || Expr::Error);
        Expr::unary(op, operand)
    }

    fn parse_primary(&mut self) -> Expr {
        let expr = match &self.peek().kind {
            TokenKind::Integer(n) => Expr::literal(*n),
            TokenKind::Float(f) => Expr::literal(*f),
            TokenKind::StringLiteral(s) => Expr::Literal { value: Literal::String(s.clone()) },
            TokenKind::True => Expr::literal(true),
            TokenKind::False => Expr::literal(false),

            TokenKind::Identifier(name) => {
                let name = name.clone();
                if self.peek_next().kind == TokenKind::LParen {
                    return self.parse_call(name);
                }
                Expr::Variable { name }
            }

            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression();
                if self.consume(TokenKind::RParen, "Expect ')' after expression").is_err() {
                    return Expr::Error;
                }
                return Expr::grouping(inner);
            }

            TokenKind::Illegal => {
                // Reported by the lexer; only enter panic mode.
                let token = self.advance().clone();
                self.error_at(&token, DiagnosticCode::ExpectedExpression, "Expect expression");
                return Expr::Error;
            }

            _ => {
                self.error_at_current(DiagnosticCode::ExpectedExpression, "Expect expression");
                return Expr::Error;
            }
        };

        self.advance();
        expr
    }

    fn parse_call(&mut self, name: String) -> Expr {
        self.advance(); // Eat the name
        self.advance(); // Eat '('
        let mut arguments = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                arguments.push(self.parse_expression());
                if !self.match_token(TokenKind::Comma) { break; }
            }
        }
        if self.consume(TokenKind::RParen, "Expect ')' after arguments").is_err() {
            return Expr::Error;
        }
        Expr::Call { name, arguments }
    }
}

fn end_of(token: &Token) -> Position {
    let mut position = token.position;
    position.offset += token.lexeme.len();
    position.column += token.lexeme.chars().count();
    position
}

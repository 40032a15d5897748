pub mod lexer;
pub mod parser;

use log::debug;
use serde_json::Value as JsonValue;

use crate::ast::Program;
use crate::config::ParserConfig;
use crate::diagnostics::ErrorHandler;
use crate::serializer;
use lexer::Lexer;
use parser::Parser;

/// Result of running the front end over one source text.
#[derive(Debug)]
pub struct Compilation {
    /// Best-effort tree; only trustworthy when `errors` is empty.
    pub program: Program,
    pub errors: ErrorHandler,
}

impl Compilation {
    pub fn has_errors(&self) -> bool {
        self.errors.has_errors()
    }

    /// The JSON document, withheld when any error was recorded.
    pub fn to_json(&self) -> Result<JsonValue, String> {
        if self.errors.has_errors() {
            return Err(self.errors.format_report());
        }
        serializer::to_json(&self.program)
    }
}

/// Source -> tokens -> AST, collecting every diagnostic along the way.
pub fn analyze(source: &str, config: &ParserConfig) -> Compilation {
    let mut errors = ErrorHandler::new();
    let tokens = Lexer::new(source, &mut errors).tokenize();
    let program = Parser::new(tokens, &mut errors)
        .with_max_depth(config.max_depth)
        .into_program();
    debug!(
        "front end finished: {} statements, {} diagnostics",
        program.body.len(),
        errors.diagnostics().len()
    );
    Compilation { program, errors }
}

/// Source -> JSON AST with the default configuration. On failure the
/// formatted diagnostics are returned and no JSON is produced.
pub fn compile(source: &str) -> Result<JsonValue, String> {
    analyze(source, &ParserConfig::default()).to_json()
}

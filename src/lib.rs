pub mod ast;
pub mod compiler;
pub mod config;
pub mod diagnostics;
pub mod loader;
pub mod serializer;

pub use ast::{Expr, Program, Stmt};
pub use compiler::{analyze, compile, Compilation};
pub use diagnostics::{Diagnostic, ErrorHandler};

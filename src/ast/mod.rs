pub mod nodes;
pub mod value;

// Re-export pour faciliter l'accès : use crate::ast::{Expr, Stmt, Program, ...}
pub use nodes::{BinaryOp, Expr, Parameter, Program, Stmt, UnaryOp};
pub use value::Literal;

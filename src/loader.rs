use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::fs;
use std::path::Path;

use log::debug;

use crate::ast::Program;
use crate::compiler::parser::MAX_DEPTH_LIMIT;
use crate::serializer;

/// Rebuilds a program from its JSON form (the inverse of `serializer::to_json`).
pub fn program_from_json(json: &JsonValue) -> Result<Program, String> {
    match json.get("type").and_then(JsonValue::as_str) {
        Some("Program") => {}
        Some(other) => return Err(format!("Expected a Program node, got '{}'", other)),
        None => return Err("AST root must be an object with \"type\": \"Program\"".into()),
    }
    Program::deserialize(json).map_err(|e| format!("Invalid AST JSON: {}", e))
}

/// Deepest JSON nesting accepted when reading an AST back. Covers every tree
/// the parser can build under its largest nesting limit.
pub const MAX_JSON_DEPTH: usize = 4 * MAX_DEPTH_LIMIT;

pub fn program_from_str(text: &str) -> Result<Program, String> {
    let depth = json_nesting(text);
    if depth > MAX_JSON_DEPTH {
        return Err(format!(
            "Invalid AST JSON: nesting depth {} exceeds the limit of {}",
            depth, MAX_JSON_DEPTH
        ));
    }

    // serde_json stops at 128 levels by default; the check above bounds it instead.
    let mut deserializer = serde_json::Deserializer::from_str(text);
    deserializer.disable_recursion_limit();
    let json = JsonValue::deserialize(&mut deserializer)
        .and_then(|json| deserializer.end().map(|()| json))
        .map_err(|e| format!("Invalid AST JSON: {}", e))?;
    program_from_json(&json)
}

/// Deepest `{`/`[` nesting in a JSON text, ignoring brackets inside strings.
fn json_nesting(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0;
    let mut in_string = false;
    let mut escaped = false;

    for byte in text.bytes() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' | b'[' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            b'}' | b']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

pub fn load_program(path: &Path) -> Result<Program, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    program_from_str(&content).map_err(|e| format!("{} ({})", e, path.display()))
}

/// Writes the program as UTF-8 JSON with a trailing newline.
pub fn save_program(program: &Program, path: &Path, pretty: bool) -> Result<(), String> {
    let mut text = serializer::to_string(program, pretty)?;
    text.push('\n');
    fs::write(path, text).map_err(|e| format!("Cannot write {}: {}", path.display(), e))?;
    debug!("saved AST with {} statements to {}", program.body.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expr, Parameter, Stmt, UnaryOp};
    use serde_json::json;

    fn sample() -> Program {
        Program::new(vec![
            Stmt::Import { module_name: "math".into() },
            Stmt::ConstDecl {
                name: "pi".into(),
                var_type: Some("float".into()),
                initializer: Expr::literal(3.5),
            },
            Stmt::FunctionDecl {
                name: "area".into(),
                parameters: vec![Parameter { name: "r".into(), param_type: Some("float".into()) }],
                return_type: Some("float".into()),
                body: vec![Stmt::Return {
                    value: Some(Expr::binary(
                        Expr::variable("pi"),
                        BinaryOp::Mul,
                        Expr::binary(Expr::variable("r"), BinaryOp::Mul, Expr::variable("r")),
                    )),
                }],
            },
            Stmt::If {
                condition: Expr::unary(UnaryOp::Not, Expr::literal(false)),
                consequence: vec![Stmt::Print { expression: Expr::literal("yes") }],
                alternative: vec![],
            },
            Stmt::While {
                condition: Expr::binary(Expr::variable("i"), BinaryOp::LessThan, Expr::literal(3)),
                body: vec![Stmt::ExpressionStatement {
                    expression: Expr::Assign {
                        name: "i".into(),
                        value: Box::new(Expr::binary(Expr::variable("i"), BinaryOp::Add, Expr::literal(1))),
                    },
                }],
            },
            Stmt::Block {
                body: vec![Stmt::VarDecl { name: "z".into(), var_type: None, initializer: None }],
            },
            Stmt::Print {
                expression: Expr::grouping(Expr::Call { name: "area".into(), arguments: vec![Expr::literal(2.0)] }),
            },
            Stmt::Print { expression: Expr::Error },
        ])
    }

    #[test]
    fn test_json_round_trip() {
        let program = sample();
        let json = serializer::to_json(&program).unwrap();
        assert_eq!(program_from_json(&json).unwrap(), program);
    }

    #[test]
    fn test_rejects_non_program_root() {
        let err = program_from_json(&json!({"type": "Print", "expression": null})).unwrap_err();
        assert!(err.contains("Print"));
        assert!(program_from_json(&json!([1, 2])).is_err());
    }

    #[test]
    fn test_float_with_zero_fraction_stays_float() {
        let program = Program::new(vec![Stmt::Print { expression: Expr::literal(2.0) }]);
        let text = serializer::to_string(&program, false).unwrap();
        assert_eq!(program_from_str(&text).unwrap(), program);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ast.json");
        let program = sample();

        save_program(&program, &path, true).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("{\n  \"type\": \"Program\""));
        assert!(text.ends_with("}\n"));

        assert_eq!(load_program(&path).unwrap(), program);
    }

    #[test]
    fn test_saving_twice_is_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.json");
        let second = dir.path().join("b.json");
        save_program(&sample(), &first, true).unwrap();
        save_program(&sample(), &second, true).unwrap();
        assert_eq!(fs::read(first).unwrap(), fs::read(second).unwrap());
    }

    #[test]
    fn test_deep_trees_reload_past_default_json_limit() {
        let mut expression = Expr::literal(1);
        for _ in 0..150 {
            expression = Expr::binary(expression, BinaryOp::Add, Expr::literal(1));
        }
        let program = Program::new(vec![Stmt::Print { expression }]);
        let text = serializer::to_string(&program, false).unwrap();
        assert!(json_nesting(&text) > 128);
        assert_eq!(program_from_str(&text).unwrap(), program);
    }

    #[test]
    fn test_rejects_excessive_nesting() {
        let text = "[".repeat(100_000);
        let err = program_from_str(&text).unwrap_err();
        assert!(err.contains("nesting depth 100000"), "{}", err);
    }

    #[test]
    fn test_nesting_ignores_brackets_in_strings() {
        assert_eq!(json_nesting(r#"{"a": "[[[{{\"]]"}"#), 1);
        assert_eq!(json_nesting(r#"{"body": [{"x": []}]}"#), 4);
        assert_eq!(json_nesting("1"), 0);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_program(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(err.starts_with("Cannot read"));
    }
}

//! AST → JSON.
//!
//! The node types derive `Serialize`, so this is one generic walk over the
//! closed set of variants; the field names live on the node definitions.

use serde_json::Value as JsonValue;

use crate::ast::Program;

pub fn to_json(program: &Program) -> Result<JsonValue, String> {
    serde_json::to_value(program).map_err(|e| format!("Cannot serialize AST: {}", e))
}

/// Stable text form used for persistence: `"type"` first, then fields in
/// declaration order.
pub fn to_string(program: &Program, pretty: bool) -> Result<String, String> {
    let text = if pretty {
        serde_json::to_string_pretty(program)
    } else {
        serde_json::to_string(program)
    };
    text.map_err(|e| format!("Cannot serialize AST: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{BinaryOp, Expr, Parameter, Stmt, UnaryOp};
    use serde_json::json;

    #[test]
    fn test_empty_program() {
        assert_eq!(to_json(&Program::default()).unwrap(), json!({"type": "Program", "body": []}));
        assert_eq!(to_string(&Program::default(), false).unwrap(), r#"{"type":"Program","body":[]}"#);
    }

    #[test]
    fn test_var_decl_shape() {
        let program = Program::new(vec![Stmt::VarDecl {
            name: "x".into(),
            var_type: None,
            initializer: Some(Expr::binary(Expr::literal(2), BinaryOp::Add, Expr::literal(3))),
        }]);
        assert_eq!(
            to_json(&program).unwrap(),
            json!({
                "type": "Program",
                "body": [{
                    "type": "VarDecl",
                    "name": "x",
                    "var_type": null,
                    "initializer": {
                        "type": "Binary",
                        "left": {"type": "Literal", "value": 2},
                        "operator": "+",
                        "right": {"type": "Literal", "value": 3}
                    }
                }]
            })
        );
    }

    #[test]
    fn test_type_discriminator_comes_first() {
        let program = Program::new(vec![
            Stmt::Print { expression: Expr::unary(UnaryOp::Not, Expr::variable("ok")) },
            Stmt::FunctionDecl {
                name: "f".into(),
                parameters: vec![Parameter { name: "a".into(), param_type: Some("int".into()) }],
                return_type: None,
                body: vec![Stmt::Return { value: None }],
            },
        ]);
        let text = to_string(&program, false).unwrap();
        assert!(text.starts_with(r#"{"type":"Program","body":[{"type":"Print","expression":{"type":"Unary","operator":"!""#));
        assert!(text.contains(r#"{"type":"Parameter","name":"a","param_type":"int"}"#));
        assert!(text.contains(r#"{"type":"Return","value":null}"#));

        // Value maps keep insertion order too.
        let value = to_json(&program).unwrap();
        let keys: Vec<&String> = value["body"][1].as_object().unwrap().keys().collect();
        assert_eq!(keys, ["type", "name", "parameters", "return_type", "body"]);
    }

    #[test]
    fn test_every_expression_variant() {
        let exprs = vec![
            Expr::literal(1.5),
            Expr::literal("s"),
            Expr::literal(false),
            Expr::variable("v"),
            Expr::Assign { name: "v".into(), value: Box::new(Expr::literal(1)) },
            Expr::grouping(Expr::literal(1)),
            Expr::Call { name: "f".into(), arguments: vec![Expr::literal(1)] },
            Expr::Error,
        ];
        let types: Vec<JsonValue> = exprs
            .iter()
            .map(|e| serde_json::to_value(e).unwrap()["type"].clone())
            .collect();
        assert_eq!(
            types,
            vec![
                json!("Literal"),
                json!("Literal"),
                json!("Literal"),
                json!("Variable"),
                json!("Assign"),
                json!("Grouping"),
                json!("Call"),
                json!("Error"),
            ]
        );
        assert_eq!(serde_json::to_value(&Expr::literal(1.5)).unwrap()["value"], json!(1.5));
    }

    #[test]
    fn test_pretty_output_is_indented() {
        let text = to_string(&Program::new(vec![Stmt::Import { module_name: "math".into() }]), true).unwrap();
        assert!(text.contains("\n  \"body\": ["));
        assert!(text.contains("\"module_name\": \"math\""));
    }
}

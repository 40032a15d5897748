use serde::{Deserialize, Serialize};
use std::fmt;

/// Constant value carried by a `Literal` expression.
///
/// Serialized untagged, so the JSON value is the literal itself. Variant
/// order matters when reading JSON back: integers must be tried before
/// floats, otherwise `2` would come back as `2.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Literal {
    Integer(i64),
    Float(f64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Integer(i) => write!(f, "{}", i),
            Literal::Float(fl) => write!(f, "{:?}", fl),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "{:?}", s),
        }
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Literal::Integer(value)
    }
}

impl From<f64> for Literal {
    fn from(value: f64) -> Self {
        Literal::Float(value)
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Literal::Boolean(value)
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Literal::String(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Literal::Integer(7).to_string(), "7");
        assert_eq!(Literal::Float(2.0).to_string(), "2.0");
        assert_eq!(Literal::from("hi").to_string(), "\"hi\"");
        assert_eq!(Literal::Boolean(false).to_string(), "false");
    }

    #[test]
    fn test_untagged_json_keeps_number_kind() {
        let int: Literal = serde_json::from_str("2").unwrap();
        let float: Literal = serde_json::from_str("2.0").unwrap();
        assert_eq!(int, Literal::Integer(2));
        assert_eq!(float, Literal::Float(2.0));
        assert_eq!(serde_json::to_string(&Literal::Float(2.0)).unwrap(), "2.0");
    }
}

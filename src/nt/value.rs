use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Boolean(bool),
    Double(f64),
    String(String),
    BooleanArray(Vec<bool>),
    DoubleArray(Vec<f64>),
    StringArray(Vec<String>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::BooleanArray(_) => "boolean[]",
            Value::DoubleArray(_) => "double[]",
            Value::StringArray(_) => "string[]",
        }
    }

    pub fn same_type(&self, other: &Value) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shape_is_tagged() {
        let json = serde_json::to_string(&Value::DoubleArray(vec![1.0, 2.5])).unwrap();
        assert_eq!(json, r#"{"type":"double_array","value":[1.0,2.5]}"#);
        let back: Value = serde_json::from_str(r#"{"type":"string","value":"front"}"#).unwrap();
        assert_eq!(back.as_str(), Some("front"));
    }

    #[test]
    fn type_comparison_ignores_payload() {
        assert!(Value::Double(1.0).same_type(&Value::Double(7.0)));
        assert!(!Value::Double(1.0).same_type(&Value::String("1".into())));
    }
}

use crate::entity::json_kind;
use crate::errors::AdapterError;
use serde_json::{Map, Value};

/// Loose truthiness used for option flags: null, false, 0 and "" are false.
#[must_use]
pub fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Borrow `val` as an object; `null` is treated as an empty object.
///
/// # Errors
/// Returns `AdapterError::Query` naming `what` when the value is another JSON type.
pub fn object_or_empty<'a>(val: &'a Value, what: &str) -> Result<std::borrow::Cow<'a, Map<String, Value>>, AdapterError> {
    match val {
        Value::Object(m) => Ok(std::borrow::Cow::Borrowed(m)),
        Value::Null => Ok(std::borrow::Cow::Owned(Map::new())),
        other => Err(AdapterError::Query(format!("{what} must be a JSON object, got {}", json_kind(other)))),
    }
}

/// Parse a JSON string that must hold a top-level object.
///
/// # Errors
/// Returns an error on malformed JSON or a non-object document.
pub fn parse_json_object(json: &str) -> Result<Map<String, Value>, AdapterError> {
    match serde_json::from_str::<Value>(json)? {
        Value::Object(m) => Ok(m),
        other => Err(AdapterError::Query(format!("expected JSON object, got {}", json_kind(&other)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!("name")));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!(1)));
    }

    #[test]
    fn parse_rejects_array() {
        let e = parse_json_object("[1,2,3]").unwrap_err();
        assert!(matches!(e, AdapterError::Query(_)));
        assert_eq!(parse_json_object("{\"a\":1}").unwrap().len(), 1);
    }

    #[test]
    fn null_is_empty_object() {
        assert!(object_or_empty(&json!(null), "options").unwrap().is_empty());
        assert!(object_or_empty(&json!(3), "options").is_err());
    }
}

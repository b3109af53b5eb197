//! # Coerce Mapper
//!
//! Environment variables and CLI arguments arrive as strings; this mapper
//! recursively coerces the ones that read as booleans, integers, floats
//! or null into their typed forms so they merge and validate like values
//! from structured files.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::Value;

pub struct CoerceMapper {
    tag: Option<String>,
}

impl CoerceMapper {
    pub fn new() -> Self {
        CoerceMapper { tag: None }
    }

    /// Restricts this mapper to entries carrying `tag`.
    pub fn for_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

impl Default for CoerceMapper {
    fn default() -> Self {
        CoerceMapper::new()
    }
}

fn coerce_scalar(text: &str) -> Option<Value> {
    match text {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    // Leading zeros stay strings; "007" is more likely an identifier
    // than the number seven.
    if text.len() > 1 && (text.starts_with('0') || text.starts_with("-0")) && !text.contains('.') {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    if let Ok(float) = text.parse::<f64>() {
        if float.is_finite() {
            return serde_json::Number::from_f64(float).map(Value::Number);
        }
    }
    None
}

fn coerce(value: &Value) -> Value {
    match value {
        Value::String(text) => coerce_scalar(text).unwrap_or_else(|| value.clone()),
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, value)| (key.clone(), coerce(value)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(coerce).collect()),
        other => other.clone(),
    }
}

#[async_trait]
impl Plugin for CoerceMapper {
    fn name(&self) -> &str {
        "coerce_mapper"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::map()
    }

    async fn map(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        if let Some(tag) = &self.tag {
            if !entry.has_tag(tag) {
                return Ok(Vec::new());
            }
        }
        let Some(object) = entry.value.as_ref().and_then(EntryValue::as_object) else {
            return Ok(Vec::new());
        };

        let mut mapped = entry.clone();
        mapped.value = Some(EntryValue::Object(coerce(object)));
        Ok(vec![mapped])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_coercions() {
        assert_eq!(coerce_scalar("true"), Some(json!(true)));
        assert_eq!(coerce_scalar("false"), Some(json!(false)));
        assert_eq!(coerce_scalar("null"), Some(Value::Null));
        assert_eq!(coerce_scalar("3000"), Some(json!(3000)));
        assert_eq!(coerce_scalar("-12"), Some(json!(-12)));
        assert_eq!(coerce_scalar("1.5"), Some(json!(1.5)));
        assert_eq!(coerce_scalar("localhost"), None);
        assert_eq!(coerce_scalar(""), None);
    }

    #[test]
    fn test_leading_zeros_stay_strings() {
        assert_eq!(coerce_scalar("007"), None);
        assert_eq!(coerce_scalar("0"), Some(json!(0)));
        assert_eq!(coerce_scalar("0.5"), Some(json!(0.5)));
    }

    #[test]
    fn test_coerce_recurses() {
        let value = json!({"port": "3000", "nested": {"debug": "true"}, "list": ["1", "x"]});
        assert_eq!(
            coerce(&value),
            json!({"port": 3000, "nested": {"debug": true}, "list": [1, "x"]})
        );
    }

    #[tokio::test]
    async fn test_tag_scope() {
        let cx = EngineContext {
            name: "app".to_string(),
            cwd: std::path::PathBuf::from("."),
        };
        let mapper = CoerceMapper::new().for_tag("env");
        let untagged = Entry::new("f", EntryValue::Object(json!({"port": "1"})));
        assert!(mapper.map(&untagged, &cx).await.unwrap().is_empty());
    }
}

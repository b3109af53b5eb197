//! Recursive merge strategy: objects merge key-wise, everything else is
//! replaced by the later entry. The standard preset's default reducer.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::Value;

pub struct DeepReducer;

/// Merges `overlay` into `base` in place. Objects merge recursively;
/// arrays and scalars in `overlay` replace the base value wholesale.
pub(crate) fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overlay) => *base = overlay.clone(),
    }
}

#[async_trait]
impl Plugin for DeepReducer {
    fn name(&self) -> &str {
        "deep_reducer"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::reduce()
    }

    async fn reduce(
        &self,
        mut config: Value,
        entry: &Entry,
        _cx: &EngineContext,
    ) -> Result<Value, ConfigError> {
        if let Some(source) = entry.value.as_ref().and_then(EntryValue::as_object) {
            deep_merge(&mut config, source);
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deep_merge_preserves_sibling_keys() {
        let mut base = json!({"db": {"host": "localhost", "port": 5432}});
        deep_merge(&mut base, &json!({"db": {"port": 5433}}));
        assert_eq!(base, json!({"db": {"host": "localhost", "port": 5433}}));
    }

    #[test]
    fn test_arrays_are_replaced_not_concatenated() {
        let mut base = json!({"hosts": ["a", "b"]});
        deep_merge(&mut base, &json!({"hosts": ["c"]}));
        assert_eq!(base, json!({"hosts": ["c"]}));
    }

    #[test]
    fn test_scalar_replaces_object() {
        let mut base = json!({"db": {"host": "x"}});
        deep_merge(&mut base, &json!({"db": "disabled"}));
        assert_eq!(base, json!({"db": "disabled"}));
    }

    #[tokio::test]
    async fn test_reduce_applies_deep_merge() {
        let cx = EngineContext {
            name: "app".to_string(),
            cwd: std::path::PathBuf::from("."),
        };
        let entry = Entry::new("e", EntryValue::Object(json!({"db": {"port": 5433}})));
        let config = json!({"db": {"host": "localhost"}});

        let reduced = DeepReducer.reduce(config, &entry, &cx).await.unwrap();
        assert_eq!(reduced, json!({"db": {"host": "localhost", "port": 5433}}));
    }
}

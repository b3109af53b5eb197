//! Shallow merge strategy: later entries replace whole top-level keys.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::Value;

pub struct AssignReducer;

#[async_trait]
impl Plugin for AssignReducer {
    fn name(&self) -> &str {
        "assign_reducer"
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
        if let (Value::Object(target), Some(Value::Object(source))) = (
            &mut config,
            entry.value.as_ref().and_then(EntryValue::as_object),
        ) {
            for (key, value) in source {
                target.insert(key.clone(), value.clone());
            }
        }
        Ok(config)
    }
}

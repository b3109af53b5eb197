//! YAML parser for `yaml`-tagged text entries.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct YamlLoader;

#[async_trait]
impl Plugin for YamlLoader {
    fn name(&self) -> &str {
        "yaml_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        if !entry.has_tag("yaml") && !entry.has_tag("yml") {
            return Ok(Vec::new());
        }
        let Some(text) = entry.value.as_ref().and_then(EntryValue::as_text) else {
            return Ok(Vec::new());
        };

        let value: Value = serde_yaml::from_str(text)
            .map_err(|err| ConfigError::parse("yaml", &entry.id, err))?;
        // An empty document parses as null; treat it as an empty fragment.
        let value = match value {
            Value::Null => Value::Object(Map::new()),
            value => value,
        };
        let mut parsed = entry.clone();
        parsed.value = Some(EntryValue::Object(value));
        Ok(vec![parsed])
    }
}

//! TOML parser for `toml`-tagged text entries.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::Value;

pub struct TomlLoader;

#[async_trait]
impl Plugin for TomlLoader {
    fn name(&self) -> &str {
        "toml_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        if !entry.has_tag("toml") {
            return Ok(Vec::new());
        }
        let Some(text) = entry.value.as_ref().and_then(EntryValue::as_text) else {
            return Ok(Vec::new());
        };

        let value: Value =
            toml::from_str(text).map_err(|err| ConfigError::parse("toml", &entry.id, err))?;
        let mut parsed = entry.clone();
        parsed.value = Some(EntryValue::Object(value));
        Ok(vec![parsed])
    }
}

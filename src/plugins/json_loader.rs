//! JSON parser for `json`-tagged text entries.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::Value;

pub struct JsonLoader;

#[async_trait]
impl Plugin for JsonLoader {
    fn name(&self) -> &str {
        "json_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        if !entry.has_tag("json") {
            return Ok(Vec::new());
        }
        let Some(text) = entry.value.as_ref().and_then(EntryValue::as_text) else {
            return Ok(Vec::new());
        };

        let value: Value = serde_json::from_str(text)
            .map_err(|err| ConfigError::parse("json", &entry.id, err))?;
        let mut parsed = entry.clone();
        parsed.value = Some(EntryValue::Object(value));
        Ok(vec![parsed])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    fn cx() -> EngineContext {
        EngineContext {
            name: "app".to_string(),
            cwd: PathBuf::from("."),
        }
    }

    #[tokio::test]
    async fn test_parses_tagged_text() {
        let entry = Entry::new("f", EntryValue::Text("{\"port\": 3000}".into())).with_tag("json");
        let returned = JsonLoader.load(&entry, &cx()).await.unwrap();
        assert_eq!(
            returned[0].value.as_ref().unwrap().as_object(),
            Some(&json!({"port": 3000}))
        );
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_parse_error() {
        let entry = Entry::new("f", EntryValue::Text("{oops".into())).with_tag("json");
        let err = JsonLoader.load(&entry, &cx()).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { format, .. } if format == "json"));
    }

    #[tokio::test]
    async fn test_declines_untagged_text() {
        let entry = Entry::new("f", EntryValue::Text("{}".into()));
        assert!(JsonLoader.load(&entry, &cx()).await.unwrap().is_empty());
    }
}

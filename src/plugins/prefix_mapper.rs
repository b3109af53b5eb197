//! # Prefix Mapper
//!
//! Filters a flat object entry down to the keys carrying a given prefix
//! and strips that prefix. Typically scoped to `env`-tagged entries so
//! `APP_PORT=3000` becomes `PORT: "3000"` while unrelated environment
//! variables drop out entirely.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct PrefixMapper {
    prefix: String,
    tag: Option<String>,
}

impl PrefixMapper {
    pub fn new(prefix: impl Into<String>) -> Self {
        PrefixMapper {
            prefix: prefix.into(),
            tag: None,
        }
    }

    /// Restricts this mapper to entries carrying `tag`.
    pub fn for_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

#[async_trait]
impl Plugin for PrefixMapper {
    fn name(&self) -> &str {
        "prefix_mapper"
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
        let Some(Value::Object(object)) = entry.value.as_ref().and_then(EntryValue::as_object)
        else {
            return Ok(Vec::new());
        };

        let filtered: Map<String, Value> = object
            .iter()
            .filter_map(|(key, value)| {
                key.strip_prefix(&self.prefix)
                    .filter(|stripped| !stripped.is_empty())
                    .map(|stripped| (stripped.to_string(), value.clone()))
            })
            .collect();

        let mut mapped = entry.clone();
        mapped.value = Some(EntryValue::Object(Value::Object(filtered)));
        Ok(vec![mapped])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cx() -> EngineContext {
        EngineContext {
            name: "app".to_string(),
            cwd: std::path::PathBuf::from("."),
        }
    }

    #[tokio::test]
    async fn test_filters_and_strips_prefix() {
        let entry = Entry::new(
            "process.env",
            EntryValue::Object(json!({
                "APP_PORT": "3000",
                "APP_HOST": "localhost",
                "PATH": "/usr/bin",
            })),
        )
        .with_tag("env");

        let mapper = PrefixMapper::new("APP_").for_tag("env");
        let returned = mapper.map(&entry, &cx()).await.unwrap();
        assert_eq!(
            returned[0].value.as_ref().unwrap().as_object(),
            Some(&json!({"PORT": "3000", "HOST": "localhost"}))
        );
    }

    #[tokio::test]
    async fn test_tag_scope_declines_other_entries() {
        let entry = Entry::new("raw", EntryValue::Object(json!({"APP_PORT": "1"})));
        let mapper = PrefixMapper::new("APP_").for_tag("env");
        assert!(mapper.map(&entry, &cx()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exact_prefix_key_is_dropped() {
        let entry = Entry::new("e", EntryValue::Object(json!({"APP_": "x"}))).with_tag("env");
        let mapper = PrefixMapper::new("APP_").for_tag("env");
        let returned = mapper.map(&entry, &cx()).await.unwrap();
        assert_eq!(
            returned[0].value.as_ref().unwrap().as_object(),
            Some(&json!({}))
        );
    }
}

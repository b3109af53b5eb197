//! # Pick Property Mapper
//!
//! Extracts one property of an object entry into a child entry and empties
//! the original. Used to read config embedded under a well-known key of a
//! larger document, like the `config` block of a package manifest.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::Value;

pub struct PickPropertyMapper {
    property: String,
    tag: Option<String>,
}

impl PickPropertyMapper {
    pub fn new(property: impl Into<String>) -> Self {
        PickPropertyMapper {
            property: property.into(),
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
impl Plugin for PickPropertyMapper {
    fn name(&self) -> &str {
        "pick_property_mapper"
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
        let Some(picked) = object.get(&self.property) else {
            return Ok(Vec::new());
        };
        let picked = picked.clone();

        // The original is hollowed out so only the picked fragment merges.
        let mut emptied = entry.clone();
        emptied.value = Some(EntryValue::Object(Value::Object(serde_json::Map::new())));

        let child = Entry::new(
            format!("{}:{}", entry.id, self.property),
            EntryValue::Object(picked),
        );
        Ok(vec![emptied, child])
    }
}

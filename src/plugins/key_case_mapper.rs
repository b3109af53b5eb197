//! # Key Case Mapper
//!
//! Recursively rewrites object keys into a target case, so environment
//! shouting-snake keys (`DB_HOST`) line up with file config keys
//! (`dbHost` or `db_host`) before the reduce step merges them.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use heck::{
    ToKebabCase, ToLowerCamelCase, ToPascalCase, ToShoutySnakeCase, ToSnakeCase, ToTrainCase,
};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy)]
pub enum KeyCase {
    Camel,
    Snake,
    Kebab,
    Pascal,
    ShoutySnake,
    Train,
}

impl KeyCase {
    fn apply(self, key: &str) -> String {
        match self {
            KeyCase::Camel => key.to_lower_camel_case(),
            KeyCase::Snake => key.to_snake_case(),
            KeyCase::Kebab => key.to_kebab_case(),
            KeyCase::Pascal => key.to_pascal_case(),
            KeyCase::ShoutySnake => key.to_shouty_snake_case(),
            KeyCase::Train => key.to_train_case(),
        }
    }
}

pub struct KeyCaseMapper {
    case: KeyCase,
    tag: Option<String>,
}

impl KeyCaseMapper {
    pub fn new(case: KeyCase) -> Self {
        KeyCaseMapper { case, tag: None }
    }

    /// Restricts this mapper to entries carrying `tag`.
    pub fn for_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }
}

fn rewrite_keys(value: &Value, case: KeyCase) -> Value {
    match value {
        Value::Object(object) => {
            let rewritten: Map<String, Value> = object
                .iter()
                .map(|(key, value)| (case.apply(key), rewrite_keys(value, case)))
                .collect();
            Value::Object(rewritten)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| rewrite_keys(item, case)).collect())
        }
        other => other.clone(),
    }
}

#[async_trait]
impl Plugin for KeyCaseMapper {
    fn name(&self) -> &str {
        "key_case_mapper"
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
        mapped.value = Some(EntryValue::Object(rewrite_keys(object, self.case)));
        Ok(vec![mapped])
    }
}

//! Terminal loader for already-parsed fragments.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;

/// Claims entries that already carry a parsed object, ending their load
/// chain. Registered first so raw objects skip every other loader.
pub struct ObjectLoader;

#[async_trait]
impl Plugin for ObjectLoader {
    fn name(&self) -> &str {
        "object_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        match &entry.value {
            Some(EntryValue::Object(_)) => Ok(vec![entry.clone()]),
            _ => Ok(Vec::new()),
        }
    }
}

//! # Fork Loader
//!
//! Resolves `fork`-tagged entries carrying a parent engine handle by
//! building the parent and substituting its resolved configuration. The
//! fork source registers first in a forked builder, so the parent's
//! config becomes the base layer everything else in the child overrides.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use tracing::debug;

pub struct ForkLoader;

impl ForkLoader {
    pub fn new() -> Self {
        ForkLoader
    }
}

impl Default for ForkLoader {
    fn default() -> Self {
        ForkLoader::new()
    }
}

#[async_trait]
impl Plugin for ForkLoader {
    fn name(&self) -> &str {
        "fork_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let Some(EntryValue::Engine(parent)) = &entry.value else {
            return Ok(Vec::new());
        };
        if !entry.has_tag("fork") {
            return Ok(Vec::new());
        }

        // A parent build failure fails the child build too; a fork with a
        // broken base layer has nothing sound to layer onto.
        let config = parent.build().await?;
        debug!(id = %entry.id, parent = %parent.name(), "fork resolved from parent");

        let mut resolved = entry.clone();
        resolved.value = Some(EntryValue::Object(config));
        Ok(vec![resolved])
    }
}

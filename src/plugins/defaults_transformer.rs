//! Transformer that lays a defaults object underneath the assembled
//! config, so explicit values from any source always win.

use crate::engine::EngineContext;
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use crate::plugins::deep_reducer::deep_merge;
use async_trait::async_trait;
use serde_json::Value;

pub struct DefaultsTransformer {
    defaults: Value,
}

impl DefaultsTransformer {
    pub fn new(defaults: Value) -> Self {
        DefaultsTransformer { defaults }
    }
}

#[async_trait]
impl Plugin for DefaultsTransformer {
    fn name(&self) -> &str {
        "defaults_transformer"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::transform()
    }

    async fn transform(&self, config: Value, _cx: &EngineContext) -> Result<Value, ConfigError> {
        let mut merged = self.defaults.clone();
        deep_merge(&mut merged, &config);
        Ok(merged)
    }
}

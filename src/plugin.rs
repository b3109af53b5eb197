//! # Plugin Contract
//!
//! External collaborators implement any subset of six capabilities:
//! load, map, reduce, transform, validate and watch. A plugin declares the
//! subset it implements through [`Capabilities`], so dispatch is a static
//! check instead of a runtime probe.
//!
//! Contract summary:
//!
//! - `load`/`map` receive one entry and return zero or more entries. An
//!   empty result means "not mine". A non-empty result must include the
//!   original id (possibly transformed); every other entry is a newly
//!   discovered child.
//! - `reduce` folds one mapped entry into the config; only the
//!   last-registered implementer runs, so reduce is a single designated
//!   merge strategy, not a chain.
//! - `transform` runs for all implementers in registration order, each
//!   consuming the previous output.
//! - `validate` runs for all implementers; any error aborts the build.
//! - `watch`/`unwatch` are registered once per distinct underlying
//!   subscription; change notifications go through the engine's event
//!   channel.

use crate::engine::EngineContext;
use crate::entry::Entry;
use crate::error::ConfigError;
use crate::watch::WatchSender;
use async_trait::async_trait;
use serde_json::Value;

/// The capability subset a plugin implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub load: bool,
    pub map: bool,
    pub reduce: bool,
    pub transform: bool,
    pub validate: bool,
    pub watch: bool,
}

impl Capabilities {
    pub fn load() -> Self {
        Capabilities {
            load: true,
            ..Capabilities::default()
        }
    }

    pub fn map() -> Self {
        Capabilities {
            map: true,
            ..Capabilities::default()
        }
    }

    pub fn reduce() -> Self {
        Capabilities {
            reduce: true,
            ..Capabilities::default()
        }
    }

    pub fn transform() -> Self {
        Capabilities {
            transform: true,
            ..Capabilities::default()
        }
    }

    pub fn validate() -> Self {
        Capabilities {
            validate: true,
            ..Capabilities::default()
        }
    }

    pub fn with_watch(mut self) -> Self {
        self.watch = true;
        self
    }
}

/// An external collaborator in the build pipeline.
///
/// Every method has a pass-through default; a plugin overrides the ones its
/// [`Capabilities`] declare. The engine never calls a method whose
/// capability flag is unset.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    /// Offers a `loading` entry to this plugin. Returning an empty vec
    /// declines the entry.
    async fn load(&self, _entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(Vec::new())
    }

    /// Offers a `mapping` entry to this plugin. Returning an empty vec
    /// declines the entry.
    async fn map(&self, _entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(Vec::new())
    }

    /// Folds one mapped entry into the config object.
    async fn reduce(
        &self,
        config: Value,
        _entry: &Entry,
        _cx: &EngineContext,
    ) -> Result<Value, ConfigError> {
        Ok(config)
    }

    /// Pipes the assembled config through this plugin.
    async fn transform(&self, config: Value, _cx: &EngineContext) -> Result<Value, ConfigError> {
        Ok(config)
    }

    /// Validates the final config; an error aborts the build.
    async fn validate(&self, _config: &Value, _cx: &EngineContext) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Starts delivering change notifications on `events`. Called once
    /// when the first logical watcher starts.
    async fn watch(&self, _events: WatchSender, _cx: &EngineContext) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Stops delivering change notifications. Called once when the last
    /// logical watcher stops.
    async fn unwatch(&self, _cx: &EngineContext) -> Result<(), ConfigError> {
        Ok(())
    }
}

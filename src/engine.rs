//! # Build Engine
//!
//! Drives entries through the load and map phases to a fixpoint, then
//! folds them into a resolved configuration object.
//!
//! Concurrency model: all store mutation happens inside a single
//! tokio-mutex-guarded build queue, so concurrent `build()` callers are
//! serialized FIFO and no partial state is ever observable from `get()`.
//! Within a phase, independent entries fan out concurrently and the phase
//! only completes once every launched chain settles; the phase sequence
//! (load, map, assemble) is strictly ordered.

use crate::entry::{Entry, EntryStatus};
use crate::error::ConfigError;
use crate::plugin::Plugin;
use crate::plugins::fork_loader::ForkLoader;
use crate::source::{ForkSource, Source};
use crate::store::EntryStore;
use crate::watch::WatchRegistry;
use futures_util::future;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Options shared with every plugin call.
#[derive(Debug, Clone)]
pub struct EngineContext {
    /// Application name; used for config-file candidates and prefixes.
    pub name: String,
    /// Base directory for relative path resolution.
    pub cwd: PathBuf,
}

pub(crate) struct EngineState {
    pub(crate) store: EntryStore,
    /// Sources registered but not yet read; drained at the start of the
    /// next build.
    pub(crate) unread_sources: Vec<Arc<dyn Source>>,
}

/// A configuration build engine instance.
///
/// Constructed through [`EngineBuilder`]; handed out as `Arc<Engine>` so
/// forks and watch tasks can hold references.
pub struct Engine {
    pub(crate) context: EngineContext,
    pub(crate) plugins: Vec<Arc<dyn Plugin>>,
    pub(crate) state: Mutex<EngineState>,
    pub(crate) resolved: RwLock<Value>,
    pub(crate) watchers: WatchRegistry,
}

enum Phase {
    Load,
    Map,
}

struct ChainOutcome {
    entry: Entry,
    status: EntryStatus,
    /// Newly discovered children, paired with "place before the parent".
    children: Vec<(Entry, bool)>,
}

impl Engine {
    pub fn name(&self) -> &str {
        &self.context.name
    }

    pub fn context(&self) -> &EngineContext {
        &self.context
    }

    /// Last successfully resolved config. Never fails; returns the empty
    /// object if no build has succeeded yet.
    pub fn get(&self) -> Value {
        self.resolved.read().clone()
    }

    /// Ensures the config is current and returns it.
    ///
    /// Concurrent callers queue FIFO behind one another; each call only
    /// does real work if the store has unflushed changes. A failure
    /// rejects this call alone and leaves the store retryable; it never
    /// poisons the queue for subsequent calls.
    pub async fn build(&self) -> Result<Value, ConfigError> {
        let mut state = self.state.lock().await;

        let mut sources = std::mem::take(&mut state.unread_sources).into_iter();
        while let Some(source) = sources.next() {
            let entries = match source.entries(&self.context) {
                Ok(entries) => entries,
                Err(err) => {
                    // The failing source and everything after it stay
                    // queued, so the next build retries the same drain.
                    state.unread_sources = std::iter::once(source).chain(sources).collect();
                    return Err(err);
                }
            };
            for mut entry in entries {
                let status = entry.status.take().unwrap_or(EntryStatus::Pending);
                let parent_id = entry.parent_id.clone();
                state
                    .store
                    .update_entry(entry, parent_id.as_deref(), status, false, false);
            }
        }

        // Entries stranded in flight by a failed pass re-enter their
        // phase, so a retry surfaces the same outcome instead of silently
        // dropping them.
        for entry in state.store.get_entries(Some(EntryStatus::Loading)) {
            state.store.set_entry_status(&entry.id, EntryStatus::Pending);
        }
        for entry in state.store.get_entries(Some(EntryStatus::Mapping)) {
            state.store.set_entry_status(&entry.id, EntryStatus::Loaded);
        }

        if !state.store.has_updates() {
            return Ok(self.get());
        }
        state.store.clear_updates();

        let store = &mut state.store;
        self.load_entries(store).await?;
        self.map_entries(store).await?;
        let config = self.assemble(store).await?;

        // Assembly never re-triggers on its own writes.
        store.clear_updates();

        *self.resolved.write() = config.clone();
        tracing::debug!(name = %self.context.name, "configuration rebuilt");

        Ok(config)
    }

    /// Inserts a raw object as a new pending entry. The entry id is
    /// derived from the value's content, so adding an identical object
    /// twice replaces instead of double-applying. Triggers a rebuild when
    /// a watch is active.
    pub async fn add(self: &Arc<Self>, value: Value) {
        self.add_source(crate::source::raw(value)).await;
    }

    /// Registers an additional source; its entries are read on the next
    /// build. Triggers a rebuild when a watch is active.
    pub async fn add_source(self: &Arc<Self>, source: impl Source + 'static) {
        {
            let mut state = self.state.lock().await;
            state.unread_sources.push(Arc::new(source));
        }
        if self.watchers.is_active() {
            self.clone().spawn_rebuild();
        }
    }

    /// Ordered snapshot of the entry tree, for introspection and tests.
    pub async fn entries(&self) -> Vec<Entry> {
        self.state.lock().await.store.get_entries(None)
    }

    /// Builder for a derived engine that layers additional sources and
    /// plugins on top of this instance's resolved configuration. The
    /// child inherits name and cwd but not watch state.
    pub fn fork(self: &Arc<Self>) -> EngineBuilder {
        let mut builder = EngineBuilder::new(&self.context.name).cwd(self.context.cwd.clone());
        builder.sources.push(Arc::new(ForkSource::new(self.clone())));
        builder.plugins.push(Arc::new(ForkLoader::new()));
        builder
    }

    /// Drives every pending entry through the plugin load chain until no
    /// pending entries remain. Newly discovered children re-enter the
    /// queue, so this is an iterative fixpoint, not a recursion.
    async fn load_entries(&self, store: &mut EntryStore) -> Result<(), ConfigError> {
        loop {
            let batch = store.get_entries(Some(EntryStatus::Pending));
            if batch.is_empty() {
                break;
            }
            tracing::debug!(count = batch.len(), "load batch");
            for entry in &batch {
                store.set_entry_status(&entry.id, EntryStatus::Loading);
            }

            let chains = batch
                .iter()
                .map(|entry| self.run_chain(Phase::Load, entry.clone()));
            let outcomes = future::join_all(chains).await;

            for (entry, outcome) in batch.iter().zip(outcomes) {
                self.apply_outcome(store, &entry.id, outcome?);
            }
        }
        Ok(())
    }

    /// Drives every loaded entry through the plugin map chain. Children
    /// discovered while mapping start pending and may themselves require
    /// loading, so a load pass is re-run before each map batch.
    async fn map_entries(&self, store: &mut EntryStore) -> Result<(), ConfigError> {
        loop {
            if store.count_entries(Some(EntryStatus::Pending)) > 0 {
                self.load_entries(store).await?;
            }

            let batch = store.get_entries(Some(EntryStatus::Loaded));
            if batch.is_empty() {
                if store.count_entries(Some(EntryStatus::Pending)) == 0 {
                    break;
                }
                continue;
            }
            tracing::debug!(count = batch.len(), "map batch");
            for entry in &batch {
                store.set_entry_status(&entry.id, EntryStatus::Mapping);
            }

            let chains = batch
                .iter()
                .map(|entry| self.run_chain(Phase::Map, entry.clone()));
            let outcomes = future::join_all(chains).await;

            for (entry, outcome) in batch.iter().zip(outcomes) {
                self.apply_outcome(store, &entry.id, outcome?);
            }
        }
        Ok(())
    }

    /// Offers one entry to each capable plugin in registration order while
    /// it remains in the in-flight status of the phase.
    ///
    /// A returned entry with the original id is the replacement: in the
    /// load phase its status defaults to `Loaded` (ending the chain), in
    /// the map phase it stays `Mapping` so later mappers still run. Any
    /// other returned entry is a newly discovered child; children
    /// produced before the original has been claimed are placed before
    /// the parent (not yet authoritative), later ones after it.
    async fn run_chain(&self, phase: Phase, entry: Entry) -> Result<ChainOutcome, ConfigError> {
        let (in_flight, done) = match phase {
            Phase::Load => (EntryStatus::Loading, EntryStatus::Loaded),
            Phase::Map => (EntryStatus::Mapping, EntryStatus::Mapped),
        };

        let mut current = entry;
        current.status = None;
        let mut status = in_flight;
        let mut original_seen = false;
        let mut children: Vec<(Entry, bool)> = Vec::new();

        for plugin in &self.plugins {
            if status != in_flight {
                break;
            }
            let capabilities = plugin.capabilities();
            let returned = match phase {
                Phase::Load if capabilities.load => plugin.load(&current, &self.context).await?,
                Phase::Map if capabilities.map => plugin.map(&current, &self.context).await?,
                _ => continue,
            };
            if returned.is_empty() {
                continue;
            }

            let mut saw_original = false;
            for mut item in returned {
                if item.id == current.id {
                    saw_original = true;
                    original_seen = true;
                    status = item.status.take().unwrap_or(match phase {
                        Phase::Load => done,
                        Phase::Map => in_flight,
                    });
                    current = item;
                } else {
                    children.push((item, !original_seen));
                }
            }
            if !saw_original {
                return Err(ConfigError::PluginContract {
                    plugin: plugin.name().to_string(),
                    id: current.id.clone(),
                });
            }
        }

        if status == in_flight {
            match phase {
                // Loading is mandatory-until-claimed.
                Phase::Load => {
                    return Err(ConfigError::UnresolvableEntry {
                        id: current.id.clone(),
                    });
                }
                // Mapping is optional; promote.
                Phase::Map => status = done,
            }
        }

        Ok(ChainOutcome {
            entry: current,
            status,
            children,
        })
    }

    fn apply_outcome(&self, store: &mut EntryStore, parent_id: &str, outcome: ChainOutcome) {
        store.update_entry(outcome.entry, None, outcome.status, true, false);
        for (mut child, before_parent) in outcome.children {
            let status = child.status.take().unwrap_or(EntryStatus::Pending);
            store.update_entry(child, Some(parent_id), status, false, before_parent);
        }
    }

    /// Folds mapped entries into the config in store order (single
    /// designated reducer: the last-registered implementer), pipes the
    /// result through every transformer in registration order, then runs
    /// every validator.
    async fn assemble(&self, store: &EntryStore) -> Result<Value, ConfigError> {
        let mut config = Value::Object(Map::new());

        if let Some(reducer) = self
            .plugins
            .iter()
            .rev()
            .find(|plugin| plugin.capabilities().reduce)
        {
            for entry in store.get_entries(Some(EntryStatus::Mapped)) {
                config = reducer.reduce(config, &entry, &self.context).await?;
            }
        }

        for plugin in &self.plugins {
            if plugin.capabilities().transform {
                config = plugin.transform(config, &self.context).await?;
            }
        }

        for plugin in &self.plugins {
            if plugin.capabilities().validate {
                plugin.validate(&config, &self.context).await?;
            }
        }

        Ok(config)
    }
}

/// Builds an [`Engine`] from a name, sources and plugins.
///
/// Plugin registration order is load/map/transform chain order; the
/// last-registered reduce-capable plugin is the designated merge strategy.
pub struct EngineBuilder {
    name: String,
    cwd: PathBuf,
    pub(crate) sources: Vec<Arc<dyn Source>>,
    pub(crate) plugins: Vec<Arc<dyn Plugin>>,
}

impl EngineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        EngineBuilder {
            name: name.into(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            sources: Vec::new(),
            plugins: Vec::new(),
        }
    }

    pub fn cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    pub fn source(mut self, source: impl Source + 'static) -> Self {
        self.sources.push(Arc::new(source));
        self
    }

    pub fn plugin(mut self, plugin: impl Plugin + 'static) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    pub fn build(self) -> Arc<Engine> {
        Arc::new(Engine {
            context: EngineContext {
                name: self.name,
                cwd: self.cwd,
            },
            plugins: self.plugins,
            state: Mutex::new(EngineState {
                store: EntryStore::new(),
                unread_sources: self.sources,
            }),
            resolved: RwLock::new(Value::Object(Map::new())),
            watchers: WatchRegistry::new(),
        })
    }
}

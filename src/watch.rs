//! # Watch Coordination
//!
//! Bridges asynchronous change notifications from plugins into entry
//! resets and rebuilds.
//!
//! Notification delivery is decoupled from mutation by a message-passing
//! channel: watching plugins are handed a cloneable [`WatchSender`] and
//! publish change events (an updated entry, or an error) onto it; a single
//! consumer task owned by the engine applies each change inside the
//! serialized build queue and re-runs the pipeline.
//!
//! Multiple logical watchers share one underlying subscription: the
//! plugin-level watch is only registered when the active watcher count
//! goes from zero to one, and unregistered when it returns to zero.
//!
//! Watch-side errors never reject a caller; they are routed to every
//! registered catch handler, or logged if none exist.

use crate::engine::Engine;
use crate::entry::{Entry, EntryStatus};
use crate::error::ConfigError;
use notify::{EventKind, RecursiveMode, Watcher as _};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// A change notification published by a watching plugin.
#[derive(Debug)]
pub enum WatchEvent {
    /// An entry's underlying data changed; carries the entry to re-load.
    Changed(Entry),
    /// A failure inside the plugin's watch machinery. Fire-and-forget.
    Error(ConfigError),
}

/// Cloneable handle plugins publish change events on.
#[derive(Clone)]
pub struct WatchSender {
    tx: mpsc::UnboundedSender<WatchEvent>,
}

impl WatchSender {
    pub fn changed(&self, entry: Entry) {
        let _ = self.tx.send(WatchEvent::Changed(entry));
    }

    pub fn error(&self, error: ConfigError) {
        let _ = self.tx.send(WatchEvent::Error(error));
    }
}

type ConfigHandler = Arc<dyn Fn(Value) + Send + Sync>;
type ErrorHandler = Arc<dyn Fn(&ConfigError) + Send + Sync>;

struct WatcherSlot {
    active: bool,
    on_config: Vec<ConfigHandler>,
    on_error: Vec<ErrorHandler>,
}

#[derive(Default)]
struct RegistryState {
    slots: HashMap<u64, WatcherSlot>,
    next_id: u64,
    active_count: usize,
    consumer: Option<tokio::task::JoinHandle<()>>,
}

/// Per-engine registry of logical watchers.
pub(crate) struct WatchRegistry {
    state: Mutex<RegistryState>,
}

impl WatchRegistry {
    pub(crate) fn new() -> Self {
        WatchRegistry {
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state.lock().active_count > 0
    }
}

/// Handle to one logical watcher. Created inactive; `start` activates it
/// and `stop` deactivates it. Dropping the handle does not stop watching.
pub struct Watcher {
    id: u64,
    engine: Arc<Engine>,
}

impl Watcher {
    /// Registers a callback invoked with the resolved config after every
    /// successful watch-triggered rebuild.
    pub fn on_config(&self, handler: impl Fn(Value) + Send + Sync + 'static) -> &Self {
        let mut state = self.engine.watchers.state.lock();
        if let Some(slot) = state.slots.get_mut(&self.id) {
            slot.on_config.push(Arc::new(handler));
        }
        self
    }

    /// Registers a catch handler for watch-side errors.
    pub fn on_error(&self, handler: impl Fn(&ConfigError) + Send + Sync + 'static) -> &Self {
        let mut state = self.engine.watchers.state.lock();
        if let Some(slot) = state.slots.get_mut(&self.id) {
            slot.on_error.push(Arc::new(handler));
        }
        self
    }

    /// Activates this watcher. The underlying plugin subscriptions are
    /// only registered on the zero-to-one transition.
    pub async fn start(&self) -> Result<(), ConfigError> {
        let first = {
            let mut state = self.engine.watchers.state.lock();
            let Some(slot) = state.slots.get_mut(&self.id) else {
                return Ok(());
            };
            if slot.active {
                return Ok(());
            }
            slot.active = true;
            state.active_count += 1;
            state.active_count == 1
        };
        if first {
            if let Err(err) = self.engine.start_watching().await {
                // Roll the activation back so a later start can retry the
                // zero-to-one transition cleanly.
                let mut state = self.engine.watchers.state.lock();
                if let Some(slot) = state.slots.get_mut(&self.id) {
                    slot.active = false;
                }
                state.active_count = state.active_count.saturating_sub(1);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Deactivates this watcher. The underlying plugin subscriptions are
    /// unregistered on the one-to-zero transition.
    pub async fn stop(&self) -> Result<(), ConfigError> {
        let last = {
            let mut state = self.engine.watchers.state.lock();
            let Some(slot) = state.slots.get_mut(&self.id) else {
                return Ok(());
            };
            if !slot.active {
                return Ok(());
            }
            slot.active = false;
            state.active_count -= 1;
            state.active_count == 0
        };
        if last {
            self.engine.stop_watching().await?;
        }
        Ok(())
    }
}

impl Engine {
    /// Creates a new logical watcher handle. Inactive until `start`.
    pub fn watch(self: &Arc<Self>) -> Watcher {
        let mut state = self.watchers.state.lock();
        let id = state.next_id;
        state.next_id += 1;
        state.slots.insert(
            id,
            WatcherSlot {
                active: false,
                on_config: Vec::new(),
                on_error: Vec::new(),
            },
        );
        Watcher {
            id,
            engine: self.clone(),
        }
    }

    /// Stops and removes every logical watcher.
    pub async fn unwatch_all(self: &Arc<Self>) -> Result<(), ConfigError> {
        let was_active = {
            let mut state = self.watchers.state.lock();
            let was_active = state.active_count > 0;
            state.slots.clear();
            state.active_count = 0;
            was_active
        };
        if was_active {
            self.stop_watching().await?;
        }
        Ok(())
    }

    async fn start_watching(self: &Arc<Self>) -> Result<(), ConfigError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let sender = WatchSender { tx };

        {
            let mut state = self.watchers.state.lock();
            let engine = Arc::downgrade(self);
            state.consumer = Some(tokio::spawn(consume_events(engine, rx)));
        }

        let mut registered: Vec<&Arc<dyn crate::plugin::Plugin>> = Vec::new();
        for plugin in &self.plugins {
            if plugin.capabilities().watch {
                if let Err(err) = plugin.watch(sender.clone(), &self.context).await {
                    // Unwind the partial registration before surfacing.
                    for plugin in registered {
                        if let Err(unwind_err) = plugin.unwatch(&self.context).await {
                            warn!(
                                plugin = plugin.name(),
                                error = %unwind_err,
                                "unwatch failed while unwinding a failed start"
                            );
                        }
                    }
                    if let Some(consumer) = self.watchers.state.lock().consumer.take() {
                        consumer.abort();
                    }
                    return Err(err);
                }
                registered.push(plugin);
            }
        }

        debug!(name = %self.context.name, "watching started");
        Ok(())
    }

    async fn stop_watching(self: &Arc<Self>) -> Result<(), ConfigError> {
        for plugin in &self.plugins {
            if plugin.capabilities().watch {
                plugin.unwatch(&self.context).await?;
            }
        }

        if let Some(consumer) = self.watchers.state.lock().consumer.take() {
            consumer.abort();
        }

        debug!(name = %self.context.name, "watching stopped");
        Ok(())
    }

    /// Rebuilds in the background and fans the outcome out to watchers.
    /// Used by `add` while a watch is active.
    pub(crate) fn spawn_rebuild(self: Arc<Self>) {
        tokio::spawn(async move {
            match self.build().await {
                Ok(config) => self.notify_config(config),
                Err(err) => self.route_watch_error(&err),
            }
        });
    }

    fn notify_config(&self, config: Value) {
        let handlers: Vec<ConfigHandler> = {
            let state = self.watchers.state.lock();
            state
                .slots
                .values()
                .filter(|slot| slot.active)
                .flat_map(|slot| slot.on_config.iter().cloned())
                .collect()
        };
        for handler in handlers {
            handler(config.clone());
        }
    }

    fn route_watch_error(&self, err: &ConfigError) {
        let handlers: Vec<ErrorHandler> = {
            let state = self.watchers.state.lock();
            state
                .slots
                .values()
                .filter(|slot| slot.active)
                .flat_map(|slot| slot.on_error.iter().cloned())
                .collect()
        };
        if handlers.is_empty() {
            error!(error = %err, "unhandled watch error");
            return;
        }
        for handler in handlers {
            handler(err);
        }
    }

    async fn apply_watch_change(&self, entry: Entry) -> Result<Value, ConfigError> {
        {
            let mut state = self.state.lock().await;
            state
                .store
                .update_entry(entry, None, EntryStatus::Pending, true, false);
        }
        self.build().await
    }
}

async fn consume_events(engine: Weak<Engine>, mut rx: mpsc::UnboundedReceiver<WatchEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(engine) = engine.upgrade() else {
            break;
        };
        match event {
            WatchEvent::Error(err) => engine.route_watch_error(&err),
            WatchEvent::Changed(entry) => {
                debug!(id = %entry.id, "watch change event");
                match engine.apply_watch_change(entry).await {
                    Ok(config) => engine.notify_config(config),
                    Err(err) => engine.route_watch_error(&err),
                }
            }
        }
    }
}

struct HubState {
    /// Watched path -> the entry to re-emit when it changes.
    watched: HashMap<PathBuf, Entry>,
    subscribers: Vec<WatchSender>,
    watcher: Option<notify::RecommendedWatcher>,
}

/// Shared notify-backed file watcher.
///
/// The file loader registers every candidate path it probes; the hub keeps
/// one underlying `notify` watcher alive while at least one subscription
/// exists and re-emits the registered entry when a path changes.
pub struct FileWatchHub {
    state: Mutex<HubState>,
}

impl FileWatchHub {
    pub fn new() -> Arc<Self> {
        Arc::new(FileWatchHub {
            state: Mutex::new(HubState {
                watched: HashMap::new(),
                subscribers: Vec::new(),
                watcher: None,
            }),
        })
    }

    /// Registers a path and the entry to re-emit on change. Candidate
    /// paths that do not exist yet are registered too; watch errors on
    /// them are ignored so creation can be observed via the parent later.
    pub fn add(&self, path: PathBuf, on_change: Entry) {
        let mut state = self.state.lock();
        if let Some(watcher) = state.watcher.as_mut() {
            if let Err(err) = watcher.watch(&path, RecursiveMode::NonRecursive) {
                debug!(path = %path.display(), error = %err, "could not watch path");
            }
        }
        state.watched.insert(path, on_change);
    }

    pub fn watch(self: &Arc<Self>, sender: WatchSender) -> Result<(), ConfigError> {
        let mut state = self.state.lock();
        state.subscribers.push(sender);
        if state.watcher.is_some() {
            return Ok(());
        }

        let hub = Arc::downgrade(self);
        let mut watcher = notify::recommended_watcher(
            move |result: Result<notify::Event, notify::Error>| {
                let Some(hub) = hub.upgrade() else { return };
                hub.on_notify(result);
            },
        )
        .map_err(|err| ConfigError::watch(err))?;

        for path in state.watched.keys() {
            if let Err(err) = watcher.watch(path, RecursiveMode::NonRecursive) {
                debug!(path = %path.display(), error = %err, "could not watch path");
            }
        }
        state.watcher = Some(watcher);
        Ok(())
    }

    pub fn unwatch(&self) {
        let mut state = self.state.lock();
        state.subscribers.clear();
        state.watcher = None;
    }

    fn on_notify(&self, result: Result<notify::Event, notify::Error>) {
        let state = self.state.lock();
        match result {
            Err(err) => {
                warn!(error = %err, "file watch error");
                for sender in &state.subscribers {
                    sender.error(ConfigError::watch(&err));
                }
            }
            Ok(event) => {
                if !matches!(
                    event.kind,
                    EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                for path in &event.paths {
                    let Some(entry) = lookup_watched(&state.watched, path) else {
                        continue;
                    };
                    debug!(path = %path.display(), id = %entry.id, "file changed");
                    for sender in &state.subscribers {
                        sender.changed(entry.clone());
                    }
                }
            }
        }
    }
}

/// Event paths may come back canonicalized, so fall back to comparing
/// canonical forms when the direct lookup misses.
fn lookup_watched<'a>(watched: &'a HashMap<PathBuf, Entry>, path: &Path) -> Option<&'a Entry> {
    if let Some(entry) = watched.get(path) {
        return Some(entry);
    }
    let canonical = path.canonicalize().ok()?;
    watched.iter().find_map(|(watched_path, entry)| {
        let watched_canonical = watched_path.canonicalize().ok()?;
        (watched_canonical == canonical).then_some(entry)
    })
}

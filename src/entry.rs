//! # Configuration Entries
//!
//! The unit of data flowing through the build pipeline. An entry is one
//! configuration fragment in flight: a raw file path, unparsed text, a
//! parsed object, or a handle to a parent engine instance (forks).
//!
//! Entries carry tags that plugins use to decide applicability ("file",
//! "env", "json", ...) and a free-form `meta` side channel (e.g. the
//! resolved file path) that plugins attach to one entry and read from a
//! related one.

use crate::engine::Engine;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Lifecycle status of an entry within one build pass.
///
/// Statuses only move forward within a pass (`Pending` through `Mapped`);
/// an external signal (watch event, `add`) resets an entry to `Pending`,
/// which invalidates everything derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum EntryStatus {
    Pending,
    Loading,
    Loaded,
    Mapping,
    Mapped,
}

impl EntryStatus {
    pub(crate) const COUNT: usize = 5;

    pub(crate) fn index(self) -> usize {
        match self {
            EntryStatus::Pending => 0,
            EntryStatus::Loading => 1,
            EntryStatus::Loaded => 2,
            EntryStatus::Mapping => 3,
            EntryStatus::Mapped => 4,
        }
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Loading => "loading",
            EntryStatus::Loaded => "loaded",
            EntryStatus::Mapping => "mapping",
            EntryStatus::Mapped => "mapped",
        };
        f.write_str(name)
    }
}

/// Payload of an entry. The shape is meaningful only to the plugins that
/// read it; the engine treats it as opaque.
#[derive(Clone)]
pub enum EntryValue {
    /// Raw unparsed text (file contents, fetched body, .env data).
    Text(String),
    /// A parsed configuration fragment.
    Object(Value),
    /// Candidate file paths, first existing one wins.
    Paths(Vec<String>),
    /// Command line argument vector.
    Args(Vec<String>),
    /// Location of a remote fragment.
    Url(url::Url),
    /// Handle to a parent engine instance (fork entries).
    Engine(Arc<Engine>),
}

impl EntryValue {
    /// Returns the parsed object, if this value holds one.
    pub fn as_object(&self) -> Option<&Value> {
        match self {
            EntryValue::Object(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the raw text, if this value holds some.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            EntryValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Debug for EntryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryValue::Text(text) => f.debug_tuple("Text").field(text).finish(),
            EntryValue::Object(value) => f.debug_tuple("Object").field(value).finish(),
            EntryValue::Paths(paths) => f.debug_tuple("Paths").field(paths).finish(),
            EntryValue::Args(args) => f.debug_tuple("Args").field(args).finish(),
            EntryValue::Url(url) => f.debug_tuple("Url").field(&url.as_str()).finish(),
            EntryValue::Engine(engine) => f.debug_tuple("Engine").field(&engine.name()).finish(),
        }
    }
}

impl From<Value> for EntryValue {
    fn from(value: Value) -> Self {
        EntryValue::Object(value)
    }
}

/// One configuration fragment moving through the pipeline.
///
/// `id` is the stable identity: plugins that return an entry with the same
/// id are transforming it in place, any other id is a newly discovered
/// child. A `None` value is a deletion request for the entry and its
/// subtree.
///
/// The `status` field is only a hint attached by sources and plugins (e.g.
/// "this entry is already loaded"); the authoritative status lives in the
/// [`EntryStore`](crate::store::EntryStore).
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: String,
    pub parent_id: Option<String>,
    pub value: Option<EntryValue>,
    pub tags: Vec<String>,
    pub status: Option<EntryStatus>,
    pub meta: serde_json::Map<String, Value>,
}

impl Entry {
    pub fn new(id: impl Into<String>, value: EntryValue) -> Self {
        Entry {
            id: id.into(),
            parent_id: None,
            value: Some(value),
            tags: Vec::new(),
            status: None,
            meta: serde_json::Map::new(),
        }
    }

    /// An entry without a value, i.e. a deletion request.
    pub fn tombstone(id: impl Into<String>) -> Self {
        Entry {
            id: id.into(),
            parent_id: None,
            value: None,
            tags: Vec::new(),
            status: None,
            meta: serde_json::Map::new(),
        }
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn with_status(mut self, status: EntryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Adds a tag unless it is already present.
    pub fn add_tag(&mut self, tag: &str) {
        if !self.has_tag(tag) {
            self.tags.push(tag.to_string());
        }
    }
}

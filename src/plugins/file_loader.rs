//! # File Loader
//!
//! Resolves `file`-tagged path-candidate entries against the engine's
//! working directory, reads the first candidate that exists and emits its
//! raw contents as a child entry tagged with the detected format. Parsing
//! is left to the format loaders downstream.
//!
//! Every probed candidate is registered with the shared [`FileWatchHub`],
//! including the ones that do not exist yet, so both edits and late file
//! creation re-trigger the originating entry.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use crate::watch::{FileWatchHub, WatchSender};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

pub struct FileLoader {
    hub: Arc<FileWatchHub>,
}

impl FileLoader {
    pub fn new(hub: Arc<FileWatchHub>) -> Self {
        FileLoader { hub }
    }
}

/// Format tag for a path, by extension. Dotenv-style files have no
/// meaningful extension, so they are matched on the file name.
fn format_tag(path: &Path) -> Option<&'static str> {
    let name = path.file_name()?.to_str()?;
    if name == ".env" || name.starts_with(".env.") {
        return Some("env");
    }
    match path.extension()?.to_str()? {
        "json" => Some("json"),
        "toml" => Some("toml"),
        "yaml" | "yml" => Some("yaml"),
        "env" => Some("env"),
        _ => None,
    }
}

#[async_trait]
impl Plugin for FileLoader {
    fn name(&self) -> &str {
        "file_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load().with_watch()
    }

    async fn load(&self, entry: &Entry, cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let Some(EntryValue::Paths(candidates)) = &entry.value else {
            return Ok(Vec::new());
        };
        if !entry.has_tag("file") {
            return Ok(Vec::new());
        }

        // Template re-emitted when a registered path changes: the entry as
        // it arrived from its source, so a change restarts its whole load.
        let mut template = entry.clone();
        template.status = None;

        let mut found: Option<PathBuf> = None;
        for candidate in candidates {
            let path = cx.cwd.join(candidate);
            self.hub.add(path.clone(), template.clone());
            if found.is_none() && tokio::fs::metadata(&path).await.is_ok() {
                found = Some(path);
            }
        }

        // The candidates entry itself resolves to nothing; the contents
        // live on the child so a re-read replaces only the child subtree.
        let mut replacement = entry.clone();
        replacement.value = Some(EntryValue::Object(Value::Object(serde_json::Map::new())));

        let Some(path) = found else {
            debug!(id = %entry.id, "no config file candidate exists");
            return Ok(vec![replacement]);
        };

        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ConfigError::Io {
                path: path.clone(),
                source,
            })?;
        debug!(id = %entry.id, path = %path.display(), "config file read");

        let mut child = Entry::new(
            format!("file:loaded:{}", path.display()),
            EntryValue::Text(contents),
        )
        .with_meta("file_path", json!(path.display().to_string()));
        for tag in &entry.tags {
            if tag != "file" {
                child.add_tag(tag);
            }
        }
        if let Some(format) = format_tag(&path) {
            child.add_tag(format);
        }

        Ok(vec![replacement, child])
    }

    async fn watch(&self, events: WatchSender, _cx: &EngineContext) -> Result<(), ConfigError> {
        self.hub.watch(events)
    }

    async fn unwatch(&self, _cx: &EngineContext) -> Result<(), ConfigError> {
        self.hub.unwatch();
        Ok(())
    }
}

//! # Entry Sources
//!
//! Sources produce the initial entries a build starts from: raw objects,
//! file path candidates, the process environment, CLI arguments, remote
//! URLs and parent-engine handles (forks). Sources are read once, at the
//! start of the first build after their registration; everything after
//! that is the plugins' concern.

use crate::engine::{Engine, EngineContext};
use crate::entry::{Entry, EntryStatus, EntryValue};
use crate::error::ConfigError;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Produces initial entries for the build pipeline.
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    fn entries(&self, cx: &EngineContext) -> Result<Vec<Entry>, ConfigError>;
}

/// A raw object with a content-derived id: adding the identical object
/// twice replaces the entry instead of double-applying it.
pub struct RawSource {
    id: String,
    value: Value,
}

/// Wraps a JSON object as a pre-tagged entry.
pub fn raw(value: Value) -> RawSource {
    let canonical = value.to_string();
    let digest = Sha256::digest(canonical.as_bytes());
    let mut id = String::with_capacity(4 + digest.len() * 2);
    id.push_str("raw:");
    for byte in digest {
        id.push_str(&format!("{byte:02x}"));
    }
    RawSource { id, value }
}

/// A raw object under a caller-chosen id.
pub fn raw_with_id(id: impl Into<String>, value: Value) -> RawSource {
    RawSource {
        id: id.into(),
        value,
    }
}

impl Source for RawSource {
    fn name(&self) -> &str {
        "raw"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(vec![
            Entry::new(self.id.clone(), EntryValue::Object(self.value.clone())).with_tag("object"),
        ])
    }
}

/// A fixed set of entries. Mostly useful for tests and embedding.
pub struct EntriesSource {
    entries: Vec<Entry>,
}

pub fn entries(entries: Vec<Entry>) -> EntriesSource {
    EntriesSource { entries }
}

impl Source for EntriesSource {
    fn name(&self) -> &str {
        "entries"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(self.entries.clone())
    }
}

/// A single file path candidate, tagged `file`.
pub struct FileSource {
    path: String,
}

pub fn file(path: impl Into<String>) -> FileSource {
    FileSource { path: path.into() }
}

impl Source for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(vec![
            Entry::new(
                format!("file:{}", self.path),
                EntryValue::Paths(vec![self.path.clone()]),
            )
            .with_tag("file"),
        ])
    }
}

/// A caller-chosen list of file path candidates, tagged `file`. The first
/// existing candidate wins.
pub struct FilesSource {
    candidates: Vec<String>,
}

pub fn files<I, S>(candidates: I) -> FilesSource
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    FilesSource {
        candidates: candidates.into_iter().map(Into::into).collect(),
    }
}

impl Source for FilesSource {
    fn name(&self) -> &str {
        "files"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(vec![
            Entry::new(
                format!("files:{}", self.candidates.join(",")),
                EntryValue::Paths(self.candidates.clone()),
            )
            .with_tag("file"),
        ])
    }
}

/// Conventional config-file candidates for the engine's name: the first
/// existing one wins.
pub struct ConfigFilesSource;

pub fn config_files() -> ConfigFilesSource {
    ConfigFilesSource
}

impl Source for ConfigFilesSource {
    fn name(&self) -> &str {
        "config_files"
    }

    fn entries(&self, cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let name = &cx.name;
        let candidates = vec![
            format!("{name}.toml"),
            format!("{name}.yaml"),
            format!("{name}.yml"),
            format!("{name}.json"),
            format!(".{name}rc"),
            format!(".{name}rc.json"),
            format!(".{name}rc.yaml"),
            format!(".{name}rc.yml"),
            format!(".{name}rc.toml"),
            format!(".config/{name}.toml"),
            format!(".config/{name}.yaml"),
            format!(".config/{name}.json"),
        ];
        Ok(vec![
            Entry::new("config_files", EntryValue::Paths(candidates)).with_tag("file"),
        ])
    }
}

/// Dotenv candidates, tagged `file` and `env`; the most specific existing
/// file wins.
pub struct DotenvSource;

pub fn dotenv() -> DotenvSource {
    DotenvSource
}

impl Source for DotenvSource {
    fn name(&self) -> &str {
        "dotenv"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(vec![
            Entry::new(
                "dotenv",
                EntryValue::Paths(vec![".env.local".to_string(), ".env".to_string()]),
            )
            .with_tags(["file", "env"]),
        ])
    }
}

/// Snapshot of the process environment, pre-loaded as an object of
/// strings.
pub struct EnvSource;

pub fn env() -> EnvSource {
    EnvSource
}

impl Source for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let vars: serde_json::Map<String, Value> = std::env::vars()
            .map(|(key, value)| (key, Value::String(value)))
            .collect();
        Ok(vec![
            Entry::new("process.env", EntryValue::Object(Value::Object(vars)))
                .with_tag("env")
                .with_status(EntryStatus::Loaded),
        ])
    }
}

/// Command line arguments, tagged `argv`. `None` snapshots the process
/// arguments (without the binary name).
pub struct ArgvSource {
    args: Option<Vec<String>>,
}

pub fn argv(args: Option<Vec<String>>) -> ArgvSource {
    ArgvSource { args }
}

impl Source for ArgvSource {
    fn name(&self) -> &str {
        "argv"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let args = match &self.args {
            Some(args) => args.clone(),
            None => std::env::args().skip(1).collect(),
        };
        Ok(vec![
            Entry::new("argv", EntryValue::Args(args)).with_tag("argv"),
        ])
    }
}

/// A remote fragment location, tagged `url`.
pub struct UrlSource {
    url: url::Url,
    format: Option<String>,
}

pub fn remote(url: url::Url, format: Option<String>) -> UrlSource {
    UrlSource { url, format }
}

impl Source for UrlSource {
    fn name(&self) -> &str {
        "url"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let mut entry = Entry::new(
            format!("url:{}", self.url),
            EntryValue::Url(self.url.clone()),
        )
        .with_tag("url");
        if let Some(format) = &self.format {
            entry = entry.with_tag(format.clone());
        }
        Ok(vec![entry])
    }
}

static FORK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Yields one entry wrapping a parent engine handle; consumed by the fork
/// loader, which substitutes the parent's resolved config.
pub struct ForkSource {
    id: String,
    parent: Arc<Engine>,
}

impl ForkSource {
    pub fn new(parent: Arc<Engine>) -> Self {
        let id = format!("fork:{}", FORK_COUNTER.fetch_add(1, Ordering::Relaxed));
        ForkSource { id, parent }
    }
}

impl Source for ForkSource {
    fn name(&self) -> &str {
        "fork"
    }

    fn entries(&self, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        Ok(vec![
            Entry::new(self.id.clone(), EntryValue::Engine(self.parent.clone())).with_tag("fork"),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use serial_test::serial;

    fn cx() -> EngineContext {
        EngineContext {
            name: "app".to_string(),
            cwd: std::path::PathBuf::from("."),
        }
    }

    #[test]
    fn test_raw_source_is_content_addressed() {
        let first = raw(json!({"port": 3000}));
        let second = raw(json!({"port": 3000}));
        let third = raw(json!({"port": 4000}));

        let first = first.entries(&cx()).unwrap().remove(0);
        let second = second.entries(&cx()).unwrap().remove(0);
        let third = third.entries(&cx()).unwrap().remove(0);

        assert_eq!(first.id, second.id);
        assert_ne!(first.id, third.id);
        assert!(first.id.starts_with("raw:"));
        assert!(first.has_tag("object"));
    }

    #[test]
    fn test_config_files_candidates_use_engine_name() {
        let entries = config_files().entries(&cx()).unwrap();
        assert_eq!(entries.len(), 1);
        let Some(EntryValue::Paths(paths)) = &entries[0].value else {
            panic!("expected path candidates");
        };
        assert!(paths.contains(&"app.toml".to_string()));
        assert!(paths.contains(&".apprc".to_string()));
        assert!(entries[0].has_tag("file"));
    }

    #[test]
    #[serial]
    fn test_env_source_snapshots_process_env() {
        unsafe {
            std::env::set_var("STRATA_SOURCE_TEST", "yes");
        }
        let entries = env().entries(&cx()).unwrap();
        unsafe {
            std::env::remove_var("STRATA_SOURCE_TEST");
        }

        let entry = &entries[0];
        assert_eq!(entry.id, "process.env");
        assert_eq!(entry.status, Some(EntryStatus::Loaded));
        let value = entry.value.as_ref().unwrap().as_object().unwrap();
        assert_eq!(value["STRATA_SOURCE_TEST"], json!("yes"));
    }

    #[test]
    fn test_argv_source_uses_given_args() {
        let entries = argv(Some(vec!["--port".into(), "8080".into()]))
            .entries(&cx())
            .unwrap();
        let Some(EntryValue::Args(args)) = &entries[0].value else {
            panic!("expected args");
        };
        assert_eq!(args, &vec!["--port".to_string(), "8080".to_string()]);
        assert!(entries[0].has_tag("argv"));
    }

    #[test]
    fn test_fork_source_ids_are_unique() {
        let parent = crate::engine::EngineBuilder::new("app").build();
        let first = ForkSource::new(parent.clone());
        let second = ForkSource::new(parent);
        assert_ne!(first.id, second.id);
    }

    #[test]
    fn test_dotenv_candidates() {
        let entries = dotenv().entries(&cx()).unwrap();
        let entry = &entries[0];
        assert!(entry.has_tag("file"));
        assert!(entry.has_tag("env"));
        let Some(EntryValue::Paths(paths)) = &entry.value else {
            panic!("expected paths");
        };
        assert_eq!(paths, &vec![".env.local".to_string(), ".env".to_string()]);
    }
}

//! # Engine Errors
//!
//! Error taxonomy for the build pipeline.
//!
//! Build-time errors (`UnresolvableEntry`, `PluginContract`, `Validation`)
//! reject the specific `build()` call that hit them and leave the store in
//! a retryable state. Watch-side errors are never returned to a caller;
//! they are routed to registered catch handlers or logged.

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the configuration build engine.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No plugin claimed to load a pending entry. Fatal to that build.
    #[error("no plugin was able to load entry: {id}")]
    UnresolvableEntry { id: String },

    /// A load/map call returned entries that omit the original. This is a
    /// programming error in the plugin, not a data error.
    #[error("plugin {plugin} violated the contract for entry {id}: returned entries omit the original")]
    PluginContract { plugin: String, id: String },

    /// A validator rejected the assembled config.
    #[error("configuration validation failed: {reason}")]
    Validation { reason: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {format} for entry {id}: {reason}")]
    Parse {
        format: String,
        id: String,
        reason: String,
    },

    #[error("fetch failed for {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP error {status} for {url}")]
    FetchStatus { status: u16, url: String },

    #[error("source {name} failed: {reason}")]
    Source { name: String, reason: String },

    #[error("watch error: {reason}")]
    Watch { reason: String },
}

impl ConfigError {
    pub(crate) fn parse(format: &str, id: &str, reason: impl ToString) -> Self {
        ConfigError::Parse {
            format: format.to_string(),
            id: id.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn validation(reason: impl ToString) -> Self {
        ConfigError::Validation {
            reason: reason.to_string(),
        }
    }

    pub(crate) fn watch(reason: impl ToString) -> Self {
        ConfigError::Watch {
            reason: reason.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ConfigError::UnresolvableEntry { id: "argv".into() };
        assert_eq!(err.to_string(), "no plugin was able to load entry: argv");

        let err = ConfigError::PluginContract {
            plugin: "file_loader".into(),
            id: "file:x".into(),
        };
        assert!(err.to_string().contains("file_loader"));
        assert!(err.to_string().contains("file:x"));

        let err = ConfigError::validation("port out of range");
        assert!(err.to_string().contains("port out of range"));
    }
}

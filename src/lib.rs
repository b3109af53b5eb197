//! # Strata
//!
//! A layered configuration build engine. Configuration arrives as entries
//! from heterogeneous sources (files, dotenv, environment variables, CLI
//! arguments, remote URLs, parent engines), flows through a plugin
//! pipeline (load, map, reduce, transform, validate) and settles into one
//! resolved JSON object. Sources registered later override earlier ones;
//! entries discovered while loading slot in next to the entry that
//! produced them.
//!
//! ## Usage
//!
//! ```no_run
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), strata::ConfigError> {
//!     let engine = strata::preset::standard("myapp").build();
//!     engine.add(json!({ "port": 3000 })).await;
//!
//!     let config = engine.build().await?;
//!     println!("port = {}", config["port"]);
//!
//!     // Hot reload: rebuild whenever a watched source changes.
//!     let watcher = engine.watch();
//!     watcher.on_config(|config| println!("reloaded: {config}"));
//!     watcher.start().await?;
//!     Ok(())
//! }
//! ```

pub mod engine;
pub mod entry;
pub mod error;
pub mod plugin;
pub mod plugins;
pub mod preset;
pub mod source;
pub mod store;
pub mod watch;

pub use engine::{Engine, EngineBuilder, EngineContext};
pub use entry::{Entry, EntryStatus, EntryValue};
pub use error::ConfigError;
pub use plugin::{Capabilities, Plugin};
pub use source::Source;
pub use watch::{WatchEvent, WatchSender, Watcher};

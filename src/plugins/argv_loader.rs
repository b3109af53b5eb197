//! # Argv Loader
//!
//! Non-strict flag parser for `Args`-valued entries: `--key=value`,
//! `--key value`, bare `--flag` (true) and `--no-flag` (false).
//! Positional arguments and unrecognized shapes are ignored rather than
//! rejected; configuration by CLI is additive, not a full argument parser.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct ArgvLoader;

fn parse_args(args: &[String]) -> Map<String, Value> {
    let mut parsed = Map::new();
    let mut iter = args.iter().peekable();
    while let Some(arg) = iter.next() {
        let Some(name) = arg.strip_prefix("--") else {
            continue;
        };
        if name.is_empty() {
            // A bare `--` ends option parsing by convention.
            break;
        }

        if let Some((key, value)) = name.split_once('=') {
            parsed.insert(key.to_string(), Value::String(value.to_string()));
        } else if let Some(key) = name.strip_prefix("no-") {
            parsed.insert(key.to_string(), Value::Bool(false));
        } else if let Some(next) = iter.peek() {
            if next.starts_with("--") {
                parsed.insert(name.to_string(), Value::Bool(true));
            } else {
                parsed.insert(name.to_string(), Value::String(iter.next().cloned().unwrap_or_default()));
            }
        } else {
            parsed.insert(name.to_string(), Value::Bool(true));
        }
    }
    parsed
}

#[async_trait]
impl Plugin for ArgvLoader {
    fn name(&self) -> &str {
        "argv_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let Some(EntryValue::Args(args)) = &entry.value else {
            return Ok(Vec::new());
        };

        let mut parsed = entry.clone();
        parsed.value = Some(EntryValue::Object(Value::Object(parse_args(args))));
        Ok(vec![parsed])
    }
}

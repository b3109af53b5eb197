//! # Dotenv Loader
//!
//! Parses `env`-tagged text entries in dotenv syntax: one `KEY=VALUE` per
//! line, `#` comments, optional `export ` prefix, optional single or
//! double quotes around the value. Values stay strings; type coercion is
//! the coerce mapper's job.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::{Map, Value};

pub struct EnvLoader;

fn parse_dotenv(text: &str) -> Map<String, Value> {
    let mut vars = Map::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").unwrap_or(line);
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }

        let value = value.trim();
        let value = if (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
            || (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        {
            &value[1..value.len() - 1]
        } else {
            // Unquoted values may carry a trailing comment.
            match value.find(" #") {
                Some(pos) => value[..pos].trim_end(),
                None => value,
            }
        };
        vars.insert(key.to_string(), Value::String(value.to_string()));
    }
    vars
}

#[async_trait]
impl Plugin for EnvLoader {
    fn name(&self) -> &str {
        "env_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        if !entry.has_tag("env") {
            return Ok(Vec::new());
        }
        let Some(text) = entry.value.as_ref().and_then(EntryValue::as_text) else {
            return Ok(Vec::new());
        };

        let mut parsed = entry.clone();
        parsed.value = Some(EntryValue::Object(Value::Object(parse_dotenv(text))));
        Ok(vec![parsed])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_basic_pairs() {
        let vars = parse_dotenv("PORT=3000\nHOST=localhost\n");
        assert_eq!(vars["PORT"], json!("3000"));
        assert_eq!(vars["HOST"], json!("localhost"));
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let vars = parse_dotenv("# a comment\n\nPORT=3000\n");
        assert_eq!(vars.len(), 1);
    }

    #[test]
    fn test_parse_export_prefix_and_quotes() {
        let vars = parse_dotenv("export NAME=\"my app\"\nTOKEN='s3cr3t'\n");
        assert_eq!(vars["NAME"], json!("my app"));
        assert_eq!(vars["TOKEN"], json!("s3cr3t"));
    }

    #[test]
    fn test_parse_strips_trailing_comment_outside_quotes() {
        let vars = parse_dotenv("PORT=3000 # dev default\nMSG=\"keep # this\"\n");
        assert_eq!(vars["PORT"], json!("3000"));
        assert_eq!(vars["MSG"], json!("keep # this"));
    }

    #[test]
    fn test_parse_keeps_equals_in_value() {
        let vars = parse_dotenv("DSN=postgres://u:p@h/db?sslmode=require\n");
        assert_eq!(vars["DSN"], json!("postgres://u:p@h/db?sslmode=require"));
    }

    #[tokio::test]
    async fn test_declines_without_env_tag() {
        let cx = EngineContext {
            name: "app".to_string(),
            cwd: std::path::PathBuf::from("."),
        };
        let entry = Entry::new("f", EntryValue::Text("PORT=1".into()));
        assert!(EnvLoader.load(&entry, &cx).await.unwrap().is_empty());
    }
}

//! # Fetch Loader
//!
//! Resolves `Url`-valued entries by fetching them over HTTP and emitting
//! the body as a child text entry. The format tag comes from the response
//! content type when the entry does not already carry one, so a fetched
//! `application/json` body flows into the JSON loader unannotated.

use crate::engine::EngineContext;
use crate::entry::{Entry, EntryValue};
use crate::error::ConfigError;
use crate::plugin::{Capabilities, Plugin};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::debug;

pub struct FetchLoader {
    client: reqwest::Client,
}

impl FetchLoader {
    pub fn new() -> Self {
        FetchLoader {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for FetchLoader {
    fn default() -> Self {
        FetchLoader::new()
    }
}

fn format_from_content_type(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    match essence {
        "application/json" | "text/json" => Some("json"),
        "application/yaml" | "application/x-yaml" | "text/yaml" => Some("yaml"),
        "application/toml" | "text/toml" => Some("toml"),
        _ => None,
    }
}

#[async_trait]
impl Plugin for FetchLoader {
    fn name(&self) -> &str {
        "fetch_loader"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::load()
    }

    async fn load(&self, entry: &Entry, _cx: &EngineContext) -> Result<Vec<Entry>, ConfigError> {
        let Some(EntryValue::Url(url)) = &entry.value else {
            return Ok(Vec::new());
        };

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ConfigError::Fetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConfigError::FetchStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        // Proxies and test doubles sometimes stack content-type headers;
        // the last value is the closest to the origin's intent.
        let content_type = response
            .headers()
            .get_all(reqwest::header::CONTENT_TYPE)
            .iter()
            .last()
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.map_err(|source| ConfigError::Fetch {
            url: url.to_string(),
            source,
        })?;
        debug!(url = %url, bytes = body.len(), "remote fragment fetched");

        let mut replacement = entry.clone();
        replacement.value = Some(EntryValue::Object(Value::Object(serde_json::Map::new())));

        let mut child = Entry::new(format!("fetch:loaded:{url}"), EntryValue::Text(body))
            .with_meta("url", json!(url.to_string()));
        for tag in &entry.tags {
            if tag != "url" {
                child.add_tag(tag);
            }
        }
        if child.tags.is_empty() {
            if let Some(format) = content_type.as_deref().and_then(format_from_content_type) {
                child.add_tag(format);
            }
        }

        Ok(vec![replacement, child])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn cx() -> EngineContext {
        EngineContext {
            name: "app".to_string(),
            cwd: std::path::PathBuf::from("."),
        }
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(
            format_from_content_type("application/json; charset=utf-8"),
            Some("json")
        );
        assert_eq!(format_from_content_type("text/yaml"), Some("yaml"));
        assert_eq!(format_from_content_type("text/html"), None);
    }

    #[tokio::test]
    async fn test_fetches_body_as_tagged_child() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config.json"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                "{\"port\": 3000}",
                "application/json",
            ))
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/config.json", server.uri())).unwrap();
        let entry = Entry::new(format!("url:{url}"), EntryValue::Url(url)).with_tag("url");

        let returned = FetchLoader::new().load(&entry, &cx()).await.unwrap();
        assert_eq!(returned.len(), 2);
        let child = &returned[1];
        assert!(child.has_tag("json"));
        assert_eq!(
            child.value.as_ref().unwrap().as_text(),
            Some("{\"port\": 3000}")
        );
    }

    #[tokio::test]
    async fn test_stacked_content_type_headers_use_the_last() {
        let server = MockServer::start().await;
        // A text/plain content-type followed by an appended json header;
        // the last one must still win format inference. set_body_bytes is
        // the only body setter that leaves the template's mime empty, so
        // the stacked headers survive response generation.
        Mock::given(method("GET"))
            .and(path("/config.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes("{\"port\": 3000}".as_bytes())
                    .append_header("content-type", "text/plain")
                    .append_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/config.json", server.uri())).unwrap();
        let entry = Entry::new(format!("url:{url}"), EntryValue::Url(url)).with_tag("url");

        let returned = FetchLoader::new().load(&entry, &cx()).await.unwrap();
        assert!(returned[1].has_tag("json"));
    }

    #[tokio::test]
    async fn test_error_status_rejects_the_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.json"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/missing.json", server.uri())).unwrap();
        let entry = Entry::new(format!("url:{url}"), EntryValue::Url(url)).with_tag("url");

        let err = FetchLoader::new().load(&entry, &cx()).await.unwrap_err();
        assert!(matches!(err, ConfigError::FetchStatus { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_explicit_format_tag_wins_over_content_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/config"))
            .respond_with(ResponseTemplate::new(200).set_body_raw("port: 3000", "text/plain"))
            .mount(&server)
            .await;

        let url = url::Url::parse(&format!("{}/config", server.uri())).unwrap();
        let entry = Entry::new(format!("url:{url}"), EntryValue::Url(url))
            .with_tag("url")
            .with_tag("yaml");

        let returned = FetchLoader::new().load(&entry, &cx()).await.unwrap();
        assert!(returned[1].has_tag("yaml"));
    }
}

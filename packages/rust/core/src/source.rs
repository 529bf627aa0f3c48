//! Import source resolution: a JSON array of records from a file, a string,
//! or a URL.
//!
//! Only the top-level shape is checked here. Individual records are passed
//! through untouched and validated by the processor.

use std::path::Path;

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, instrument};
use url::Url;

use contentimport_shared::{
    ErrorBody, FETCH_FALLBACK_MESSAGE, FetchResponse, ImportError, ImportRecord, Result,
};

/// Message for valid JSON whose top level is not an array.
const NOT_AN_ARRAY: &str = "JSON must be an array of blog posts";

/// Resolves an import source into an ordered list of records.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    client: Client,
    /// Fetch proxy. `None` means URLs are fetched directly.
    fetch_endpoint: Option<Url>,
}

impl SourceResolver {
    pub fn new(client: Client, fetch_endpoint: Option<Url>) -> Self {
        Self {
            client,
            fetch_endpoint,
        }
    }

    /// Fetch records from `source`, through the fetch proxy when configured.
    #[instrument(skip_all, fields(source = %source))]
    pub async fn resolve_url(&self, source: &str) -> Result<Vec<ImportRecord>> {
        let records = match &self.fetch_endpoint {
            Some(endpoint) => self.fetch_via_proxy(endpoint, source).await?,
            None => self.fetch_direct(source).await?,
        };
        info!(records = records.len(), "source fetched");
        Ok(records)
    }

    /// Read and parse a JSON file.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn resolve_file(&self, path: &Path) -> Result<Vec<ImportRecord>> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ImportError::io(path, e))?;
        let records = resolve_str(&text)?;
        info!(records = records.len(), "source file loaded");
        Ok(records)
    }

    async fn fetch_via_proxy(&self, endpoint: &Url, source: &str) -> Result<Vec<ImportRecord>> {
        let mut url = endpoint.clone();
        url.query_pairs_mut().append_pair("url", source);
        debug!(%url, "fetching through proxy");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImportError::fetch(format!("{FETCH_FALLBACK_MESSAGE}: {e}")))?;

        if !response.status().is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_else(|| FETCH_FALLBACK_MESSAGE.to_string());
            return Err(ImportError::fetch(message));
        }

        let body: FetchResponse = response
            .json()
            .await
            .map_err(|e| ImportError::parse(format!("fetch proxy response: {e}")))?;

        match body.blogs {
            Some(blogs) => records_from_value(blogs),
            None => Err(ImportError::shape("fetch proxy response has no blogs array")),
        }
    }

    async fn fetch_direct(&self, source: &str) -> Result<Vec<ImportRecord>> {
        let url = Url::parse(source)
            .map_err(|e| ImportError::fetch(format!("invalid URL '{source}': {e}")))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ImportError::fetch(format!(
                "unsupported URL scheme '{}'",
                url.scheme()
            )));
        }
        debug!(%url, "fetching directly");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImportError::fetch(format!("{FETCH_FALLBACK_MESSAGE}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::fetch(format!(
                "{FETCH_FALLBACK_MESSAGE}: HTTP {status}"
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ImportError::fetch(format!("{FETCH_FALLBACK_MESSAGE}: {e}")))?;
        resolve_str(&text)
    }
}

/// Parse `text` as JSON and require a top-level array.
pub fn resolve_str(text: &str) -> Result<Vec<ImportRecord>> {
    let value: Value = serde_json::from_str(text).map_err(|e| ImportError::parse(e.to_string()))?;
    records_from_value(value)
}

fn records_from_value(value: Value) -> Result<Vec<ImportRecord>> {
    match value {
        Value::Array(items) => Ok(items.into_iter().map(ImportRecord).collect()),
        _ => Err(ImportError::shape(NOT_AN_ARRAY)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn parses_array_without_field_checks() {
        let records = resolve_str(r#"[{"slug": "a"}, {"title": "no slug"}, 7]"#).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].slug(), Some("a"));
        assert_eq!(records[2], ImportRecord(json!(7)));
    }

    #[test]
    fn not_json_is_parse_error() {
        let err = resolve_str("not json").unwrap_err();
        assert!(matches!(err, ImportError::Parse { .. }));
        assert!(err.to_string().starts_with("invalid JSON"));
    }

    #[test]
    fn object_is_shape_error() {
        let err = resolve_str(r#"{"a":1}"#).unwrap_err();
        assert!(matches!(err, ImportError::Shape { .. }));
        assert_eq!(err.to_string(), NOT_AN_ARRAY);
    }

    #[tokio::test]
    async fn reads_file() {
        let tmp = std::env::temp_dir().join(format!("ci_source_{}.json", uuid::Uuid::now_v7()));
        std::fs::write(&tmp, r#"[{"slug": "from-file", "title": "From File"}]"#).unwrap();

        let resolver = SourceResolver::new(Client::new(), None);
        let records = resolver.resolve_file(&tmp).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].title(), Some("From File"));

        let _ = std::fs::remove_file(&tmp);
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let resolver = SourceResolver::new(Client::new(), None);
        let err = resolver
            .resolve_file(Path::new("/nonexistent/contentimport.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }

    #[tokio::test]
    async fn proxy_passes_url_and_unwraps_blogs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/fetch-json"))
            .and(query_param("url", "https://old-site.example.com/export.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "blogs": [{"slug": "one"}, {"slug": "two"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Url::parse(&format!("{}/api/fetch-json", server.uri())).unwrap();
        let resolver = SourceResolver::new(Client::new(), Some(endpoint));
        let records = resolver
            .resolve_url("https://old-site.example.com/export.json")
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].slug(), Some("two"));
    }

    #[tokio::test]
    async fn proxy_error_message_is_verbatim() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "URL must return JSON"})),
            )
            .mount(&server)
            .await;

        let endpoint = Url::parse(&server.uri()).unwrap();
        let resolver = SourceResolver::new(Client::new(), Some(endpoint));
        let err = resolver.resolve_url("https://x.example.com").await.unwrap_err();
        assert!(matches!(err, ImportError::Fetch { .. }));
        assert_eq!(err.to_string(), "URL must return JSON");
    }

    #[tokio::test]
    async fn proxy_error_without_body_uses_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let endpoint = Url::parse(&server.uri()).unwrap();
        let resolver = SourceResolver::new(Client::new(), Some(endpoint));
        let err = resolver.resolve_url("https://x.example.com").await.unwrap_err();
        assert_eq!(err.to_string(), FETCH_FALLBACK_MESSAGE);
    }

    #[tokio::test]
    async fn direct_fetch_requires_array() {
        let server = MockServer::start().await;
        Mock::given(path("/posts.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"[{"slug": "direct"}]"#))
            .mount(&server)
            .await;
        Mock::given(path("/object.json"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"blogs": []}"#))
            .mount(&server)
            .await;

        let resolver = SourceResolver::new(Client::new(), None);
        let records = resolver
            .resolve_url(&format!("{}/posts.json", server.uri()))
            .await
            .unwrap();
        assert_eq!(records[0].slug(), Some("direct"));

        let err = resolver
            .resolve_url(&format!("{}/object.json", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ImportError::Shape { .. }));
    }

    #[tokio::test]
    async fn direct_fetch_rejects_non_http() {
        let resolver = SourceResolver::new(Client::new(), None);
        let err = resolver.resolve_url("file:///etc/passwd").await.unwrap_err();
        assert!(matches!(err, ImportError::Fetch { .. }));
    }
}

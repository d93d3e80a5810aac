//! Web search through the Tavily API.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument};

use super::{ensure_success, max_results_field, truncate_chars};
use crate::config::SearchSettings;
use crate::error::{AgentError, Result};
use crate::tools::{Capability, FieldSpec, ToolDescriptor, ToolOutput, ValidatedArgs};

pub const NAME: &str = "websearch";

pub fn descriptor() -> ToolDescriptor {
    ToolDescriptor::new(NAME, "Search the web and summarise the top results.")
        .action("search the web")
        .field(
            FieldSpec::string("query", "Search query to run against the public web.")
                .required()
                .min_length(1),
        )
        .field(max_results_field(
            5,
            10,
            "Maximum number of URLs to inspect (1-10).",
        ))
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
    max_results: usize,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

pub struct WebSearch {
    http: reqwest::Client,
    api_base: String,
    api_key: Option<String>,
    snippet_chars: usize,
}

impl WebSearch {
    pub fn new(http: reqwest::Client, settings: &SearchSettings) -> Self {
        Self {
            http,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            api_key: settings.resolved_api_key(),
            snippet_chars: settings.snippet_chars,
        }
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            AgentError::Tool("no search API key is configured (set TAVILY_API_KEY)".to_string())
        })?;

        let response = self
            .http
            .post(format!("{}/search", self.api_base))
            .json(&json!({
                "api_key": api_key,
                "query": query,
                "max_results": max_results,
                "search_depth": "basic",
            }))
            .send()
            .await?;
        let response = ensure_success(response, "Search API").await?;
        let body: SearchResponse = response.json().await?;

        debug!("Search returned {} result(s)", body.results.len());
        Ok(body.results)
    }
}

/// `URL: ...\nSummary: ...` blocks separated by blank lines.
pub fn format_results(hits: &[SearchHit], max_results: usize, snippet_chars: usize) -> String {
    if hits.is_empty() {
        return "No web results were found.".to_string();
    }

    hits.iter()
        .take(max_results)
        .map(|hit| {
            let text = hit.content.split_whitespace().collect::<Vec<_>>().join(" ");
            format!(
                "URL: {}\nSummary: {}",
                hit.url,
                truncate_chars(&text, snippet_chars)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Capability for WebSearch {
    async fn invoke(&self, args: ValidatedArgs) -> Result<ToolOutput> {
        let args: SearchArgs = args.parse()?;
        let max_results = args.max_results.clamp(1, 10);
        let hits = self.search(args.query.trim(), max_results).await?;
        Ok(format_results(&hits, max_results, self.snippet_chars).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tool(base: &str) -> WebSearch {
        WebSearch::new(
            reqwest::Client::new(),
            &SearchSettings {
                api_base: base.to_string(),
                api_key: Some("tvly-test".to_string()),
                snippet_chars: 320,
            },
        )
    }

    fn args(value: Value) -> ValidatedArgs {
        descriptor().input_schema.validate(&value).unwrap()
    }

    #[test]
    fn test_format_results_truncates_and_collapses() {
        let long = "word ".repeat(100);
        let hits = vec![
            SearchHit {
                url: "https://a.example".into(),
                content: "line one\n\nline   two".into(),
            },
            SearchHit {
                url: "https://b.example".into(),
                content: long,
            },
        ];
        let text = format_results(&hits, 5, 320);
        assert!(text.starts_with("URL: https://a.example\nSummary: line one line two\n\n"));
        assert!(text.ends_with("..."));
        assert!(text.len() < 400 + 60);
    }

    #[test]
    fn test_empty_results_message() {
        assert_eq!(format_results(&[], 5, 320), "No web results were found.");
    }

    #[tokio::test]
    async fn test_search_request_and_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(body_partial_json(json!({"query": "rust async", "max_results": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"url": "https://tokio.rs", "title": "Tokio", "content": "An async runtime"},
                    {"url": "https://rust-lang.org", "title": "Rust", "content": "A language"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let output = tool(&server.uri())
            .invoke(args(json!({"query": "rust async", "max_results": 2})))
            .await
            .unwrap();

        assert_eq!(
            output,
            ToolOutput::Text(
                "URL: https://tokio.rs\nSummary: An async runtime\n\nURL: https://rust-lang.org\nSummary: A language"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_upstream_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": {"error": "bad key"}})),
            )
            .mount(&server)
            .await;

        let err = tool(&server.uri())
            .invoke(args(json!({"query": "x"})))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("HTTP 401"));
    }

    #[tokio::test]
    async fn test_missing_api_key() {
        let search = WebSearch {
            api_key: None,
            ..tool("http://127.0.0.1:9")
        };
        let err = search.invoke(args(json!({"query": "x"}))).await.unwrap_err();
        assert!(err.to_string().contains("TAVILY_API_KEY"));
    }
}

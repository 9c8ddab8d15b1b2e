//! Serper tools - Google web search and news lookups
//!
//! Both tools degrade softly: any failure to reach the service or to find
//! results turns into a fixed sentinel string that the model can relay.

use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use crate::Result;
use crate::error::Error;
use super::Tool;

const SERPER_API_URL: &str = "https://google.serper.dev";

pub const NO_RESULTS: &str = "No results found.";
pub const NO_NEWS: &str = "No news found.";

/// Which Serper endpoint to query and how to render its results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchKind {
    Web,
    News,
}

impl SearchKind {
    fn path(self) -> &'static str {
        match self {
            SearchKind::Web => "search",
            SearchKind::News => "news",
        }
    }

    /// Top-level key holding the result array
    fn results_key(self) -> &'static str {
        match self {
            SearchKind::Web => "organic",
            SearchKind::News => "news",
        }
    }

    fn marker(self) -> &'static str {
        match self {
            SearchKind::Web => "🔎",
            SearchKind::News => "📰",
        }
    }

    pub fn sentinel(self) -> &'static str {
        match self {
            SearchKind::Web => NO_RESULTS,
            SearchKind::News => NO_NEWS,
        }
    }
}

/// Render a Serper response body, one `title: link` line per result.
///
/// Results keep the order the service returned them in.
pub fn summarize(kind: SearchKind, body: &Value) -> String {
    let Some(items) = body.get(kind.results_key()).and_then(Value::as_array) else {
        return kind.sentinel().to_string();
    };

    let lines: Vec<String> = items
        .iter()
        .map(|item| {
            let title = item.get("title").and_then(Value::as_str).unwrap_or("(untitled)");
            let link = item.get("link").and_then(Value::as_str).unwrap_or("");
            format!("{} {}: {}", kind.marker(), title, link)
        })
        .collect();

    if lines.is_empty() {
        kind.sentinel().to_string()
    } else {
        lines.join("\n")
    }
}

/// Thin HTTP client for the Serper API
#[derive(Clone)]
pub struct SerperClient {
    api_key: String,
    base_url: String,
    client: Client,
}

impl SerperClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, SERPER_API_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Run a query and return the rendered summary or the sentinel.
    pub async fn search(&self, kind: SearchKind, query: &str, num: usize) -> String {
        match self.fetch(kind, query, num).await {
            Ok(body) => summarize(kind, &body),
            Err(e) => {
                warn!("Serper {} request failed: {}", kind.path(), e);
                kind.sentinel().to_string()
            }
        }
    }

    async fn fetch(&self, kind: SearchKind, query: &str, num: usize) -> Result<Value> {
        let url = format!("{}/{}", self.base_url, kind.path());
        debug!("POST {} q={:?} num={}", url, query, num);

        let response = self.client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .json(&json!({ "q": query, "num": num }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("HTTP {} from {}", status, url)));
        }

        Ok(response.json().await?)
    }
}

/// Google web search through Serper
pub struct WebSearchTool {
    client: SerperClient,
    num: usize,
}

impl WebSearchTool {
    pub fn new(client: SerperClient) -> Self {
        Self { client, num: 3 }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str { "google_search" }
    fn description(&self) -> &str { "Perform a Google search and return the top results as title and link" }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let query = params.get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| Error::Tool("Missing 'query' parameter".to_string()))?;

        Ok(self.client.search(SearchKind::Web, query, self.num).await)
    }
}

/// Latest news headlines through Serper
pub struct NewsTool {
    client: SerperClient,
    num: usize,
}

impl NewsTool {
    pub fn new(client: SerperClient) -> Self {
        Self { client, num: 5 }
    }
}

#[async_trait]
impl Tool for NewsTool {
    fn name(&self) -> &str { "latest_news" }
    fn description(&self) -> &str { "Fetch the latest news articles, optionally about a topic" }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "News topic (default: latest news 2025)"
                }
            }
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let query = params.get("query")
            .and_then(|v| v.as_str())
            .filter(|q| !q.trim().is_empty())
            .unwrap_or("latest news 2025");

        Ok(self.client.search(SearchKind::News, query, self.num).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the raw request.
    async fn serve_once(status: &'static str, body: Value) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 1024];

            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);

                if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                    let content_length = head
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }

            let body = body.to_string();
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{addr}"), handle)
    }

    fn request_body(request: &str) -> Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_web_search_over_http() {
        let (base_url, server) = serve_once(
            "200 OK",
            json!({
                "organic": [
                    {"title": "A", "link": "https://a.example"},
                    {"title": "B", "link": "https://b.example"},
                    {"title": "C", "link": "https://c.example"}
                ]
            }),
        )
        .await;

        let tool = WebSearchTool::new(SerperClient::with_base_url("sk-test", &base_url));
        let result = tool.execute(json!({"query": "rust"})).await.unwrap();

        assert_eq!(
            result,
            "🔎 A: https://a.example\n🔎 B: https://b.example\n🔎 C: https://c.example"
        );

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /search HTTP/1.1"));
        assert!(request.to_lowercase().contains("x-api-key: sk-test"));
        assert_eq!(request_body(&request), json!({"q": "rust", "num": 3}));
    }

    #[tokio::test]
    async fn test_news_over_http_uses_default_query() {
        let (base_url, server) = serve_once(
            "200 OK",
            json!({"news": [{"title": "Headline", "link": "https://news.example"}]}),
        )
        .await;

        let tool = NewsTool::new(SerperClient::with_base_url("sk-test", &base_url));
        let result = tool.execute(json!({})).await.unwrap();
        assert_eq!(result, "📰 Headline: https://news.example");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /news HTTP/1.1"));
        assert_eq!(request_body(&request), json!({"q": "latest news 2025", "num": 5}));
    }

    #[tokio::test]
    async fn test_server_error_is_soft_failure() {
        let (base_url, server) = serve_once(
            "500 Internal Server Error",
            json!({"organic": [{"title": "stale", "link": "https://stale.example"}]}),
        )
        .await;

        let tool = WebSearchTool::new(SerperClient::with_base_url("sk-test", &base_url));
        let result = tool.execute(json!({"query": "rust"})).await.unwrap();

        assert_eq!(result, NO_RESULTS);
        server.await.unwrap();
    }

    #[test]
    fn test_summarize_organic_in_order() {
        let body = json!({
            "organic": [
                {"title": "Rust", "link": "https://www.rust-lang.org", "position": 1},
                {"title": "Tokio", "link": "https://tokio.rs", "position": 2},
                {"title": "Serde", "link": "https://serde.rs", "position": 3}
            ]
        });

        let summary = summarize(SearchKind::Web, &body);
        let lines: Vec<&str> = summary.split('\n').collect();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "🔎 Rust: https://www.rust-lang.org");
        assert!(lines[1].contains("Tokio") && lines[1].contains("https://tokio.rs"));
        assert!(lines[2].contains("Serde") && lines[2].contains("https://serde.rs"));
    }

    #[test]
    fn test_summarize_missing_key() {
        let body = json!({"searchParameters": {"q": "nothing"}});
        assert_eq!(summarize(SearchKind::Web, &body), "No results found.");
        assert_eq!(summarize(SearchKind::News, &body), "No news found.");
    }

    #[test]
    fn test_summarize_empty_array() {
        assert_eq!(summarize(SearchKind::News, &json!({"news": []})), NO_NEWS);
    }

    #[test]
    fn test_summarize_news_ignores_organic() {
        let body = json!({"organic": [{"title": "t", "link": "l"}]});
        assert_eq!(summarize(SearchKind::News, &body), NO_NEWS);
    }

    #[test]
    fn test_summarize_news() {
        let body = json!({"news": [{"title": "Headline", "link": "https://news.example", "source": "X"}]});
        assert_eq!(summarize(SearchKind::News, &body), "📰 Headline: https://news.example");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_soft_failure() {
        let client = SerperClient::with_base_url("key", "http://127.0.0.1:1");
        let tool = WebSearchTool::new(client.clone());

        let result = tool.execute(json!({"query": "rust"})).await.unwrap();
        assert_eq!(result, NO_RESULTS);

        let news = NewsTool::new(client).execute(json!({})).await.unwrap();
        assert_eq!(news, NO_NEWS);
    }

    #[tokio::test]
    async fn test_web_search_requires_query() {
        let tool = WebSearchTool::new(SerperClient::new("key"));
        let result = tool.execute(json!({})).await;
        assert!(matches!(result, Err(Error::Tool(_))));
    }
}

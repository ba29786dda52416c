//! Web search tools backed by the DuckDuckGo Lite HTML endpoint

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::Result;
use crate::error::Error;
use super::Tool;

const DDG_LITE_URL: &str = "https://lite.duckduckgo.com/lite/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

static LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<a([^>]*?)class=['"]result-link['"]([^>]*)>(.*?)</a>"#).expect("valid link pattern")
});
static HREF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href=['"]([^'"]+)['"]"#).expect("valid href pattern"));
static SNIPPET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<td[^>]*class=['"]result-snippet['"][^>]*>(.*?)</td>"#).expect("valid snippet pattern")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid tag pattern"));

/// A single search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub link: String,
    pub description: String,
}

/// Shared DuckDuckGo plumbing for the search and news tools
struct DuckDuckGo {
    max_results: usize,
    /// Time filter (`d`, `w`, `m`, `y`), if any
    time_filter: Option<&'static str>,
}

impl DuckDuckGo {
    fn search_url(&self, query: &str) -> Result<Url> {
        let mut params = vec![("q", query)];
        if let Some(df) = self.time_filter {
            params.push(("df", df));
        }
        Url::parse_with_params(DDG_LITE_URL, &params)
            .map_err(|e| Error::Tool(format!("Invalid search URL: {}", e)))
    }

    async fn search(&self, query: &str, max_results: Option<usize>) -> Result<String> {
        let url = self.search_url(query)?;
        debug!("DuckDuckGo query: {}", url);

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| Error::Tool(format!("Failed to create HTTP client: {}", e)))?;

        let response = client.get(url)
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP error: {}", status)));
        }

        let html = response.text().await
            .map_err(|e| Error::Tool(format!("Failed to read response: {}", e)))?;

        let limit = result_limit(max_results, self.max_results);
        let results: Vec<SearchResult> = parse_lite_html(&html)
            .into_iter()
            .take(limit)
            .collect();
        debug!("DuckDuckGo returned {} results", results.len());

        Ok(format_results(query, &results))
    }
}

/// Requested result count, kept within `1..=configured`
fn result_limit(requested: Option<usize>, configured: usize) -> usize {
    let ceiling = configured.max(1);
    requested.unwrap_or(ceiling).clamp(1, ceiling)
}

fn search_parameters(what: &str) -> Value {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": format!("The {} query", what)
            },
            "max_results": {
                "type": "integer",
                "description": "Maximum number of results to return"
            }
        },
        "required": ["query"]
    })
}

fn query_args(params: &Value) -> Result<(String, Option<usize>)> {
    let query = params.get("query")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| Error::Tool("Missing 'query' parameter".to_string()))?;

    let max_results = params.get("max_results")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize);

    Ok((query.to_string(), max_results))
}

/// General web search
pub struct DuckDuckGoSearch {
    inner: DuckDuckGo,
}

impl DuckDuckGoSearch {
    pub fn new(max_results: usize) -> Self {
        Self {
            inner: DuckDuckGo { max_results, time_filter: None },
        }
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearch {
    fn name(&self) -> &str { "duckduckgo_search" }
    fn description(&self) -> &str { "Search the web with DuckDuckGo and return titles, links and snippets" }
    fn parameters(&self) -> Value { search_parameters("search") }

    async fn execute(&self, params: Value) -> Result<String> {
        let (query, max_results) = query_args(&params)?;
        self.inner.search(&query, max_results).await
    }
}

/// Recent news search, restricted to the past week
pub struct DuckDuckGoNews {
    inner: DuckDuckGo,
}

impl DuckDuckGoNews {
    pub fn new(max_results: usize) -> Self {
        Self {
            inner: DuckDuckGo { max_results, time_filter: Some("w") },
        }
    }
}

#[async_trait]
impl Tool for DuckDuckGoNews {
    fn name(&self) -> &str { "duckduckgo_news" }
    fn description(&self) -> &str { "Search DuckDuckGo for the latest news and events from the past week" }
    fn parameters(&self) -> Value { search_parameters("news") }

    async fn execute(&self, params: Value) -> Result<String> {
        let (query, max_results) = query_args(&params)?;
        self.inner.search(&query, max_results).await
    }
}

/// Render results as markdown for the model
fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("No results found for \"{}\".", query);
    }

    let mut output = format!("## Search results for \"{}\"\n\n", query);
    for (i, result) in results.iter().enumerate() {
        output.push_str(&format!("{}. [{}]({})\n", i + 1, result.title, result.link));
        if !result.description.is_empty() {
            output.push_str(&format!("   {}\n", result.description));
        }
        output.push('\n');
    }
    output
}

/// Parse the DuckDuckGo Lite results table
fn parse_lite_html(html: &str) -> Vec<SearchResult> {
    let snippets: Vec<String> = SNIPPET_RE.captures_iter(html)
        .map(|c| clean_text(c.get(1).map(|m| m.as_str()).unwrap_or_default()))
        .collect();

    let mut results = Vec::new();
    for (i, cap) in LINK_RE.captures_iter(html).enumerate() {
        let attrs = format!(
            "{} {}",
            cap.get(1).map(|m| m.as_str()).unwrap_or_default(),
            cap.get(2).map(|m| m.as_str()).unwrap_or_default()
        );
        let Some(href) = HREF_RE.captures(&attrs).and_then(|c| c.get(1)) else {
            continue;
        };

        let title = clean_text(cap.get(3).map(|m| m.as_str()).unwrap_or_default());
        let link = resolve_link(&decode_entities(href.as_str()));
        if title.is_empty() || link.is_empty() {
            continue;
        }

        results.push(SearchResult {
            title,
            link,
            description: snippets.get(i).cloned().unwrap_or_default(),
        });
    }

    results
}

fn clean_text(fragment: &str) -> String {
    let stripped = TAG_RE.replace_all(fragment, "");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Unwrap DuckDuckGo redirect links (`//duckduckgo.com/l/?uddg=...`)
fn resolve_link(href: &str) -> String {
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    if let Ok(url) = Url::parse(&absolute) {
        if url.path().starts_with("/l/") {
            if let Some((_, target)) = url.query_pairs().find(|(k, _)| k == "uddg") {
                return target.into_owned();
            }
        }
    }
    absolute
}

#[cfg(test)]
mod tests {
    use super::*;

    const LITE_PAGE: &str = r#"
        <table>
          <tr><td>1.&nbsp;</td><td>
            <a rel="nofollow" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fstory&amp;rut=abc" class='result-link'>Example <b>Story</b></a>
          </td></tr>
          <tr><td>&nbsp;</td><td class='result-snippet'>A story about <b>rust</b> &amp; friends.</td></tr>
          <tr><td>2.&nbsp;</td><td>
            <a rel="nofollow" class="result-link" href="https://rust-lang.org/">Rust</a>
          </td></tr>
          <tr><td>&nbsp;</td><td class="result-snippet">
            A language empowering everyone.
          </td></tr>
        </table>
    "#;

    #[test]
    fn test_parse_lite_html() {
        let results = parse_lite_html(LITE_PAGE);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].title, "Example Story");
        assert_eq!(results[0].link, "https://example.com/story");
        assert_eq!(results[0].description, "A story about rust & friends.");

        assert_eq!(results[1].link, "https://rust-lang.org/");
        assert_eq!(results[1].description, "A language empowering everyone.");
    }

    #[test]
    fn test_parse_empty_page() {
        assert!(parse_lite_html("<html><body>No results.</body></html>").is_empty());
    }

    #[test]
    fn test_result_limit_bounds() {
        assert_eq!(result_limit(Some(0), 5), 1);
        assert_eq!(result_limit(Some(3), 5), 3);
        assert_eq!(result_limit(Some(50), 5), 5);
        assert_eq!(result_limit(None, 5), 5);
        assert_eq!(result_limit(None, 0), 1);
    }

    #[test]
    fn test_zero_requested_still_reports_hits() {
        let results: Vec<SearchResult> = parse_lite_html(LITE_PAGE)
            .into_iter()
            .take(result_limit(Some(0), 5))
            .collect();
        let out = format_results("rust", &results);
        assert!(out.contains("1. [Example Story]"));
        assert!(!out.contains("No results"));
    }

    #[test]
    fn test_format_results() {
        assert_eq!(format_results("q", &[]), "No results found for \"q\".");

        let out = format_results("rust", &[SearchResult {
            title: "Rust".to_string(),
            link: "https://rust-lang.org/".to_string(),
            description: "Fast.".to_string(),
        }]);
        assert!(out.contains("1. [Rust](https://rust-lang.org/)"));
        assert!(out.contains("   Fast."));
    }

    #[test]
    fn test_news_url_has_time_filter() {
        let news = DuckDuckGoNews::new(5);
        let url = news.inner.search_url("mars rover").unwrap();
        assert_eq!(url.as_str(), "https://lite.duckduckgo.com/lite/?q=mars+rover&df=w");

        let search = DuckDuckGoSearch::new(5);
        assert!(!search.inner.search_url("x").unwrap().as_str().contains("df="));
    }

    #[tokio::test]
    async fn test_missing_query() {
        let tool = DuckDuckGoSearch::new(5);
        let err = tool.execute(json!({"query": "  "})).await.unwrap_err();
        assert!(err.to_string().contains("query"));
    }
}

//! Web access tools: search and fetch URLs.

use super::{Tool, ToolOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const USER_AGENT: &str = concat!("threadline/", env!("CARGO_PKG_VERSION"));
const FETCH_MAX_CHARS: usize = 20_000;

/// Shared HTTP client for the web tools
pub(super) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
}

/// Search the web via the DuckDuckGo HTML endpoint (no API key needed).
pub struct WebSearchTool {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
    #[serde(default = "default_num_results")]
    num_results: usize,
}

fn default_num_results() -> usize {
    5
}

impl WebSearchTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> String {
        "Search the web for current information. Returns result titles, snippets and URLs."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["query"],
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query"
                },
                "num_results": {
                    "type": "integer",
                    "description": "Maximum number of results to return (default: 5)"
                }
            }
        })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: WebSearchInput = match serde_json::from_value(input) {
            Ok(input) => input,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let url = format!(
            "https://html.duckduckgo.com/html/?q={}",
            urlencoding::encode(&input.query)
        );

        let html = match self.client.get(&url).send().await {
            Ok(response) => match response.text().await {
                Ok(html) => html,
                Err(e) => return ToolOutput::error(format!("Failed to read results: {e}")),
            },
            Err(e) => return ToolOutput::error(format!("Search request failed: {e}")),
        };

        let hits = extract_search_hits(&html, input.num_results);
        if hits.is_empty() {
            ToolOutput::success(format!("No results found for: {}", input.query))
        } else {
            ToolOutput::success(
                hits.iter()
                    .map(SearchHit::render)
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        }
    }
}

struct SearchHit {
    title: String,
    snippet: String,
    url: String,
}

impl SearchHit {
    fn render(&self) -> String {
        format!("**{}**\n{}\nURL: {}", self.title, self.snippet, self.url)
    }
}

/// Pull result titles/snippets/urls out of the DuckDuckGo HTML page.
fn extract_search_hits(html: &str, limit: usize) -> Vec<SearchHit> {
    fn tagged_text<'a>(chunk: &'a str, class_marker: &str) -> Option<&'a str> {
        chunk
            .split(class_marker)
            .nth(1)?
            .split('>')
            .nth(1)?
            .split('<')
            .next()
    }

    html.split("class=\"result__body\"")
        .skip(1)
        .take(limit)
        .filter_map(|chunk| {
            let title = tagged_text(chunk, "class=\"result__a\"")?;
            if title.is_empty() {
                return None;
            }
            Some(SearchHit {
                title: decode_entities(title),
                snippet: decode_entities(tagged_text(chunk, "class=\"result__snippet\"").unwrap_or("")),
                url: tagged_text(chunk, "class=\"result__url\"")
                    .map(str::trim)
                    .unwrap_or("")
                    .to_string(),
            })
        })
        .collect()
}

/// Fetch the text content of a URL.
pub struct FetchUrlTool {
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct FetchUrlInput {
    url: String,
}

impl FetchUrlTool {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for FetchUrlTool {
    fn name(&self) -> &str {
        "fetch_url"
    }

    fn description(&self) -> String {
        "Fetch the content of a URL. Returns the text content of the page.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to fetch"
                }
            }
        })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: FetchUrlInput = match serde_json::from_value(input) {
            Ok(input) => input,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let response = match self.client.get(&input.url).send().await {
            Ok(response) => response,
            Err(e) => return ToolOutput::error(format!("Request failed: {e}")),
        };

        let status = response.status();
        if !status.is_success() {
            return ToolOutput::error(format!("HTTP error: {status}"));
        }

        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("text/html"));

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return ToolOutput::error(format!("Failed to read body: {e}")),
        };

        let text = if is_html { strip_html(&body) } else { body };

        if text.chars().count() > FETCH_MAX_CHARS {
            let truncated: String = text.chars().take(FETCH_MAX_CHARS).collect();
            ToolOutput::success(format!(
                "{truncated}... [content truncated, showing first {FETCH_MAX_CHARS} chars]"
            ))
        } else {
            ToolOutput::success(text)
        }
    }
}

/// Reduce an HTML page to readable text.
fn strip_html(html: &str) -> String {
    let without_blocks = drop_element(&drop_element(html, "script"), "style");

    let mut text = String::new();
    let mut in_tag = false;
    for c in without_blocks.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                text.push(' ');
            }
            c if !in_tag => text.push(c),
            _ => {}
        }
    }

    decode_entities(&text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Remove `<name ...>...</name>` blocks wholesale.
fn drop_element(html: &str, name: &str) -> String {
    let open = format!("<{name}");
    let close = format!("</{name}>");
    let mut remaining = html;
    let mut out = String::with_capacity(html.len());

    while let Some(start) = remaining.find(&open) {
        out.push_str(&remaining[..start]);
        match remaining[start..].find(&close) {
            Some(end) => remaining = &remaining[start + end + close.len()..],
            None => return out,
        }
    }
    out.push_str(remaining);
    out
}

fn decode_entities(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
}

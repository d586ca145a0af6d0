//! Web search and page reading

use async_trait::async_trait;
use reqwest::{Client, Url};
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{Action, ActionOutput};
use crate::BoxError;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const TEXT_WIDTH: usize = 100;

/// Search DuckDuckGo or open a URL and return the page as plain text
pub struct BrowserAction {
    client: Client,
    search_url: String,
    max_chars: usize,
}

impl BrowserAction {
    pub fn new(max_chars: usize) -> Self {
        Self {
            client: Client::new(),
            search_url: SEARCH_URL.to_string(),
            max_chars,
        }
    }

    /// Point searches at another endpoint serving the same HTML layout
    pub fn with_search_url(mut self, url: impl Into<String>) -> Self {
        self.search_url = url.into();
        self
    }

    async fn get(&self, request: reqwest::RequestBuilder) -> Result<(Url, String), reqwest::Error> {
        let response = request
            .header("User-Agent", USER_AGENT)
            .timeout(Duration::from_secs(30))
            .send()
            .await?
            .error_for_status()?;
        let url = response.url().clone();
        Ok((url, response.text().await?))
    }

    async fn open(&self, url: &str) -> Result<String, reqwest::Error> {
        debug!("◆ Opening {}", url);
        let (_, html) = self.get(self.client.get(url)).await?;
        Ok(truncate_chars(&page_text(&html), self.max_chars))
    }

    async fn search(&self, query: &str) -> Result<ActionOutput, reqwest::Error> {
        debug!("◆ Searching for {}", query);
        let (base, html) = self
            .get(self.client.get(&self.search_url).query(&[("q", query)]))
            .await?;
        let Some(link) = first_result_link(&html, &base) else {
            return Ok(ActionOutput::text(format!(
                "Could not find the first search result link for query: '{}'.",
                query
            )));
        };
        let text = self.open(&link).await?;
        Ok(ActionOutput::text(format!(
            "Searched for '{}', opened '{}':\n{}",
            query, link, text
        )))
    }
}

#[derive(Deserialize)]
struct BrowserArgs {
    query: Option<String>,
    url: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[async_trait]
impl Action for BrowserAction {
    fn name(&self) -> &str {
        "browser_actions"
    }
    fn description(&self) -> &str {
        "Search the web for a query and read the first result, or open a URL \
         directly and read its text. Provide EITHER query OR url, not both."
    }
    fn required(&self) -> &[&str] {
        &[]
    }
    fn optional(&self) -> &[&str] {
        &["query", "url"]
    }
    fn usage(&self) -> String {
        "<browser_actions>\n<query>tokio select macro documentation</query>\n</browser_actions>\n\n\
         <browser_actions>\n<url>https://docs.rs/tokio</url>\n</browser_actions>"
            .to_string()
    }

    async fn execute(&self, args: Value) -> Result<ActionOutput, BoxError> {
        let args: BrowserArgs = serde_json::from_value(args)?;
        let (query, url) = (non_blank(args.query), non_blank(args.url));

        let output = match (query, url) {
            (Some(_), Some(_)) => {
                ActionOutput::text("Error: Provide either 'url' or 'query', not both.")
            }
            (None, None) => ActionOutput::text("Error: Provide either 'url' or 'query'."),
            (None, Some(url)) => match self.open(&url).await {
                Ok(text) => ActionOutput::text(format!("Opened '{}':\n{}", url, text)),
                Err(e) => ActionOutput::text(format!("Error opening URL '{}': {}", url, e)),
            },
            (Some(query), None) => match self.search(&query).await {
                Ok(output) => output,
                Err(e) => ActionOutput::text(format!("Error searching for '{}': {}", query, e)),
            },
        };
        Ok(output)
    }
}

/// First `a.result__a` link on a DuckDuckGo HTML results page.
///
/// Redirect links (`/l/?uddg=...`) are unwrapped to their target.
pub fn first_result_link(html: &str, base: &Url) -> Option<String> {
    let selector = Selector::parse("a.result__a").ok()?;
    let document = Html::parse_document(html);
    let href = document
        .select(&selector)
        .find_map(|a| a.value().attr("href"))?;

    let url = base.join(href).ok()?;
    let target = url
        .query_pairs()
        .find(|(key, _)| key == "uddg")
        .map(|(_, value)| value.into_owned());
    Some(target.unwrap_or_else(|| url.to_string()))
}

/// Render HTML as wrapped plain text
pub fn page_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), TEXT_WIDTH)
        .trim()
        .to_string()
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}

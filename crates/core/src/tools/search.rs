//! Web search tool.

use super::{ToolError, error_text, require_input};
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use tracing::{info, warn};

/// Maximum number of hits included in a digest.
pub const MAX_RESULTS: usize = 5;

/// A single search result.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: Option<String>,
}

/// A search backend.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError>;
}

/// Searches the web for `query` and renders a short digest.
///
/// Never fails: provider errors and empty result sets come back as a marked
/// error string.
pub async fn search_web(provider: &dyn SearchProvider, query: &str) -> Result<String, String> {
    let lookup = async {
        let query = require_input(query, "query")?;
        let hits = provider.search(query).await?;
        if hits.is_empty() {
            return Err(ToolError::NoResults(query.to_string()));
        }
        Ok(digest(query, &hits))
    };
    match lookup.await {
        Ok(text) => {
            info!(%query, "Web search completed");
            Ok(text)
        }
        Err(e) => {
            warn!(%query, error = %e, "Web search failed");
            Err(error_text(&format!("search the web for '{}'", query.trim()), &e))
        }
    }
}

/// Renders up to `MAX_RESULTS` hits as numbered lines.
pub fn digest(query: &str, hits: &[SearchHit]) -> String {
    let mut text = format!("Results for '{query}':");
    for (i, hit) in hits.iter().take(MAX_RESULTS).enumerate() {
        text.push_str(&format!("\n{}. {}", i + 1, hit.title));
        if !hit.snippet.is_empty() {
            text.push_str(&format!(": {}", hit.snippet));
        }
        if let Some(url) = &hit.url {
            text.push_str(&format!(" ({url})"));
        }
    }
    text
}

/// `SearchProvider` backed by the DuckDuckGo Instant Answer API.
pub struct DuckDuckGoProvider {
    client: Client,
    base_url: Url,
}

impl DuckDuckGoProvider {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    async fn search(&self, query: &str) -> Result<Vec<SearchHit>, ToolError> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Status(status));
        }
        let body = response.text().await?;
        parse_instant_answer(&body)
    }
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    heading: String,
    answer: serde_json::Value,
    abstract_text: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    definition: String,
    #[serde(rename = "DefinitionURL")]
    definition_url: String,
    results: Vec<Topic>,
    related_topics: Vec<Topic>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "PascalCase", default)]
struct Topic {
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    topics: Vec<Topic>,
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn topic_hit(topic: Topic) -> Option<SearchHit> {
    let text = non_empty(topic.text)?;
    let (title, snippet) = match text.split_once(" - ") {
        Some((title, snippet)) => (title.to_string(), snippet.to_string()),
        None => (text, String::new()),
    };
    Some(SearchHit {
        title,
        snippet,
        url: non_empty(topic.first_url),
    })
}

/// Parses an Instant Answer payload into hits, most relevant first.
pub(crate) fn parse_instant_answer(body: &str) -> Result<Vec<SearchHit>, ToolError> {
    let parsed: InstantAnswer =
        serde_json::from_str(body).map_err(|e| ToolError::Decode(e.to_string()))?;
    let heading = non_empty(parsed.heading);
    let mut hits = Vec::new();

    if let Some(answer) = parsed.answer.as_str().and_then(|a| non_empty(a.to_string())) {
        hits.push(SearchHit {
            title: heading.clone().unwrap_or_else(|| "Answer".to_string()),
            snippet: answer,
            url: None,
        });
    }
    if let Some(abstract_text) = non_empty(parsed.abstract_text) {
        hits.push(SearchHit {
            title: heading.clone().unwrap_or_else(|| "Summary".to_string()),
            snippet: abstract_text,
            url: non_empty(parsed.abstract_url),
        });
    }
    if let Some(definition) = non_empty(parsed.definition) {
        hits.push(SearchHit {
            title: "Definition".to_string(),
            snippet: definition,
            url: non_empty(parsed.definition_url),
        });
    }

    let topics = parsed.results.into_iter().chain(parsed.related_topics);
    for topic in topics {
        if topic.topics.is_empty() {
            hits.extend(topic_hit(topic));
        } else {
            hits.extend(topic.topics.into_iter().filter_map(topic_hit));
        }
        if hits.len() >= MAX_RESULTS {
            break;
        }
    }
    hits.truncate(MAX_RESULTS);
    Ok(hits)
}

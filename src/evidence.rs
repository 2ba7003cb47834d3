//! Real-world corroboration of a headline through a news search.
//!
//! Nothing here ever fails upward: an unreachable or broken search counts as
//! zero evidence, never as evidence.

use async_trait::async_trait;
use reqwest::Client;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{PipelineError, Result, TARGET_WEB_REQUEST};

/// At most this many sources are kept with the evidence.
pub const MAX_EVIDENCE_SOURCES: usize = 3;

/// Confidence points per corroborating result; five results saturate.
pub const CONFIDENCE_PER_RESULT: usize = 20;

/// One hit from the news search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NewsResult {
    pub title: String,
    pub source: String,
    pub link: String,
    pub date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Evidence {
    pub exists: bool,
    pub sources: Vec<NewsResult>,
    pub confidence: u8,
}

impl Evidence {
    pub fn none() -> Self {
        Self {
            exists: false,
            sources: Vec::new(),
            confidence: 0,
        }
    }

    /// Builds evidence from the full result list.
    pub fn from_results(mut results: Vec<NewsResult>) -> Self {
        let confidence = (results.len() * CONFIDENCE_PER_RESULT).min(100) as u8;
        results.truncate(MAX_EVIDENCE_SOURCES);
        Self {
            exists: !results.is_empty(),
            sources: results,
            confidence,
        }
    }
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<NewsResult>>;
}

/// Search query for a headline: the part before the first colon, trimmed.
pub fn headline_query(headline: &str) -> &str {
    headline.split(':').next().unwrap_or(headline).trim()
}

/// Looks for external coverage of `headline`.
pub async fn fetch_evidence(search: &dyn NewsSearch, headline: &str) -> Evidence {
    let query = headline_query(headline);
    if query.is_empty() {
        warn!(target: TARGET_WEB_REQUEST, "Empty search query for headline '{}'", headline);
        return Evidence::none();
    }

    match search.search(query).await {
        Ok(results) => {
            let evidence = Evidence::from_results(results);
            info!(target: TARGET_WEB_REQUEST, "Evidence for '{}': confidence {}, {} source(s) kept", query, evidence.confidence, evidence.sources.len());
            evidence
        }
        Err(e) => {
            warn!(target: TARGET_WEB_REQUEST, "News search failed for '{}', treating as no evidence: {}", query, e);
            Evidence::none()
        }
    }
}

#[derive(Deserialize)]
struct SerpApiResponse {
    #[serde(default)]
    news_results: Vec<SerpApiNewsResult>,
    error: Option<String>,
}

/// A top-level entry is either a single story or a cluster of related
/// coverage carrying a `highlight` and/or `stories`.
#[derive(Deserialize)]
struct SerpApiNewsResult {
    title: Option<String>,
    link: Option<String>,
    date: Option<String>,
    source: Option<SerpApiSource>,
    highlight: Option<SerpApiStory>,
    #[serde(default)]
    stories: Vec<SerpApiStory>,
}

#[derive(Deserialize)]
struct SerpApiStory {
    title: Option<String>,
    link: Option<String>,
    date: Option<String>,
    source: Option<SerpApiSource>,
}

#[derive(Deserialize)]
struct SerpApiSource {
    name: Option<String>,
}

/// Google News results through SerpAPI.
pub struct SerpApiNewsSearch {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl SerpApiNewsSearch {
    pub const DEFAULT_ENDPOINT: &'static str = "https://serpapi.com/search.json";

    pub fn new(client: Client, endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }

    pub fn from_env(client: Client) -> Result<Self> {
        let api_key = std::env::var("NEWS_SEARCH_API_KEY")
            .map_err(|_| PipelineError::Config("NEWS_SEARCH_API_KEY is not set".into()))?;
        let endpoint = std::env::var("NEWS_SEARCH_ENDPOINT")
            .unwrap_or_else(|_| Self::DEFAULT_ENDPOINT.to_string());
        Ok(Self::new(client, endpoint, api_key))
    }
}

#[async_trait]
impl NewsSearch for SerpApiNewsSearch {
    async fn search(&self, query: &str) -> Result<Vec<NewsResult>> {
        debug!(target: TARGET_WEB_REQUEST, "News search: {}", query);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("engine", "google_news"),
                ("q", query),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(PipelineError::Upstream {
                service: "news search",
                message: format!("status {}", response.status()),
            });
        }

        let body: SerpApiResponse = response.json().await?;
        if let Some(error) = body.error {
            // SerpAPI reports "no results" as an error string
            if error.to_lowercase().contains("hasn't returned any results") {
                return Ok(Vec::new());
            }
            return Err(PipelineError::Upstream {
                service: "news search",
                message: error,
            });
        }

        Ok(news_results(body.news_results))
    }
}

fn story_result(
    title: Option<String>,
    link: Option<String>,
    source: Option<SerpApiSource>,
    date: Option<String>,
) -> Option<NewsResult> {
    Some(NewsResult {
        title: title?,
        link: link?,
        source: source.and_then(|s| s.name).unwrap_or_default(),
        date,
    })
}

/// One result per top-level entry. A cluster counts once, represented by its
/// highlight or else its first complete story.
fn news_results(entries: Vec<SerpApiNewsResult>) -> Vec<NewsResult> {
    entries
        .into_iter()
        .filter_map(|entry| {
            story_result(entry.title, entry.link, entry.source, entry.date)
                .or_else(|| {
                    entry
                        .highlight
                        .and_then(|h| story_result(h.title, h.link, h.source, h.date))
                })
                .or_else(|| {
                    entry
                        .stories
                        .into_iter()
                        .find_map(|s| story_result(s.title, s.link, s.source, s.date))
                })
        })
        .collect()
}

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::Completion;
use crate::prompt;
use crate::types::{Category, NewArticle};
use crate::{PipelineError, Result, TARGET_LLM_REQUEST};

const MAX_TITLE_CHARS: usize = 200;

/// An article as the model must write it. Parsed as strictly as a fact-check verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CandidateArticle {
    pub title: String,
    pub excerpt: String,
    /// Simple HTML body.
    pub content: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub sources: Vec<String>,
}

impl CandidateArticle {
    pub fn into_new_article(
        self,
        author: &str,
        image_url: Option<String>,
        image_credit: Option<String>,
    ) -> NewArticle {
        NewArticle {
            title: self.title,
            excerpt: self.excerpt,
            content: self.content,
            category: self.category,
            tags: self.tags,
            author: author.to_string(),
            sources: self.sources,
            image_url,
            image_credit,
        }
    }
}

pub fn parse_candidate(raw: &str) -> Result<CandidateArticle> {
    let mut candidate: CandidateArticle = serde_json::from_str(raw.trim())
        .map_err(|e| PipelineError::MalformedResponse(e.to_string()))?;

    candidate.title = candidate.title.trim().to_string();
    if candidate.title.is_empty() || candidate.title.chars().count() > MAX_TITLE_CHARS {
        return Err(PipelineError::MalformedResponse(format!(
            "unusable title {:?}",
            candidate.title
        )));
    }
    if candidate.content.trim().is_empty() {
        return Err(PipelineError::MalformedResponse("empty content".to_string()));
    }
    candidate.tags = candidate
        .tags
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    candidate.tags.dedup();
    Ok(candidate)
}

/// Writes candidate articles for trending topics.
pub struct Generator {
    completion: Arc<dyn Completion>,
    schema: String,
}

impl Generator {
    pub fn new(completion: Arc<dyn Completion>) -> Self {
        Self {
            completion,
            schema: serde_json::to_string_pretty(&schema_for!(CandidateArticle))
                .unwrap_or_else(|_| "{}".to_string()),
        }
    }

    pub async fn generate(&self, topic: &str) -> Result<CandidateArticle> {
        let prompt = prompt::article_generation_prompt(topic, &self.schema);
        let raw = self.completion.complete_json(&prompt).await?;
        match parse_candidate(&raw) {
            Ok(candidate) => {
                info!(target: TARGET_LLM_REQUEST, "Generated {:?} ({}) for topic '{}'", candidate.title, candidate.category, topic);
                Ok(candidate)
            }
            Err(e) => {
                warn!(target: TARGET_LLM_REQUEST, "Unusable article for topic '{}': {}", topic, e);
                debug!(target: TARGET_LLM_REQUEST, "Rejected answer: {}", raw);
                Err(e)
            }
        }
    }
}

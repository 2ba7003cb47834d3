//! Second-opinion fact check of a generated article by a language model.
//!
//! The model's answer is deserialized strictly: unknown keys, missing keys,
//! wrong enum spellings, out-of-range scores and Markdown fences are all
//! rejected. A malformed answer is an error, never a pass or a fail.

use schemars::{schema_for, JsonSchema};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::evidence::Evidence;
use crate::llm::Completion;
use crate::prompt;
use crate::types::{Article, LegalRisk, VerificationStatus};
use crate::{PipelineError, Result, TARGET_LLM_REQUEST};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClaimVerdict {
    True,
    False,
    Unverified,
    Misleading,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PublishRecommendation {
    Publish,
    NeedsRevision,
    Reject,
}

impl PublishRecommendation {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishRecommendation::Publish => "publish",
            PublishRecommendation::NeedsRevision => "needs_revision",
            PublishRecommendation::Reject => "reject",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ClaimCheck {
    pub claim: String,
    pub verdict: ClaimVerdict,
    pub explanation: String,
    /// 0-100
    pub confidence: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct SourceCredibility {
    /// 0-100
    pub overall_rating: u8,
    pub real_sources: Vec<String>,
    pub fake_sources: Vec<String>,
    pub missing_citations: Vec<String>,
}

/// The analyzer's verdict, exactly as the model must produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FactCheckVerdict {
    /// 0-100
    pub accuracy_score: u8,
    pub verification_status: VerificationStatus,
    pub is_fabricated: bool,
    pub fact_check_results: Vec<ClaimCheck>,
    pub source_credibility: SourceCredibility,
    pub legal_risk_assessment: LegalRisk,
    pub recommendations: Vec<String>,
    pub publish_recommendation: PublishRecommendation,
}

/// JSON schema of [`FactCheckVerdict`], embedded in the prompt.
pub fn verdict_schema() -> String {
    serde_json::to_string_pretty(&schema_for!(FactCheckVerdict))
        .unwrap_or_else(|_| "{}".to_string())
}

fn check_percent(field: &str, value: u8) -> Result<()> {
    if value > 100 {
        return Err(PipelineError::MalformedResponse(format!(
            "{} out of range: {}",
            field, value
        )));
    }
    Ok(())
}

/// Parses and validates a raw model answer.
pub fn parse_verdict(raw: &str) -> Result<FactCheckVerdict> {
    let verdict: FactCheckVerdict = serde_json::from_str(raw.trim())
        .map_err(|e| PipelineError::MalformedResponse(e.to_string()))?;

    check_percent("accuracy_score", verdict.accuracy_score)?;
    check_percent(
        "source_credibility.overall_rating",
        verdict.source_credibility.overall_rating,
    )?;
    for (i, claim) in verdict.fact_check_results.iter().enumerate() {
        check_percent(&format!("fact_check_results[{}].confidence", i), claim.confidence)?;
    }
    Ok(verdict)
}

/// Sends articles to a [`Completion`] for fact-checking.
pub struct FactCheckAnalyzer<C> {
    completion: C,
    /// Times the model may be re-asked after a malformed answer.
    max_attempts: u32,
    schema: String,
}

impl<C: Completion> FactCheckAnalyzer<C> {
    pub fn new(completion: C, max_attempts: u32) -> Self {
        Self {
            completion,
            max_attempts: max_attempts.max(1),
            schema: verdict_schema(),
        }
    }

    /// Fact-checks `article` in light of `evidence`.
    ///
    /// Returns `MalformedResponse` if no attempt produced a valid verdict, or
    /// `AnalyzerUnavailable` if the model could not be reached at all.
    pub async fn analyze(&self, article: &Article, evidence: &Evidence) -> Result<FactCheckVerdict> {
        let prompt = prompt::fact_check_prompt(article, evidence, &self.schema);
        let mut last_error = None;

        for attempt in 1..=self.max_attempts {
            let raw = self.completion.complete_json(&prompt).await?;
            match parse_verdict(&raw) {
                Ok(verdict) => {
                    info!(target: TARGET_LLM_REQUEST, "Fact check of article {}: accuracy {}, fabricated {}, legal risk {}", article.id, verdict.accuracy_score, verdict.is_fabricated, verdict.legal_risk_assessment);
                    return Ok(verdict);
                }
                Err(e) => {
                    warn!(target: TARGET_LLM_REQUEST, "Fact check of article {} returned an unusable answer (attempt {}/{}): {}", article.id, attempt, self.max_attempts, e);
                    debug!(target: TARGET_LLM_REQUEST, "Rejected answer: {}", raw);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| PipelineError::MalformedResponse("no answer".to_string())))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    pub(crate) fn verdict_json(accuracy: u8, fabricated: bool, risk: &str) -> String {
        serde_json::json!({
            "accuracy_score": accuracy,
            "verification_status": "verified",
            "is_fabricated": fabricated,
            "fact_check_results": [
                {"claim": "The council met on Monday", "verdict": "true",
                 "explanation": "Matches the council minutes", "confidence": 90}
            ],
            "source_credibility": {
                "overall_rating": 80,
                "real_sources": ["Reuters"],
                "fake_sources": [],
                "missing_citations": []
            },
            "legal_risk_assessment": risk,
            "recommendations": ["Link the council minutes"],
            "publish_recommendation": "publish"
        })
        .to_string()
    }

    /// Hands out queued answers in order; errors once the queue is empty.
    pub(crate) struct ScriptedCompletion {
        answers: Mutex<Vec<String>>,
        pub prompts: Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        pub(crate) fn new(answers: Vec<String>) -> Self {
            let mut answers = answers;
            answers.reverse();
            Self {
                answers: Mutex::new(answers),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Completion for ScriptedCompletion {
        async fn complete_json(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| PipelineError::AnalyzerUnavailable("script exhausted".into()))
        }
    }

    #[test]
    fn test_parse_valid_verdict() {
        let verdict = parse_verdict(&verdict_json(90, false, "NONE")).unwrap();
        assert_eq!(verdict.accuracy_score, 90);
        assert!(!verdict.is_fabricated);
        assert_eq!(verdict.legal_risk_assessment, LegalRisk::None);
        assert_eq!(verdict.fact_check_results[0].verdict, ClaimVerdict::True);
        assert_eq!(verdict.publish_recommendation, PublishRecommendation::Publish);
    }

    #[test]
    fn test_markdown_fences_are_rejected() {
        let fenced = format!("```json\n{}\n```", verdict_json(90, false, "NONE"));
        assert!(matches!(
            parse_verdict(&fenced),
            Err(PipelineError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&verdict_json(90, false, "NONE")).unwrap();
        value.as_object_mut().unwrap().remove("is_fabricated");
        assert!(parse_verdict(&value.to_string()).is_err());

        let mut value: serde_json::Value =
            serde_json::from_str(&verdict_json(90, false, "NONE")).unwrap();
        value.as_object_mut().unwrap().remove("legal_risk_assessment");
        assert!(parse_verdict(&value.to_string()).is_err());
    }

    #[test]
    fn test_unknown_key_and_bad_enum_are_rejected() {
        let mut value: serde_json::Value =
            serde_json::from_str(&verdict_json(90, false, "NONE")).unwrap();
        value["confidence_note"] = serde_json::json!("extra");
        assert!(parse_verdict(&value.to_string()).is_err());

        assert!(parse_verdict(&verdict_json(90, false, "SEVERE")).is_err());
        assert!(parse_verdict(&verdict_json(90, false, "low")).is_err());
    }

    #[test]
    fn test_out_of_range_scores_are_rejected() {
        assert!(parse_verdict(&verdict_json(101, false, "NONE")).is_err());

        let mut value: serde_json::Value =
            serde_json::from_str(&verdict_json(90, false, "NONE")).unwrap();
        value["fact_check_results"][0]["confidence"] = serde_json::json!(250);
        assert!(parse_verdict(&value.to_string()).is_err());

        let mut value: serde_json::Value =
            serde_json::from_str(&verdict_json(90, false, "NONE")).unwrap();
        value["accuracy_score"] = serde_json::json!(-5);
        assert!(parse_verdict(&value.to_string()).is_err());
    }

    #[test]
    fn test_schema_names_every_field() {
        let schema = verdict_schema();
        for key in [
            "accuracy_score",
            "verification_status",
            "is_fabricated",
            "fact_check_results",
            "source_credibility",
            "legal_risk_assessment",
            "recommendations",
            "publish_recommendation",
        ] {
            assert!(schema.contains(key), "schema is missing {}", key);
        }
    }

    fn article() -> Article {
        Article {
            id: 1,
            slug: "council-meets-abc123".to_string(),
            title: "Council meets: budget approved".to_string(),
            excerpt: "The council approved the budget.".to_string(),
            content: "<p>The council met on Monday and approved the budget.</p>".to_string(),
            category: crate::types::Category::Politics,
            tags: vec!["council".to_string()],
            author: "Newsroom Staff".to_string(),
            sources: vec!["Reuters".to_string()],
            word_count: 9,
            read_time_minutes: 1,
            image_url: None,
            image_credit: None,
            status: crate::types::ArticleStatus::PendingReview,
            published_at: None,
            verification_score: None,
            verification_status: None,
            rejection_reason: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_analyzer_reasks_after_malformed_answer() {
        let completion = ScriptedCompletion::new(vec![
            "Sure! Here is the JSON you asked for.".to_string(),
            verdict_json(88, false, "LOW"),
        ]);
        let analyzer = FactCheckAnalyzer::new(completion, 2);
        let verdict = analyzer
            .analyze(&article(), &Evidence::none())
            .await
            .unwrap();
        assert_eq!(verdict.accuracy_score, 88);
        assert_eq!(verdict.legal_risk_assessment, LegalRisk::Low);
    }

    #[tokio::test]
    async fn test_analyzer_fails_when_every_answer_is_malformed() {
        let completion = ScriptedCompletion::new(vec!["{}".to_string(), "[]".to_string()]);
        let analyzer = FactCheckAnalyzer::new(completion, 2);
        let err = analyzer
            .analyze(&article(), &Evidence::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_model_is_not_retried_as_malformed() {
        let analyzer = FactCheckAnalyzer::new(ScriptedCompletion::new(Vec::new()), 3);
        let err = analyzer
            .analyze(&article(), &Evidence::none())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::AnalyzerUnavailable(_)));
        assert_eq!(analyzer.completion.prompts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_prompt_carries_article_and_evidence() {
        let completion = ScriptedCompletion::new(vec![verdict_json(90, false, "NONE")]);
        let analyzer = FactCheckAnalyzer::new(completion, 1);
        let evidence = Evidence::from_results(vec![crate::evidence::NewsResult {
            title: "Council passes budget".to_string(),
            source: "Springfield Gazette".to_string(),
            link: "https://gazette.example/budget".to_string(),
            date: Some("2 hours ago".to_string()),
        }]);
        analyzer.analyze(&article(), &evidence).await.unwrap();

        let prompts = analyzer.completion.prompts.lock().unwrap();
        assert!(prompts[0].contains("Council meets: budget approved"));
        assert!(prompts[0].contains("politics"));
        assert!(prompts[0].contains("The council met on Monday"));
        assert!(!prompts[0].contains("<p>"));
        assert!(prompts[0].contains("- Reuters"));
        assert!(prompts[0].contains("Springfield Gazette"));
        assert!(prompts[0].contains("confidence 20/100"));
    }
}

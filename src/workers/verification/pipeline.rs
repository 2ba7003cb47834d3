//! One article's trip through evidence, fact check, decision and commit.
//!
//! Steps run strictly in order; nothing here retries. Cancellation is never
//! checked inside a run, so a started run always ends with both the record and
//! the state update committed, or with neither.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::db::Database;
use crate::decision::{decide, Decision, DecisionInput, DecisionOutcome, Thresholds};
use crate::evidence::{fetch_evidence, Evidence, NewsSearch};
use crate::fact_check::{FactCheckAnalyzer, FactCheckVerdict, PublishRecommendation};
use crate::llm::Completion;
use crate::types::{ArticleStatus, LegalRisk, VerificationStatus};
use crate::{Result, TARGET_PIPELINE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VerifyRequest {
    pub article_id: i64,
    #[serde(default)]
    pub skip_verification: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationSummary {
    pub score: u8,
    pub status: VerificationStatus,
    pub is_fabricated: bool,
    pub legal_risk: LegalRisk,
    pub real_news_confidence: u8,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub decision: Decision,
    /// `None` when verification was skipped.
    pub verification: Option<VerificationSummary>,
    pub article_status: ArticleStatus,
}

/// Whether the analyzer's own recommendation points the same way as the decision.
pub fn recommendation_agrees(recommendation: PublishRecommendation, decision: Decision) -> bool {
    matches!(
        (recommendation, decision),
        (PublishRecommendation::Publish, Decision::Publish)
            | (PublishRecommendation::NeedsRevision, Decision::NeedsReview)
            | (PublishRecommendation::Reject, Decision::Reject)
    )
}

#[derive(Clone)]
pub struct VerificationPipeline {
    db: Database,
    search: Arc<dyn NewsSearch>,
    analyzer: Arc<FactCheckAnalyzer<Arc<dyn Completion>>>,
    thresholds: Thresholds,
}

impl VerificationPipeline {
    pub fn new(
        db: Database,
        search: Arc<dyn NewsSearch>,
        analyzer: FactCheckAnalyzer<Arc<dyn Completion>>,
        thresholds: Thresholds,
    ) -> Self {
        Self {
            db,
            search,
            analyzer: Arc::new(analyzer),
            thresholds,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Runs the pipeline for one article.
    ///
    /// A rejected article is a successful run. Errors are reserved for a missing
    /// article, an unusable analyzer answer, or a failed commit.
    pub async fn run(&self, request: VerifyRequest) -> Result<VerifyResponse> {
        let article = self.db.get_article(request.article_id).await?;
        info!(target: TARGET_PIPELINE, "Verifying article {} ({:?}), status {}", article.id, article.title, article.status);

        if request.skip_verification {
            let article = self.db.publish_without_verification(article.id).await?;
            return Ok(VerifyResponse {
                success: true,
                decision: Decision::Publish,
                verification: None,
                article_status: article.status,
            });
        }

        let evidence = fetch_evidence(self.search.as_ref(), &article.title).await;

        let verdict = match self.analyzer.analyze(&article, &evidence).await {
            Ok(verdict) => verdict,
            Err(e) => {
                error!(target: TARGET_PIPELINE, "Fact check failed for article {}, leaving it untouched: {}", article.id, e);
                return Err(e);
            }
        };

        let outcome = self.decide(&verdict, &evidence);
        info!(target: TARGET_PIPELINE, "Article {}: rule '{}' -> {} ({})", article.id, outcome.rule, outcome.decision, outcome.reasons.join("; "));
        if !recommendation_agrees(verdict.publish_recommendation, outcome.decision) {
            warn!(target: TARGET_PIPELINE, "Article {}: analyzer recommended {} but decision is {}", article.id, verdict.publish_recommendation.as_str(), outcome.decision);
        }

        let record = self
            .db
            .commit_verification(article.id, &verdict, &evidence, &outcome)
            .await?;
        info!(target: TARGET_PIPELINE, "Article {} is now {} (record {})", article.id, outcome.final_status, record.id);

        Ok(VerifyResponse {
            success: true,
            decision: outcome.decision,
            verification: Some(VerificationSummary {
                score: verdict.accuracy_score,
                status: record.verification_status,
                is_fabricated: verdict.is_fabricated,
                legal_risk: verdict.legal_risk_assessment,
                real_news_confidence: evidence.confidence,
                reasons: outcome.reasons,
            }),
            article_status: outcome.final_status,
        })
    }

    fn decide(&self, verdict: &FactCheckVerdict, evidence: &Evidence) -> DecisionOutcome {
        decide(
            &DecisionInput {
                accuracy_score: verdict.accuracy_score,
                is_fabricated: verdict.is_fabricated,
                legal_risk: verdict.legal_risk_assessment,
                evidence_confidence: evidence.confidence,
            },
            &self.thresholds,
        )
    }
}

use async_trait::async_trait;
use std::sync::Arc;

use super::*;
use crate::db::Database;
use crate::decision::{Decision, Thresholds};
use crate::evidence::{NewsResult, NewsSearch};
use crate::fact_check::tests::{verdict_json, ScriptedCompletion};
use crate::fact_check::{FactCheckAnalyzer, PublishRecommendation};
use crate::llm::Completion;
use crate::types::{ArticleStatus, Category, LegalRisk, NewArticle, VerificationStatus};
use crate::{PipelineError, Result};

/// Returns `count` corroborating hits, i.e. `count * 20` confidence.
struct Corroboration(usize);

#[async_trait]
impl NewsSearch for Corroboration {
    async fn search(&self, query: &str) -> Result<Vec<NewsResult>> {
        Ok((0..self.0)
            .map(|i| NewsResult {
                title: format!("{} ({})", query, i),
                source: format!("Outlet {}", i),
                link: format!("https://news.example/{}", i),
                date: Some("2 hours ago".to_string()),
            })
            .collect())
    }
}

struct SearchDown;

#[async_trait]
impl NewsSearch for SearchDown {
    async fn search(&self, _: &str) -> Result<Vec<NewsResult>> {
        Err(PipelineError::Upstream {
            service: "news search",
            message: "timed out".into(),
        })
    }
}

fn draft(title: &str) -> NewArticle {
    NewArticle {
        title: title.to_string(),
        excerpt: "Officials confirmed the figures on Monday.".to_string(),
        content: "<p>Officials confirmed the figures on Monday.</p><p>More to follow.</p>"
            .to_string(),
        category: Category::World,
        tags: vec!["economy".to_string()],
        author: "Newsroom Staff".to_string(),
        sources: vec!["Reuters".to_string(), "AP".to_string()],
        image_url: None,
        image_credit: None,
    }
}

async fn setup(
    search: impl NewsSearch + 'static,
    answers: Vec<String>,
) -> (VerificationPipeline, Arc<ScriptedCompletion>, i64) {
    let db = Database::connect_in_memory().await.unwrap();
    let article_id = db
        .insert_article(&draft("Port Traffic Rebounds: What Shippers Say"))
        .await
        .unwrap();

    let completion = Arc::new(ScriptedCompletion::new(answers));
    let analyzer = FactCheckAnalyzer::new(completion.clone() as Arc<dyn Completion>, 2);
    let pipeline = VerificationPipeline::new(db, Arc::new(search), analyzer, Thresholds::default());
    (pipeline, completion, article_id)
}

fn verify(article_id: i64) -> VerifyRequest {
    VerifyRequest {
        article_id,
        skip_verification: false,
    }
}

#[tokio::test]
async fn test_scenario_a_publishes() {
    let (pipeline, _, id) = setup(Corroboration(3), vec![verdict_json(90, false, "NONE")]).await;

    let response = pipeline.run(verify(id)).await.unwrap();
    assert!(response.success);
    assert_eq!(response.decision, Decision::Publish);
    assert_eq!(response.article_status, ArticleStatus::Published);
    let summary = response.verification.unwrap();
    assert_eq!(summary.score, 90);
    assert_eq!(summary.real_news_confidence, 60);
    assert_eq!(summary.status, VerificationStatus::Verified);

    let article = pipeline.db().get_article(id).await.unwrap();
    assert_eq!(article.status, ArticleStatus::Published);
    assert!(article.published_at.is_some());
    assert_eq!(article.verification_score, Some(90));
}

#[tokio::test]
async fn test_scenario_b_fabrication_overrides_score() {
    let (pipeline, _, id) = setup(Corroboration(4), vec![verdict_json(95, true, "NONE")]).await;

    let response = pipeline.run(verify(id)).await.unwrap();
    assert_eq!(response.decision, Decision::Reject);
    assert_eq!(response.article_status, ArticleStatus::Draft);
    assert!(response.verification.as_ref().unwrap().is_fabricated);

    let article = pipeline.db().get_article(id).await.unwrap();
    assert_eq!(article.status, ArticleStatus::Draft);
    assert!(article.published_at.is_none());
    assert!(article.rejection_reason.is_some());
}

#[tokio::test]
async fn test_scenario_c_held_for_review() {
    // One hit gives 20 confidence, the lowest value that still qualifies for review.
    let (pipeline, _, id) = setup(Corroboration(1), vec![verdict_json(75, false, "LOW")]).await;

    let response = pipeline.run(verify(id)).await.unwrap();
    assert_eq!(response.decision, Decision::NeedsReview);
    assert_eq!(response.article_status, ArticleStatus::Draft);
    assert_eq!(response.verification.unwrap().legal_risk, LegalRisk::Low);

    let queue = pipeline.db().review_queue(10).await.unwrap();
    assert_eq!(queue.iter().map(|a| a.id).collect::<Vec<_>>(), vec![id]);
}

#[tokio::test]
async fn test_scenario_d_rejects_without_corroboration() {
    let (pipeline, _, id) = setup(Corroboration(0), vec![verdict_json(50, false, "NONE")]).await;

    let response = pipeline.run(verify(id)).await.unwrap();
    assert_eq!(response.decision, Decision::Reject);
    assert_eq!(response.verification.unwrap().real_news_confidence, 0);

    let history = pipeline.db().verification_history(id).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].decision, Decision::Reject);
    assert_eq!(history[0].publish_recommendation, PublishRecommendation::Publish);
}

#[tokio::test]
async fn test_search_outage_degrades_to_zero_evidence() {
    let (pipeline, _, id) = setup(SearchDown, vec![verdict_json(95, false, "NONE")]).await;

    let response = pipeline.run(verify(id)).await.unwrap();
    // High accuracy alone never publishes.
    assert_eq!(response.decision, Decision::Reject);
    assert_eq!(response.verification.unwrap().real_news_confidence, 0);
}

#[tokio::test]
async fn test_legal_risk_holds_even_with_strong_scores() {
    let (pipeline, _, id) = setup(Corroboration(5), vec![verdict_json(99, false, "CRITICAL")]).await;

    let response = pipeline.run(verify(id)).await.unwrap();
    assert_eq!(response.decision, Decision::NeedsReview);
    assert_eq!(response.article_status, ArticleStatus::Draft);
}

#[tokio::test]
async fn test_analyzer_failure_leaves_article_untouched() {
    let (pipeline, completion, id) = setup(
        Corroboration(3),
        vec!["not json".to_string(), "```json\n{}\n```".to_string()],
    )
    .await;

    let err = pipeline.run(verify(id)).await.unwrap_err();
    assert!(err.is_analyzer_failure());
    assert_eq!(completion.prompts.lock().unwrap().len(), 2);

    let article = pipeline.db().get_article(id).await.unwrap();
    assert_eq!(article.status, ArticleStatus::PendingReview);
    assert!(article.verification_status.is_none());
    assert!(pipeline.db().verification_history(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_article_is_input_error() {
    let (pipeline, completion, _) = setup(Corroboration(3), vec![]).await;

    let err = pipeline.run(verify(4242)).await.unwrap_err();
    assert!(matches!(err, PipelineError::ArticleNotFound(4242)));
    assert!(completion.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_reverification_demotes_and_keeps_history() {
    let (pipeline, _, id) = setup(
        Corroboration(3),
        vec![verdict_json(90, false, "NONE"), verdict_json(40, false, "NONE")],
    )
    .await;

    assert_eq!(pipeline.run(verify(id)).await.unwrap().decision, Decision::Publish);
    let second = pipeline.run(verify(id)).await.unwrap();
    assert_eq!(second.decision, Decision::Reject);
    assert_eq!(second.article_status, ArticleStatus::Draft);

    let article = pipeline.db().get_article(id).await.unwrap();
    assert!(article.published_at.is_none());
    assert_eq!(article.verification_score, Some(40));
    assert_eq!(pipeline.db().verification_history(id).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_skip_verification_publishes_without_record() {
    let (pipeline, completion, id) = setup(Corroboration(0), vec![]).await;

    let response = pipeline
        .run(VerifyRequest {
            article_id: id,
            skip_verification: true,
        })
        .await
        .unwrap();
    assert_eq!(response.article_status, ArticleStatus::Published);
    assert!(response.verification.is_none());
    assert!(completion.prompts.lock().unwrap().is_empty());
    assert!(pipeline.db().verification_history(id).await.unwrap().is_empty());
}

#[test]
fn test_recommendation_agreement() {
    assert!(recommendation_agrees(PublishRecommendation::Publish, Decision::Publish));
    assert!(recommendation_agrees(PublishRecommendation::NeedsRevision, Decision::NeedsReview));
    assert!(!recommendation_agrees(PublishRecommendation::Publish, Decision::Reject));
}

#[test]
fn test_request_defaults_to_verifying() {
    let request: VerifyRequest = serde_json::from_str(r#"{"article_id": 7}"#).unwrap();
    assert_eq!(request, verify(7));
}

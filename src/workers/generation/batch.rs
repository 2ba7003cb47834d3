//! Bulk generation: topic in, verified (or held, or rejected) article out.
//!
//! Articles are handled one at a time because both guards mutate the shared
//! [`GenerationBatch`]. Cancellation is only observed between articles.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::generator::Generator;
use crate::decision::Decision;
use crate::environment::PipelineConfig;
use crate::guards::{acquire_unique_image, find_duplicate, GenerationBatch, ImageSource};
use crate::workers::common::pause_unless_cancelled;
use crate::workers::verification::{VerificationPipeline, VerifyRequest};
use crate::{Result, WorkerDetail, TARGET_PIPELINE};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub generated: usize,
    pub duplicates: usize,
    pub generation_failures: usize,
    pub storage_failures: usize,
    pub verification_failures: usize,
    pub published: usize,
    pub needs_review: usize,
    pub rejected: usize,
    pub images_attached: usize,
    /// Topics never started because the job was cancelled.
    pub skipped: usize,
    pub cancelled: bool,
}

pub struct BatchJob {
    pub generator: Generator,
    pub images: Arc<dyn ImageSource>,
    pub pipeline: VerificationPipeline,
    pub config: PipelineConfig,
    pub author: String,
    pub worker_detail: WorkerDetail,
}

impl BatchJob {
    /// Runs every topic through generation, both guards and the pipeline.
    ///
    /// Only a failure to load the recent titles aborts the job; every other
    /// failure is counted against its topic and the job moves on.
    pub async fn run(
        &self,
        topics: &[String],
        mut cancel: watch::Receiver<bool>,
    ) -> Result<BatchReport> {
        let wd = &self.worker_detail;
        let window = self.config.recent_title_window;
        let recent = self.pipeline.db().recent_titles(window).await?;
        let mut batch = GenerationBatch::seeded(window, recent);
        let mut report = BatchReport::default();

        info!(target: TARGET_PIPELINE, "[{} {} {}]: starting batch of {} topic(s), {} recent title(s) loaded.", wd.name, wd.id, wd.model, topics.len(), batch.title_count());

        for (index, topic) in topics.iter().enumerate() {
            if *cancel.borrow() {
                report.cancelled = true;
                report.skipped = topics.len() - index;
                break;
            }

            self.process_topic(topic, &mut batch, &mut report).await;

            if index + 1 < topics.len()
                && pause_unless_cancelled(self.config.article_delay, &mut cancel).await
            {
                report.cancelled = true;
                report.skipped = topics.len() - index - 1;
                break;
            }
        }

        if report.cancelled {
            warn!(target: TARGET_PIPELINE, "[{} {} {}]: batch cancelled, {} topic(s) skipped.", wd.name, wd.id, wd.model, report.skipped);
        }
        info!(target: TARGET_PIPELINE, "[{} {} {}]: batch finished: {:?}", wd.name, wd.id, wd.model, report);
        Ok(report)
    }

    async fn process_topic(&self, topic: &str, batch: &mut GenerationBatch, report: &mut BatchReport) {
        let wd = &self.worker_detail;

        let candidate = match self.generator.generate(topic).await {
            Ok(candidate) => candidate,
            Err(e) => {
                error!(target: TARGET_PIPELINE, "[{} {} {}]: generation failed for '{}': {}", wd.name, wd.id, wd.model, topic, e);
                report.generation_failures += 1;
                return;
            }
        };
        report.generated += 1;

        if let Some((existing, ratio)) = find_duplicate(
            &candidate.title,
            batch.recent_titles(),
            self.config.duplicate_threshold,
        ) {
            info!(target: TARGET_PIPELINE, "[{} {} {}]: discarding {:?}, {:.2} overlap with {:?}.", wd.name, wd.id, wd.model, candidate.title, ratio, existing);
            report.duplicates += 1;
            return;
        }

        let image = acquire_unique_image(
            self.images.as_ref(),
            topic,
            candidate.category,
            batch,
            &self.config.image_retry,
        )
        .await;
        let claimed_url = image.as_ref().map(|image| image.url.clone());
        let (image_url, image_credit) = match image {
            Some(image) => (Some(image.url), Some(image.credit)),
            None => (None, None),
        };

        let title = candidate.title.clone();
        let article = candidate.into_new_article(&self.author, image_url, image_credit);
        let article_id = match self.pipeline.db().insert_article(&article).await {
            Ok(id) => id,
            Err(e) => {
                error!(target: TARGET_PIPELINE, "[{} {} {}]: could not store {:?}: {}", wd.name, wd.id, wd.model, title, e);
                report.storage_failures += 1;
                // The image is free for the next article.
                if let Some(url) = claimed_url {
                    batch.release_image(&url);
                }
                return;
            }
        };
        if claimed_url.is_some() {
            report.images_attached += 1;
        }
        batch.remember_title(title);

        let request = VerifyRequest {
            article_id,
            skip_verification: false,
        };
        match self.pipeline.run(request).await {
            Ok(response) => match response.decision {
                Decision::Publish => report.published += 1,
                Decision::NeedsReview => report.needs_review += 1,
                Decision::Reject => report.rejected += 1,
            },
            Err(e) => {
                error!(target: TARGET_PIPELINE, "[{} {} {}]: verification of article {} failed: {}", wd.name, wd.id, wd.model, article_id, e);
                report.verification_failures += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::decision::Thresholds;
    use crate::evidence::{NewsResult, NewsSearch};
    use crate::fact_check::tests::{verdict_json, ScriptedCompletion};
    use crate::fact_check::FactCheckAnalyzer;
    use crate::guards::{RetryPolicy, SourcedImage};
    use crate::llm::Completion;
    use crate::types::{ArticleStatus, Category};
    use crate::workers::common::worker_detail;
    use crate::workers::generation::generator::tests::candidate_json;
    use async_trait::async_trait;
    use std::time::Duration;

    struct ThreeHits;

    #[async_trait]
    impl NewsSearch for ThreeHits {
        async fn search(&self, query: &str) -> Result<Vec<NewsResult>> {
            Ok((0..3)
                .map(|i| NewsResult {
                    title: query.to_string(),
                    source: format!("Outlet {}", i),
                    link: format!("https://news.example/{}", i),
                    date: None,
                })
                .collect())
        }
    }

    /// Always offers the same photo.
    struct OnePhoto;

    #[async_trait]
    impl ImageSource for OnePhoto {
        async fn find_image(&self, _: &str, _: Category) -> Result<Option<SourcedImage>> {
            Ok(Some(SourcedImage {
                url: "https://images.example/harbor.jpg".to_string(),
                credit: "Photo by Lee on Unsplash".to_string(),
            }))
        }
    }

    async fn job(generated: Vec<String>, verdicts: Vec<String>) -> BatchJob {
        let db = Database::connect_in_memory().await.unwrap();
        let analyzer = FactCheckAnalyzer::new(
            Arc::new(ScriptedCompletion::new(verdicts)) as Arc<dyn Completion>,
            1,
        );
        let mut config = PipelineConfig::default();
        config.article_delay = Duration::ZERO;
        config.image_retry = RetryPolicy::immediate(5);

        BatchJob {
            generator: Generator::new(Arc::new(ScriptedCompletion::new(generated))),
            images: Arc::new(OnePhoto),
            pipeline: VerificationPipeline::new(db, Arc::new(ThreeHits), analyzer, Thresholds::default()),
            config,
            author: "Newsroom Staff".to_string(),
            worker_detail: worker_detail("batch", 0, "scripted"),
        }
    }

    fn topics(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("topic {}", i)).collect()
    }

    #[tokio::test]
    async fn test_batch_counts_every_outcome() {
        let job = job(
            vec![
                candidate_json("Local Election Results Announced in Springfield"),
                candidate_json("Election Results Announced for Springfield Local Vote"),
                "not an article".to_string(),
                candidate_json("Harbor Authority Opens New Container Terminal"),
            ],
            vec![verdict_json(90, false, "NONE"), verdict_json(50, false, "NONE")],
        )
        .await;
        let (_tx, rx) = watch::channel(false);

        let report = job.run(&topics(4), rx).await.unwrap();
        assert_eq!(report.generated, 3);
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.generation_failures, 1);
        assert_eq!(report.published, 1);
        assert_eq!(report.rejected, 1);
        // The only photo on offer goes to the first stored article.
        assert_eq!(report.images_attached, 1);
        assert!(!report.cancelled);

        let titles = job.pipeline.db().recent_titles(10).await.unwrap();
        assert_eq!(titles.len(), 2);
        let first = job.pipeline.db().get_article(1).await.unwrap();
        assert_eq!(first.status, ArticleStatus::Published);
        assert!(first.image_url.is_some());
        let second = job.pipeline.db().get_article(2).await.unwrap();
        assert!(second.image_url.is_none());
    }

    #[tokio::test]
    async fn test_seeded_titles_block_duplicates() {
        let job = job(
            vec![candidate_json("Harbor Authority Opens Container Terminal")],
            vec![],
        )
        .await;
        let existing = candidate_json("Harbor Authority Opens Container Terminal");
        let existing = crate::workers::generation::parse_candidate(&existing)
            .unwrap()
            .into_new_article("Desk", None, None);
        job.pipeline.db().insert_article(&existing).await.unwrap();

        let (_tx, rx) = watch::channel(false);
        let report = job.run(&topics(1), rx).await.unwrap();
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.published, 0);
    }

    #[tokio::test]
    async fn test_cancelled_batch_starts_nothing() {
        let job = job(vec![candidate_json("Never Written")], vec![]).await;
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = job.run(&topics(3), rx).await.unwrap();
        assert!(report.cancelled);
        assert_eq!(report.skipped, 3);
        assert_eq!(report.generated, 0);
        assert!(job.pipeline.db().recent_titles(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_releases_image() {
        let job = job(
            vec![
                candidate_json("Port Strike Halts Shipping"),
                candidate_json("Wheat Prices Climb on Drought Fears"),
            ],
            vec![verdict_json(90, false, "NONE")],
        )
        .await;
        sqlx::query(
            "CREATE TRIGGER refuse_port_strike BEFORE INSERT ON articles
             WHEN NEW.title = 'Port Strike Halts Shipping'
             BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
        )
        .execute(job.pipeline.db().pool())
        .await
        .unwrap();

        let mut batch = GenerationBatch::new(10);
        let mut report = BatchReport::default();
        job.process_topic("port strike", &mut batch, &mut report).await;
        assert_eq!(report.storage_failures, 1);
        assert_eq!(report.images_attached, 0);
        assert!(batch.claimed_images().is_empty());
        assert_eq!(batch.title_count(), 0);

        // The same photo is still available to the next stored article.
        job.process_topic("wheat prices", &mut batch, &mut report).await;
        assert_eq!(report.images_attached, 1);
        assert_eq!(report.published, 1);
        assert!(batch.is_image_claimed("https://images.example/harbor.jpg"));
        let stored = job.pipeline.db().get_article(1).await.unwrap();
        assert_eq!(stored.image_url.as_deref(), Some("https://images.example/harbor.jpg"));
    }

    #[tokio::test]
    async fn test_verification_failure_does_not_stop_batch() {
        let job = job(
            vec![
                candidate_json("Rail Strike Ends After Talks"),
                candidate_json("Wheat Prices Climb on Drought Fears"),
            ],
            vec!["{}".to_string(), verdict_json(75, false, "LOW")],
        )
        .await;
        let (_tx, rx) = watch::channel(false);

        let report = job.run(&topics(2), rx).await.unwrap();
        assert_eq!(report.verification_failures, 1);
        assert_eq!(report.needs_review, 1);
        let first = job.pipeline.db().get_article(1).await.unwrap();
        assert_eq!(first.status, ArticleStatus::PendingReview);
    }
}

//! Start-up wiring shared by the server and the operator binaries.

pub mod api;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::db::Database;
use crate::environment::PipelineConfig;
use crate::evidence::SerpApiNewsSearch;
use crate::fact_check::FactCheckAnalyzer;
use crate::guards::UnsplashImageSource;
use crate::llm::{llm_client_from_env, Completion, LlmCompletion};
use crate::workers::common::worker_detail;
use crate::workers::generation::{BatchJob, Generator};
use crate::workers::verification::VerificationPipeline;
use crate::{LLMParams, TARGET_PIPELINE};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .gzip(true)
        .build()
        .context("Failed to build HTTP client")
}

fn model_from_env() -> String {
    std::env::var("LLM_MODEL").unwrap_or_else(|_| "llama3.1".to_string())
}

/// Completion client for one role, at that role's temperature.
fn completion(role: &str, temperature: f32, config: &PipelineConfig) -> Result<Arc<dyn Completion>> {
    let model = model_from_env();
    let params = LLMParams {
        llm_client: llm_client_from_env()?,
        model: model.clone(),
        temperature,
    };
    Ok(Arc::new(LlmCompletion::new(
        params,
        worker_detail(role, 0, &model),
        config.llm_timeout,
    )))
}

/// Verification pipeline over the configured database, news search and model.
pub async fn pipeline_from_env(config: &PipelineConfig) -> Result<VerificationPipeline> {
    let db = Database::instance().await.clone();
    let search = SerpApiNewsSearch::from_env(http_client()?)?;
    let analyzer = FactCheckAnalyzer::new(
        completion("fact checker", config.fact_check_temperature, config)?,
        config.fact_check_max_attempts,
    );
    info!(target: TARGET_PIPELINE, "Verification pipeline ready, thresholds {:?}", config.thresholds);
    Ok(VerificationPipeline::new(
        db,
        Arc::new(search),
        analyzer,
        config.thresholds,
    ))
}

/// Bulk generation job wired to the same pipeline plus generator and image source.
pub async fn batch_job_from_env(config: PipelineConfig, author: &str) -> Result<BatchJob> {
    let pipeline = pipeline_from_env(&config).await?;
    let generator = Generator::new(completion("generator", config.generation_temperature, &config)?);
    let images = UnsplashImageSource::from_env(http_client()?)?;
    Ok(BatchJob {
        generator,
        images: Arc::new(images),
        pipeline,
        author: author.to_string(),
        worker_detail: worker_detail("batch", 0, &model_from_env()),
        config,
    })
}

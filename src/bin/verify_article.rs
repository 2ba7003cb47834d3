use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use newsroom::app;
use newsroom::environment::PipelineConfig;
use newsroom::logging::configure_logging;
use newsroom::workers::verification::VerifyRequest;
use newsroom::TARGET_PIPELINE;

/// Runs the verification pipeline for one stored article and prints the result as JSON.
///
/// Usage:
///    cargo run --bin verify_article -- --article-id 42
///    cargo run --bin verify_article -- --article-id 42 --skip-verification
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Id of the article to verify
    #[arg(short, long)]
    article_id: i64,

    /// Publish directly without fact-checking
    #[arg(long, default_value_t = false)]
    skip_verification: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let cli = Cli::parse();

    let config = PipelineConfig::from_env();
    let pipeline = app::pipeline_from_env(&config).await?;

    let response = pipeline
        .run(VerifyRequest {
            article_id: cli.article_id,
            skip_verification: cli.skip_verification,
        })
        .await
        .with_context(|| format!("Verification of article {} failed", cli.article_id))?;

    info!(target: TARGET_PIPELINE, "Article {} -> {}", cli.article_id, response.article_status);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

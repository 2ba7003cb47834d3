use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::signal;
use tokio::sync::watch;
use tokio::time::Duration;
use tracing::{error, info};

use newsroom::app;
use newsroom::environment::{get_env_var_as_vec, PipelineConfig};
use newsroom::logging::configure_logging;
use newsroom::TARGET_PIPELINE;

/// Generates, screens and verifies one article per trending topic.
///
/// Topics come from `--topic` (repeatable) and `--topics-file` (one per line).
/// If neither gives any, the `TOPICS` environment variable (semicolon
/// separated) is used.
///
/// Usage:
///    cargo run --bin generate_batch -- --topic "port strike" --topic "wheat prices"
///    cargo run --bin generate_batch -- --topics-file topics.txt --delay-secs 10
///
/// Ctrl-C stops the job after the article in progress.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Trending topic to write about
    #[arg(short, long = "topic")]
    topics: Vec<String>,

    /// File with one topic per line
    #[arg(long)]
    topics_file: Option<PathBuf>,

    /// Seconds to wait between articles (overrides ARTICLE_DELAY_SECS)
    #[arg(long)]
    delay_secs: Option<u64>,

    /// Byline stored on generated articles
    #[arg(long, default_value = "Newsroom Staff")]
    author: String,
}

fn collect_topics(cli: &Cli) -> Result<Vec<String>> {
    let mut topics: Vec<String> = cli
        .topics
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    if let Some(path) = &cli.topics_file {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        topics.extend(
            contents
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty() && !l.starts_with('#'))
                .map(String::from),
        );
    }

    if topics.is_empty() {
        topics = get_env_var_as_vec("TOPICS", ';');
    }
    if topics.is_empty() {
        bail!("No topics given: use --topic, --topics-file or TOPICS");
    }
    Ok(topics)
}

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();
    let cli = Cli::parse();
    let topics = collect_topics(&cli)?;

    let mut config = PipelineConfig::from_env();
    if let Some(secs) = cli.delay_secs {
        config.article_delay = Duration::from_secs(secs);
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if signal::ctrl_c().await.is_err() {
            error!(target: TARGET_PIPELINE, "Failed to listen for ctrl-c");
            return;
        }
        info!(target: TARGET_PIPELINE, "Ctrl-C received, stopping after the current article");
        let _ = cancel_tx.send(true);
    });

    let job = app::batch_job_from_env(config, &cli.author).await?;
    let report = job.run(&topics, cancel_rx).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

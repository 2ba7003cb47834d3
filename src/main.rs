use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use newsroom::app::{self, api};
use newsroom::environment::PipelineConfig;
use newsroom::logging::configure_logging;
use newsroom::TARGET_WEB_REQUEST;

#[tokio::main]
async fn main() -> Result<()> {
    configure_logging();

    let config = PipelineConfig::from_env();
    let pipeline = app::pipeline_from_env(&config)
        .await
        .context("Failed to set up the verification pipeline")?;

    info!(target: TARGET_WEB_REQUEST, "Starting newsroom API");
    tokio::select! {
        result = api::app_api_loop(pipeline) => {
            if let Err(e) = &result {
                error!(target: TARGET_WEB_REQUEST, "API server stopped: {}", e);
            }
            result
        }
        _ = signal::ctrl_c() => {
            info!(target: TARGET_WEB_REQUEST, "Shutting down");
            Ok(())
        }
    }
}

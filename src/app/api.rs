use anyhow::Result;
use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::types::Article;
use crate::workers::verification::{VerificationPipeline, VerifyRequest, VerifyResponse};
use crate::{PipelineError, TARGET_WEB_REQUEST};

const DEFAULT_REVIEW_QUEUE_LIMIT: usize = 50;

/// Error body returned by every endpoint.
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    /// `draft:pending_review:published:archived:records`
    counts: String,
}

#[derive(Deserialize)]
struct ReviewQueueParams {
    limit: Option<usize>,
}

pub struct ApiError(PipelineError);

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        ApiError(err)
    }
}

/// HTTP status for a failed run: caller mistakes, analyzer trouble and our own faults stay distinct.
pub fn status_for(err: &PipelineError) -> StatusCode {
    if err.is_input_error() {
        StatusCode::NOT_FOUND
    } else if err.is_analyzer_failure() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        if status.is_server_error() {
            error!(target: TARGET_WEB_REQUEST, "Request failed ({}): {}", status, self.0);
        } else {
            warn!(target: TARGET_WEB_REQUEST, "Request rejected ({}): {}", status, self.0);
        }
        let body = ErrorResponse {
            success: false,
            error: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(pipeline: VerificationPipeline) -> Router {
    Router::new()
        .route("/status", post(status_check))
        .route("/verify-article", post(verify_article))
        .route("/review-queue", get(review_queue))
        .with_state(pipeline)
}

/// Runs the API server until the process is stopped.
pub async fn app_api_loop(pipeline: VerificationPipeline) -> Result<()> {
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);
    let addr = format!("0.0.0.0:{}", port);

    let listener = TcpListener::bind(&addr).await?;
    info!(target: TARGET_WEB_REQUEST, "Server running on http://{}", addr);

    axum::serve(listener, router(pipeline).into_make_service()).await?;
    Ok(())
}

async fn verify_article(
    State(pipeline): State<VerificationPipeline>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    info!(target: TARGET_WEB_REQUEST, "Verification requested for article {} (skip: {})", request.article_id, request.skip_verification);
    Ok(Json(pipeline.run(request).await?))
}

async fn review_queue(
    State(pipeline): State<VerificationPipeline>,
    Query(params): Query<ReviewQueueParams>,
) -> Result<Json<Vec<Article>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_REVIEW_QUEUE_LIMIT);
    Ok(Json(pipeline.db().review_queue(limit).await?))
}

async fn status_check(
    State(pipeline): State<VerificationPipeline>,
) -> Result<Json<StatusResponse>, ApiError> {
    let counts = pipeline
        .db()
        .collect_stats()
        .await
        .map_err(PipelineError::from)?;
    Ok(Json(StatusResponse {
        status: "OK",
        counts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_statuses() {
        assert_eq!(status_for(&PipelineError::ArticleNotFound(1)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&PipelineError::MalformedResponse("fenced".into())),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status_for(&PipelineError::AnalyzerUnavailable("timeout".into())),
            StatusCode::BAD_GATEWAY
        );
        let consistency = PipelineError::Consistency {
            article_id: 1,
            source: Box::new(PipelineError::ArticleNotFound(1)),
        };
        assert_eq!(status_for(&consistency), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

use thiserror::Error;

/// Failures a pipeline run can end with.
///
/// Content outcomes (a rejected article) are never errors; everything here is
/// either bad input, an unusable upstream answer, or a fault in the system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("article {0} not found")]
    ArticleNotFound(i64),

    #[error("{service} unavailable: {message}")]
    Upstream { service: &'static str, message: String },

    #[error("malformed analyzer response: {0}")]
    MalformedResponse(String),

    #[error("analyzer unavailable: {0}")]
    AnalyzerUnavailable(String),

    #[error("article {article_id} verification recorded but state update failed: {source}")]
    Consistency {
        article_id: i64,
        #[source]
        source: Box<PipelineError>,
    },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Errors caused by the request itself rather than by the system.
    pub fn is_input_error(&self) -> bool {
        matches!(self, PipelineError::ArticleNotFound(_))
    }

    /// Errors from the fact-check step; the article is left untouched and
    /// needs a retry or a human.
    pub fn is_analyzer_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::MalformedResponse(_) | PipelineError::AnalyzerUnavailable(_)
        )
    }

    /// Faults in our own storage, distinct from any content decision.
    pub fn is_system_fault(&self) -> bool {
        matches!(
            self,
            PipelineError::Consistency { .. }
                | PipelineError::Database(_)
                | PipelineError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

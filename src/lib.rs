pub mod app;
pub mod db;
pub mod decision;
pub mod environment;
pub mod error;
pub mod evidence;
pub mod fact_check;
pub mod guards;
pub mod llm;
pub mod logging;
pub mod prompt;
pub mod types;
pub mod util;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_util;

use async_openai::{config::OpenAIConfig, Client as OpenAIClient};
use ollama_rs::Ollama;

pub use error::{PipelineError, Result};

pub const TARGET_WEB_REQUEST: &str = "web_request";
pub const TARGET_LLM_REQUEST: &str = "llm_request";
pub const TARGET_DB: &str = "db_query";
pub const TARGET_PIPELINE: &str = "pipeline";

#[derive(Clone, Debug)]
pub enum LLMClient {
    Ollama(Ollama),
    OpenAI(OpenAIClient<OpenAIConfig>),
}

#[derive(Clone, Debug)]
pub struct LLMParams {
    pub llm_client: LLMClient,
    pub model: String,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct WorkerDetail {
    pub name: String,
    pub id: i16,
    pub model: String,
}

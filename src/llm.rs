use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs, ResponseFormat,
};
use async_trait::async_trait;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::options::GenerationOptions;
use ollama_rs::generation::parameters::FormatType;
use ollama_rs::Ollama;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::guards::Backoff;
use crate::{LLMClient, LLMParams, PipelineError, Result, WorkerDetail, TARGET_LLM_REQUEST};

/// A language model that answers a prompt with a JSON document.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete_json(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
impl<T: Completion + ?Sized> Completion for Arc<T> {
    async fn complete_json(&self, prompt: &str) -> Result<String> {
        (**self).complete_json(prompt).await
    }
}

/// [`Completion`] backed by Ollama or OpenAI, with timeout and transport retries.
pub struct LlmCompletion {
    pub params: LLMParams,
    pub worker_detail: WorkerDetail,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub backoff: Backoff,
}

impl LlmCompletion {
    pub fn new(params: LLMParams, worker_detail: WorkerDetail, request_timeout: Duration) -> Self {
        Self {
            params,
            worker_detail,
            request_timeout,
            max_retries: 3,
            backoff: Backoff::Exponential {
                initial: Duration::from_secs(2),
                max: Duration::from_secs(30),
            },
        }
    }
}

#[async_trait]
impl Completion for LlmCompletion {
    async fn complete_json(&self, prompt: &str) -> Result<String> {
        generate_json_response(
            prompt,
            &self.params,
            &self.worker_detail,
            self.request_timeout,
            self.max_retries,
            self.backoff,
        )
        .await
    }
}

async fn request_once(prompt: &str, params: &LLMParams) -> std::result::Result<String, String> {
    match &params.llm_client {
        LLMClient::Ollama(ollama) => {
            let request = GenerationRequest::new(params.model.clone(), prompt.to_string())
                .options(GenerationOptions::default().temperature(params.temperature))
                .format(FormatType::Json);
            ollama
                .generate(request)
                .await
                .map(|r| r.response)
                .map_err(|e| e.to_string())
        }
        LLMClient::OpenAI(client) => {
            let message: ChatCompletionRequestMessage =
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()
                    .map_err(|e| e.to_string())?
                    .into();
            let request = CreateChatCompletionRequestArgs::default()
                .model(params.model.as_str())
                .messages(vec![message])
                .temperature(params.temperature)
                .response_format(ResponseFormat::JsonObject)
                .build()
                .map_err(|e| e.to_string())?;
            let response = client.chat().create(request).await.map_err(|e| e.to_string())?;
            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| "response contained no message content".to_string())
        }
    }
}

/// Sends `prompt` to the configured model, asking for JSON output.
///
/// Transport failures and timeouts are retried; what the model says is not
/// inspected here.
pub async fn generate_json_response(
    prompt: &str,
    params: &LLMParams,
    worker_detail: &WorkerDetail,
    request_timeout: Duration,
    max_retries: u32,
    backoff: Backoff,
) -> Result<String> {
    let mut last_error = String::from("no attempt made");

    debug!(target: TARGET_LLM_REQUEST, "[{} {} {}]: sending prompt ({} chars).", worker_detail.name, worker_detail.id, worker_detail.model, prompt.len());

    for attempt in 1..=max_retries.max(1) {
        match timeout(request_timeout, request_once(prompt, params)).await {
            Ok(Ok(response)) if !response.trim().is_empty() => {
                debug!(target: TARGET_LLM_REQUEST, "[{} {} {}]: response received: {}", worker_detail.name, worker_detail.id, worker_detail.model, response);
                return Ok(response);
            }
            Ok(Ok(_)) => {
                warn!(target: TARGET_LLM_REQUEST, "[{} {} {}]: empty response (attempt {}/{}).", worker_detail.name, worker_detail.id, worker_detail.model, attempt, max_retries);
                last_error = "empty response".to_string();
            }
            Ok(Err(e)) => {
                warn!(target: TARGET_LLM_REQUEST, "[{} {} {}]: error generating response (attempt {}/{}): {}", worker_detail.name, worker_detail.id, worker_detail.model, attempt, max_retries, e);
                last_error = e;
            }
            Err(_) => {
                warn!(target: TARGET_LLM_REQUEST, "[{} {} {}]: request timed out after {:?} (attempt {}/{}).", worker_detail.name, worker_detail.id, worker_detail.model, request_timeout, attempt, max_retries);
                last_error = format!("timed out after {:?}", request_timeout);
            }
        }

        if attempt < max_retries {
            let delay = backoff.delay(attempt);
            info!(target: TARGET_LLM_REQUEST, "[{} {} {}]: backing off for {:?} before retry.", worker_detail.name, worker_detail.id, worker_detail.model, delay);
            sleep(delay).await;
        }
    }

    error!(target: TARGET_LLM_REQUEST, "[{} {} {}]: no response after {} attempts: {}", worker_detail.name, worker_detail.id, worker_detail.model, max_retries, last_error);
    Err(PipelineError::AnalyzerUnavailable(last_error))
}

/// Builds the client selected by `LLM_PROVIDER` (`ollama` by default).
pub fn llm_client_from_env() -> Result<LLMClient> {
    let provider = std::env::var("LLM_PROVIDER").unwrap_or_else(|_| "ollama".to_string());
    match provider.to_lowercase().as_str() {
        "ollama" => {
            let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| "http://localhost".to_string());
            let port: u16 = std::env::var("OLLAMA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(11434);
            info!(target: TARGET_LLM_REQUEST, "Using Ollama at {}:{}", host, port);
            Ok(LLMClient::Ollama(Ollama::new(host, port)))
        }
        "openai" => {
            info!(target: TARGET_LLM_REQUEST, "Using OpenAI API");
            Ok(LLMClient::OpenAI(async_openai::Client::new()))
        }
        other => Err(PipelineError::Config(format!(
            "unsupported LLM_PROVIDER '{}'",
            other
        ))),
    }
}

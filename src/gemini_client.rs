use async_trait::async_trait;
use failsafe::futures::CircuitBreaker;
use rand::Rng;
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::circuit_breaker::{create_model_circuit_breaker, ModelCircuitBreaker};
use crate::errors::AppError;

pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// One-shot text completion service.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` and returns the model's text answer, untouched.
    ///
    /// Fails with [`AppError::ModelUnavailable`] or [`AppError::Timeout`].
    async fn generate(&self, prompt: &str) -> Result<String, AppError>;
}

/// Client for the Gemini `generateContent` endpoint.
///
/// Each attempt is bounded by a timeout and runs through a shared circuit breaker.
/// Transport errors, 429 and 5xx responses are retried with exponential backoff plus
/// jitter; timeouts and other responses are not.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: Url,
    model: String,
    timeout: Duration,
    max_retries: u32,
    retry_base_delay: Duration,
    breaker: ModelCircuitBreaker,
}

impl GeminiClient {
    /// Creates a new `GeminiClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - API root, e.g. `https://generativelanguage.googleapis.com`.
    /// * `api_key` - Gemini API key, sent as the `key` query parameter.
    /// * `model` - Model name, e.g. `gemini-1.5-flash`.
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, AppError> {
        let endpoint = Url::parse_with_params(
            &format!(
                "{}/v1beta/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            &[("key", api_key)],
        )
        .map_err(|e| AppError::InternalError(format!("Invalid Gemini base URL: {}", e)))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Gemini client: {}", e))
            })?;

        Ok(Self {
            client,
            endpoint,
            model: model.to_string(),
            timeout: DEFAULT_MODEL_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            breaker: create_model_circuit_breaker(),
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Delay before retry `attempt` (1-based): base * 2^(attempt-1) plus up to half a base
    /// of random jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.retry_base_delay.as_millis() as u64;
        let exponential = base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
        let jitter = if base_ms > 1 {
            rand::thread_rng().gen_range(0..=base_ms / 2)
        } else {
            0
        };
        Duration::from_millis(exponential + jitter)
    }

    async fn attempt(&self, request: &GenerateContentRequest<'_>) -> Result<String, AttemptError> {
        let bounded = async {
            match tokio::time::timeout(self.timeout, self.send(request)).await {
                Ok(result) => result,
                Err(_) => Err(AttemptError::fatal(AppError::Timeout(self.timeout))),
            }
        };

        match self.breaker.call(bounded).await {
            Ok(text) => Ok(text),
            Err(failsafe::Error::Inner(e)) => Err(e),
            Err(failsafe::Error::Rejected) => Err(AttemptError::fatal(
                AppError::ModelUnavailable("language model circuit is open".to_string()),
            )),
        }
    }

    async fn send(&self, request: &GenerateContentRequest<'_>) -> Result<String, AttemptError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                AttemptError::retryable(AppError::ModelUnavailable(format!(
                    "Gemini request failed: {}",
                    e.without_url()
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            let error =
                AppError::ModelUnavailable(format!("Gemini returned {}: {}", status, error_text));
            return Err(if is_retryable_status(status) {
                AttemptError::retryable(error)
            } else {
                AttemptError::fatal(error)
            });
        }

        let body: GenerateContentResponse = response.json().await.map_err(|e| {
            AttemptError::fatal(AppError::ModelUnavailable(format!(
                "Failed to read Gemini response: {}",
                e.without_url()
            )))
        })?;

        body.first_text().ok_or_else(|| {
            AttemptError::fatal(AppError::ModelUnavailable(
                "Gemini returned no candidate text".to_string(),
            ))
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, AppError> {
        let request = GenerateContentRequest::from_prompt(prompt);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            tracing::debug!("Calling Gemini {} (attempt {})", self.model, attempt);

            match self.attempt(&request).await {
                Ok(text) => {
                    tracing::debug!("Gemini answered with {} chars", text.len());
                    return Ok(text);
                }
                Err(failure) if failure.retryable && attempt <= self.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        "Gemini attempt {} failed: {}. Retrying in {:?}",
                        attempt,
                        failure.error,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

/// Failure of a single attempt, tagged with whether another attempt may help.
struct AttemptError {
    error: AppError,
    retryable: bool,
}

impl AttemptError {
    fn retryable(error: AppError) -> Self {
        Self {
            error,
            retryable: true,
        }
    }

    fn fatal(error: AppError) -> Self {
        Self {
            error,
            retryable: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

impl<'a> GenerateContentRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    fn first_text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

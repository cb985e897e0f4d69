//! Completion client abstraction and the Ollama HTTP implementation.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use ethicsgen_shared::{DecodingConfig, EthicsGenError, OllamaConfig, Result};

use crate::template::RenderedPrompt;

/// User-Agent string for model requests.
const USER_AGENT: &str = concat!("Ethicsgen/", env!("CARGO_PKG_VERSION"));

/// A single non-streaming completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, rendered: RenderedPrompt, decoding: &DecodingConfig) -> Self {
        Self {
            model: model.into(),
            system: rendered.system,
            prompt: rendered.prompt,
            temperature: decoding.temperature,
            top_p: decoding.top_p,
            max_tokens: decoding.max_tokens,
        }
    }
}

/// Anything that can turn a prompt into completion text.
///
/// Implemented by [`OllamaClient`] and by scripted clients in tests.
pub trait CompletionClient: Send + Sync {
    fn complete(&self, request: &CompletionRequest) -> impl Future<Output = Result<String>> + Send;
}

impl<C: CompletionClient> CompletionClient for &C {
    fn complete(&self, request: &CompletionRequest) -> impl Future<Output = Result<String>> + Send {
        (**self).complete(request)
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

// ---------------------------------------------------------------------------
// OllamaClient
// ---------------------------------------------------------------------------

/// Client for a local Ollama server (`/api/generate`, `/api/tags`).
#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: Client,
}

impl OllamaClient {
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EthicsGenError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            host: config.host.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Confirm the server answers and return the installed model names.
    ///
    /// Warns (but does not fail) when `model` is not among them; Ollama
    /// accepts names without a `:tag` suffix that the listing spells out.
    #[instrument(skip(self), fields(host = %self.host))]
    pub async fn health_check(&self, model: &str) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.host);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EthicsGenError::Network(format!("model server unreachable at {url}: {e}")))?;

        if !response.status().is_success() {
            return Err(EthicsGenError::Network(format!(
                "{url}: HTTP {}",
                response.status().as_u16()
            )));
        }

        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|e| EthicsGenError::parse(format!("{url}: {e}")))?;
        let names: Vec<String> = tags.models.into_iter().map(|m| m.name).collect();

        let known = names
            .iter()
            .any(|n| n == model || n.split(':').next() == Some(model));
        if !known {
            warn!(model, available = ?names, "model not found on server");
        }

        Ok(names)
    }
}

impl CompletionClient for OllamaClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/api/generate", self.host);
        let body = GenerateBody {
            model: &request.model,
            system: &request.system,
            prompt: &request.prompt,
            stream: false,
            options: GenerateOptions {
                temperature: request.temperature,
                top_p: request.top_p,
                num_predict: request.max_tokens,
            },
        };

        debug!(model = %request.model, prompt_len = request.prompt.len(), "sending completion");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EthicsGenError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        let parsed: std::result::Result<GenerateResponse, _> = response.json().await;

        if !status.is_success() {
            let detail = parsed.ok().and_then(|r| r.error).unwrap_or_default();
            return Err(EthicsGenError::Generation(format!(
                "HTTP {}: {detail}",
                status.as_u16()
            )));
        }

        let parsed =
            parsed.map_err(|e| EthicsGenError::Generation(format!("unreadable response: {e}")))?;
        if let Some(error) = parsed.error {
            return Err(EthicsGenError::Generation(error));
        }
        parsed
            .response
            .ok_or_else(|| EthicsGenError::Generation("response field missing".into()))
    }
}

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ChatMessage;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const ANTHROPIC_MAX_TOKENS: u32 = 1024;

/// Classified provider failures, in match precedence order. Resolution
/// failures never reach the network; everything else is classified at the
/// dispatch boundary.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("unknown model '{0}'")]
    UnknownModel(String),
    #[error("cannot connect to model provider: {0}")]
    Unavailable(String),
    #[error("provider rejected credentials: {0}")]
    Auth(String),
    #[error("provider returned {status}: {detail}")]
    Backend { status: u16, detail: String },
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone)]
pub enum Backend {
    /// Locally hosted model server speaking the Ollama chat API.
    Ollama { base_url: String },
    /// Anthropic hosted API; credentials come from ambient configuration.
    Anthropic { base_url: String },
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub id: String,
    pub backend: Backend,
}

impl ModelSpec {
    /// Provider-facing model name: the id without its `<backend>/` prefix.
    pub fn provider_model(&self) -> &str {
        self.id
            .split_once('/')
            .map(|(_, name)| name)
            .unwrap_or(&self.id)
    }
}

/// Ordered, immutable table of the models a router exposes. Built once at
/// startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ModelTable {
    specs: Vec<ModelSpec>,
    pub default_model: String,
}

impl ModelTable {
    pub fn new(specs: Vec<ModelSpec>, default_model: impl Into<String>) -> Self {
        Self {
            specs,
            default_model: default_model.into(),
        }
    }

    pub fn resolve(&self, model_id: &str) -> Result<&ModelSpec, ProviderError> {
        self.specs
            .iter()
            .find(|spec| spec.id == model_id)
            .ok_or_else(|| ProviderError::UnknownModel(model_id.to_string()))
    }

    pub fn contains(&self, model_id: &str) -> bool {
        self.specs.iter().any(|spec| spec.id == model_id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.specs.iter().map(|spec| spec.id.clone()).collect()
    }
}

/// Issues exactly one generation call per request against the resolved
/// backend. No retries, no health caching.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client,
    anthropic_api_key: Option<String>,
}

impl Dispatcher {
    pub fn new(anthropic_api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            anthropic_api_key,
        }
    }

    pub async fn generate(
        &self,
        spec: &ModelSpec,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        tracing::info!(model = %spec.id, "calling model provider");

        let result = match &spec.backend {
            Backend::Ollama { base_url } => {
                self.generate_ollama(base_url, spec.provider_model(), messages, timeout)
                    .await
            }
            Backend::Anthropic { base_url } => {
                self.generate_anthropic(base_url, spec.provider_model(), messages, timeout)
                    .await
            }
        };

        match &result {
            Ok(text) => {
                tracing::info!(model = %spec.id, response_length = text.len(), "provider call completed")
            }
            Err(err) => tracing::warn!(model = %spec.id, error = %err, "provider call failed"),
        }

        result
    }

    async fn generate_ollama(
        &self,
        base_url: &str,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        #[derive(Serialize)]
        struct ChatReq<'a> {
            model: &'a str,
            messages: &'a [ChatMessage],
            stream: bool,
        }

        #[derive(Deserialize)]
        struct ChatResp {
            #[serde(default)]
            message: Option<RespMessage>,
        }

        #[derive(Deserialize)]
        struct RespMessage {
            #[serde(default)]
            content: String,
        }

        let url = format!("{base_url}/api/chat");
        let response = self
            .client
            .post(url)
            .timeout(timeout)
            .json(&ChatReq {
                model,
                messages,
                stream: false,
            })
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let payload = response
            .json::<ChatResp>()
            .await
            .map_err(|err| ProviderError::Backend {
                status: status.as_u16(),
                detail: format!("undecodable chat response: {err}"),
            })?;

        // A decodable envelope with no message content is an empty answer,
        // not a failure.
        let content = payload
            .message
            .map(|message| message.content)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }

    async fn generate_anthropic(
        &self,
        base_url: &str,
        model: &str,
        messages: &[ChatMessage],
        timeout: Duration,
    ) -> Result<String, ProviderError> {
        #[derive(Serialize)]
        struct MessagesReq<'a> {
            model: &'a str,
            max_tokens: u32,
            messages: &'a [ChatMessage],
        }

        #[derive(Deserialize)]
        struct MessagesResp {
            #[serde(default)]
            content: Vec<ContentBlock>,
        }

        #[derive(Deserialize)]
        struct ContentBlock {
            #[serde(rename = "type", default)]
            kind: String,
            #[serde(default)]
            text: String,
        }

        let url = format!("{base_url}/v1/messages");
        let mut request = self
            .client
            .post(url)
            .timeout(timeout)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&MessagesReq {
                model,
                max_tokens: ANTHROPIC_MAX_TOKENS,
                messages,
            });

        if let Some(key) = &self.anthropic_api_key {
            request = request.header("x-api-key", key);
        }

        let response = request.send().await.map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        let payload =
            response
                .json::<MessagesResp>()
                .await
                .map_err(|err| ProviderError::Backend {
                    status: status.as_u16(),
                    detail: format!("undecodable messages response: {err}"),
                })?;

        let content = payload
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .map(|block| block.text)
            .unwrap_or_default();
        Ok(content.trim().to_string())
    }
}

/// Connect failures and timeouts mean the backend was never reached; anything
/// else at the transport layer is unclassified.
fn classify_transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_connect() || err.is_timeout() {
        ProviderError::Unavailable(err.to_string())
    } else {
        ProviderError::Other(err.to_string())
    }
}

fn classify_status(status: StatusCode, body: &str) -> ProviderError {
    let detail = normalize_err_body(body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        ProviderError::Auth(detail)
    } else {
        ProviderError::Backend {
            status: status.as_u16(),
            detail,
        }
    }
}

fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    // Both backends wrap errors in an "error" field: Ollama as a string,
    // Anthropic as an object carrying "message".
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error") {
            if let Some(message) = err.as_str() {
                return message.to_string();
            }
            if let Some(message) = err.get("message").and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }

    trimmed.to_string()
}

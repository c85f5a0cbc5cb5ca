//! VLM interaction: send one verification request and return the report.
//!
//! [`VerificationClient`] is the seam between the workflow and the network.
//! Two implementations ship with the crate:
//!
//! * [`OpenAiClient`] — speaks the OpenAI chat-completions protocol directly
//!   over `reqwest`, so it works with any compatible endpoint (OpenAI, Azure
//!   proxies, vLLM, LiteLLM, Ollama's `/v1`). The credential is a
//!   constructor argument, never read from ambient state.
//! * [`ProviderClient`] — wraps an `edgequake-llm` provider for everything
//!   else (Anthropic, Gemini, …).
//!
//! ## No retries
//!
//! Exactly one call is made per run. A 429 or a dropped connection surfaces
//! as [`VerifyError::Verification`] with the provider's own message, and the
//! caller decides whether to resubmit.

use crate::config::VerificationConfig;
use crate::credential::Credential;
use crate::error::VerifyError;
use crate::pipeline::request::VerificationRequest;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call options forwarded to the completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionSettings {
    /// Upper bound on the response length, forwarded verbatim.
    pub max_tokens: usize,
    pub temperature: Option<f32>,
}

impl CompletionSettings {
    pub fn from_config(config: &VerificationConfig) -> Self {
        Self {
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

/// The model's answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Completion {
    /// Report text, exactly as returned.
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    /// Model that actually answered, when the provider says so.
    pub model: Option<String>,
}

/// Sends a [`VerificationRequest`] to a multimodal completion endpoint.
#[async_trait]
pub trait VerificationClient: Send + Sync {
    /// Short label for logs, e.g. `"openai:gpt-4o-mini"`.
    fn describe(&self) -> String;

    /// Issue exactly one completion call.
    async fn complete(
        &self,
        request: &VerificationRequest,
        settings: &CompletionSettings,
    ) -> Result<Completion, VerifyError>;
}

// ── OpenAI-compatible client ─────────────────────────────────────────────

/// Direct client for `POST {base_url}/chat/completions`.
pub struct OpenAiClient {
    http: reqwest::Client,
    credential: Credential,
    endpoint: String,
    model: String,
}

impl OpenAiClient {
    /// Build a client for one session.
    ///
    /// Uses `config.base_url`, `config.model` and, when set,
    /// `config.api_timeout_secs` as the whole-request timeout.
    pub fn new(credential: Credential, config: &VerificationConfig) -> Result<Self, VerifyError> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.api_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| VerifyError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            credential,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("credential", &self.credential)
            .finish()
    }
}

#[async_trait]
impl VerificationClient for OpenAiClient {
    fn describe(&self) -> String {
        format!("openai:{}", self.model)
    }

    async fn complete(
        &self,
        request: &VerificationRequest,
        settings: &CompletionSettings,
    ) -> Result<Completion, VerifyError> {
        let body = chat_body(&self.model, request, settings);

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.credential.expose())
            .json(&body)
            .send()
            .await
            .map_err(|e| VerifyError::Verification {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| VerifyError::Verification {
            status: Some(status.as_u16()),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let message = service_error_message(&text)
                .unwrap_or_else(|| format!("HTTP {}: {}", status, text.trim()));
            warn!("Completion endpoint returned {}: {}", status, message);
            return Err(VerifyError::Verification {
                status: Some(status.as_u16()),
                message,
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&text).map_err(|e| VerifyError::Verification {
                status: Some(status.as_u16()),
                message: format!("unreadable completion response: {}", e),
            })?;

        into_completion(parsed)
    }
}

/// Build the JSON body: one user turn, instruction text then every image.
fn chat_body<'a>(
    model: &'a str,
    request: &'a VerificationRequest,
    settings: &CompletionSettings,
) -> ChatCompletionRequest<'a> {
    let mut content = Vec::with_capacity(request.images().len() + 1);
    content.push(ContentPart::Text {
        text: request.instruction(),
    });
    content.extend(request.images().iter().map(|img| ContentPart::ImageUrl {
        image_url: ImageUrl {
            url: img.to_data_uri(),
            detail: "high",
        },
    }));

    ChatCompletionRequest {
        model,
        messages: vec![RequestMessage {
            role: "user",
            content,
        }],
        max_tokens: settings.max_tokens,
        temperature: settings.temperature,
    }
}

fn into_completion(parsed: ChatCompletionResponse) -> Result<Completion, VerifyError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| VerifyError::Verification {
            status: None,
            message: "completion response contained no choices".into(),
        })?;

    match choice.finish_reason.as_deref() {
        Some("content_filter") => {
            return Err(VerifyError::Verification {
                status: None,
                message: "the provider's content filter blocked the response".into(),
            })
        }
        Some("length") => warn!("Report truncated at max_tokens; raise --max-tokens for a complete table"),
        _ => {}
    }

    let content = match (choice.message.content, choice.message.refusal) {
        (Some(content), _) => content,
        (None, Some(refusal)) => {
            return Err(VerifyError::Verification {
                status: None,
                message: format!("model refused: {}", refusal),
            })
        }
        (None, None) => {
            return Err(VerifyError::Verification {
                status: None,
                message: "completion response contained no text".into(),
            })
        }
    };

    let usage = parsed.usage.unwrap_or_default();
    debug!(
        "Completion: {} prompt tokens, {} completion tokens",
        usage.prompt_tokens, usage.completion_tokens
    );

    Ok(Completion {
        content,
        prompt_tokens: usage.prompt_tokens,
        completion_tokens: usage.completion_tokens,
        model: parsed.model,
    })
}

/// Pull `error.message` out of an OpenAI-style error body.
fn service_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error.message)
        .filter(|m| !m.trim().is_empty())
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct RequestMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
    detail: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    refusal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

// ── edgequake-llm adapter ────────────────────────────────────────────────

/// Routes a request through an `edgequake-llm` provider.
///
/// The provider reads its own key (`ANTHROPIC_API_KEY`, `GEMINI_API_KEY`, …)
/// when it is created; build one per session.
pub struct ProviderClient {
    provider: Arc<dyn LLMProvider>,
    label: String,
}

impl ProviderClient {
    /// Wrap a pre-built provider.
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>) -> Self {
        Self {
            provider,
            label: label.into(),
        }
    }

    /// Instantiate a named provider with the given model.
    pub fn from_name(provider_name: &str, model: &str) -> Result<Self, VerifyError> {
        let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
            VerifyError::MissingCredential {
                hint: format!("LLM provider '{provider_name}' is not configured: {e}"),
            }
        })?;
        Ok(Self::new(provider, format!("{provider_name}:{model}")))
    }

    /// Auto-detect a provider from the API key variables in the environment.
    pub fn from_env() -> Result<Self, VerifyError> {
        let (provider, _embedding) =
            ProviderFactory::from_env().map_err(|e| VerifyError::MissingCredential {
                hint: format!(
                    "No LLM provider could be auto-detected from environment.\n\
                     Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or GEMINI_API_KEY.\n\
                     Error: {}",
                    e
                ),
            })?;
        Ok(Self::new(provider, "auto"))
    }
}

#[async_trait]
impl VerificationClient for ProviderClient {
    fn describe(&self) -> String {
        self.label.clone()
    }

    async fn complete(
        &self,
        request: &VerificationRequest,
        settings: &CompletionSettings,
    ) -> Result<Completion, VerifyError> {
        let images = request
            .images()
            .iter()
            .map(|img| img.to_image_data())
            .collect();
        let messages = vec![ChatMessage::user_with_images(request.instruction(), images)];

        let options = CompletionOptions {
            temperature: settings.temperature,
            max_tokens: Some(settings.max_tokens),
            ..Default::default()
        };

        let response = self
            .provider
            .chat(&messages, Some(&options))
            .await
            .map_err(|e| VerifyError::Verification {
                status: None,
                message: e.to_string(),
            })?;

        debug!(
            "{}: {} input tokens, {} output tokens",
            self.label, response.prompt_tokens, response.completion_tokens
        );

        Ok(Completion {
            content: response.content,
            prompt_tokens: response.prompt_tokens as u64,
            completion_tokens: response.completion_tokens as u64,
            model: Some(response.model).filter(|m| !m.is_empty()),
        })
    }
}

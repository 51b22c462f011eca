//! HTTP providers speaking the OpenAI-compatible wire protocol.
//!
//! Only compiled with the `http` feature. The core never constructs these
//! directly; they come out of the [`text_generator`](super::text_generator)
//! and [`image_generator`](super::image_generator) factories.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use super::{
    FactoryError, GeneratedImage, ImageGenerator, ImageQuality, ImageSpec, ProviderError,
    ProviderKind, ProviderSettings, TextGenerator, TextRequest, TextResponse, TokenUsage,
};

const PROVIDER_NAME: &str = "openai";

fn require(
    value: &str,
    setting: &'static str,
) -> Result<String, FactoryError> {
    if value.trim().is_empty() {
        Err(FactoryError::MissingSetting {
            kind: ProviderKind::OpenAi,
            setting,
        })
    } else {
        Ok(value.trim().to_string())
    }
}

fn classify_status(status: reqwest::StatusCode, body: String) -> ProviderError {
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        ProviderError::Auth {
            provider: PROVIDER_NAME.into(),
        }
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited {
            provider: PROVIDER_NAME.into(),
            retry_after: None,
        }
    } else {
        ProviderError::Backend {
            provider: PROVIDER_NAME.into(),
            message: format!("status {status}: {body}"),
        }
    }
}

fn network_error(err: reqwest::Error) -> ProviderError {
    ProviderError::Network {
        provider: PROVIDER_NAME.into(),
        message: err.to_string(),
    }
}

// ── Text ───────────────────────────────────────────────────────────────

/// Chat-completions client for OpenAI-compatible endpoints.
pub struct OpenAiTextProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiTextProvider {
    /// Build a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::MissingSetting`] when the base URL, key, or
    /// model is blank.
    pub fn new(settings: ProviderSettings) -> Result<Self, FactoryError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: require(&settings.api_base, "api_base")?,
            api_key: require(&settings.api_key, "api_key")?,
            model: require(&settings.text_model, "text_model")?,
        })
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[async_trait]
impl TextGenerator for OpenAiTextProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate(&self, request: TextRequest) -> Result<TextResponse, ProviderError> {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        messages.push(json!({"role": "user", "content": request.prompt}));

        let body = json!({
            "model": self.model,
            "messages": messages,
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: ChatCompletionResponse =
            response.json().await.map_err(|err| ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.into(),
                message: err.to_string(),
            })?;

        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.into(),
                message: "response carried no message content".into(),
            })?;

        Ok(TextResponse {
            text,
            usage: parsed.usage.map(|u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            }),
        })
    }
}

// ── Images ─────────────────────────────────────────────────────────────

/// Image-generation client for OpenAI-compatible endpoints.
pub struct OpenAiImageProvider {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl OpenAiImageProvider {
    /// Build a client from connection settings.
    ///
    /// # Errors
    ///
    /// Returns [`FactoryError::MissingSetting`] when the base URL, key, or
    /// model is blank.
    pub fn new(settings: ProviderSettings) -> Result<Self, FactoryError> {
        Ok(Self {
            client: reqwest::Client::new(),
            api_base: require(&settings.api_base, "api_base")?,
            api_key: require(&settings.api_key, "api_key")?,
            model: require(&settings.image_model, "image_model")?,
        })
    }
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

#[async_trait]
impl ImageGenerator for OpenAiImageProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn generate(&self, spec: ImageSpec) -> Result<GeneratedImage, ProviderError> {
        let quality = match spec.quality {
            ImageQuality::Draft => "low",
            ImageQuality::Standard => "medium",
            ImageQuality::High => "high",
        };
        let body = json!({
            "model": self.model,
            "prompt": spec.prompt,
            "size": format!("{}x{}", spec.width, spec.height),
            "quality": quality,
            "response_format": "b64_json",
            "n": 1,
        });

        let response = self
            .client
            .post(format!("{}/images/generations", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: ImagesResponse =
            response.json().await.map_err(|err| ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.into(),
                message: err.to_string(),
            })?;

        let payload = parsed
            .data
            .into_iter()
            .next()
            .and_then(|datum| datum.b64_json)
            .ok_or_else(|| ProviderError::MalformedResponse {
                provider: PROVIDER_NAME.into(),
                message: "response carried no image payload".into(),
            })?;

        Ok(GeneratedImage {
            payload,
            mime_type: "image/png".into(),
        })
    }
}

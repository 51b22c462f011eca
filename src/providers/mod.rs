//! Generative backend contracts and the factory that selects them.
//!
//! The pipeline consumes two capability interfaces: [`TextGenerator`] for
//! structured-content calls and [`ImageGenerator`] for slide imagery. Both
//! are vendor-agnostic; concrete implementations are selected at
//! construction time by [`ProviderKind`] rather than through any runtime
//! class hierarchy. The always-available scripted implementations back
//! tests and offline runs; HTTP-backed implementations live behind the
//! `http` feature.

use async_trait::async_trait;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub mod scripted;

#[cfg(feature = "http")]
pub mod http;

pub use scripted::{ScriptedTextProvider, StaticImageProvider};

// ── Requests & responses ───────────────────────────────────────────────

/// One generative text call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextRequest {
    /// The user prompt.
    pub prompt: String,
    /// Optional system instruction fixing the response contract.
    pub system: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token budget.
    pub max_tokens: u32,
}

/// Token accounting reported by a text backend, when available.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

/// A text backend's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextResponse {
    /// The generated text.
    pub text: String,
    /// Token usage, if the backend reports it.
    pub usage: Option<TokenUsage>,
}

/// Quality tier requested from the image backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageQuality {
    /// Fast, lower-fidelity output.
    Draft,
    #[default]
    Standard,
    /// Slow, maximum-fidelity output.
    High,
}

/// One generative image call, already resolved to pixel dimensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSpec {
    /// The fully enhanced prompt.
    pub prompt: String,
    /// Output width in pixels.
    pub width: u32,
    /// Output height in pixels.
    pub height: u32,
    /// Requested quality tier.
    pub quality: ImageQuality,
}

/// An image backend's answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedImage {
    /// Base64-encoded image bytes.
    pub payload: String,
    /// MIME type of the decoded payload.
    pub mime_type: String,
}

// ── Errors ─────────────────────────────────────────────────────────────

/// Failures crossing the provider boundary.
///
/// Everything here is external: the pipeline either retries (network,
/// rate limits, backend hiccups) or surfaces the failure unchanged
/// (authentication, which retrying cannot fix).
#[derive(Debug, Error, Diagnostic)]
pub enum ProviderError {
    /// Transport-level failure reaching the backend.
    #[error("network failure talking to {provider}: {message}")]
    #[diagnostic(code(decksmith::provider::network))]
    Network { provider: String, message: String },

    /// The backend rejected our credentials.
    #[error("authentication rejected by {provider}")]
    #[diagnostic(
        code(decksmith::provider::auth),
        help("Check the API key configured for this provider.")
    )]
    Auth { provider: String },

    /// The backend asked us to slow down.
    #[error("rate limited by {provider}")]
    #[diagnostic(code(decksmith::provider::rate_limited))]
    RateLimited {
        provider: String,
        /// Seconds to wait, if the backend said.
        retry_after: Option<u64>,
    },

    /// The backend failed internally or returned an error status.
    #[error("{provider} backend error: {message}")]
    #[diagnostic(code(decksmith::provider::backend))]
    Backend { provider: String, message: String },

    /// The backend answered with something we could not interpret.
    #[error("malformed response from {provider}: {message}")]
    #[diagnostic(code(decksmith::provider::malformed))]
    MalformedResponse { provider: String, message: String },
}

impl ProviderError {
    /// Whether a retry with backoff has any chance of succeeding.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        !matches!(self, ProviderError::Auth { .. })
    }
}

// ── Capability traits ──────────────────────────────────────────────────

/// A generative text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Short tag identifying the backend in logs and errors.
    fn name(&self) -> &str;

    /// Generate text for `request`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on network, auth, rate-limit, or backend
    /// failure. Content-level problems (unparseable JSON) are not errors
    /// here; the caller owns response interpretation.
    async fn generate(&self, request: TextRequest) -> Result<TextResponse, ProviderError>;
}

/// A generative image backend.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Short tag identifying the backend in logs and errors.
    fn name(&self) -> &str;

    /// Generate one image for `spec`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError`] on network, auth, rate-limit, or backend
    /// failure.
    async fn generate(&self, spec: ImageSpec) -> Result<GeneratedImage, ProviderError>;
}

// ── Factory ────────────────────────────────────────────────────────────

/// Provider tag used to select implementations at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Deterministic in-process providers for tests and offline runs.
    Scripted,
    /// An OpenAI-compatible HTTP endpoint (requires the `http` feature).
    OpenAi,
}

impl ProviderKind {
    /// Parse a provider tag, e.g. from configuration.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "scripted" => Some(ProviderKind::Scripted),
            "openai" | "open_ai" => Some(ProviderKind::OpenAi),
            _ => None,
        }
    }
}

/// Connection settings consumed by HTTP-backed providers.
#[derive(Debug, Clone, Default)]
pub struct ProviderSettings {
    /// Base URL of the API, e.g. `https://api.openai.com/v1`.
    pub api_base: String,
    /// Bearer token.
    pub api_key: String,
    /// Model used for text generation.
    pub text_model: String,
    /// Model used for image generation.
    pub image_model: String,
}

impl ProviderSettings {
    /// Load settings from `DECKSMITH_API_BASE`, `DECKSMITH_API_KEY`,
    /// `DECKSMITH_TEXT_MODEL`, and `DECKSMITH_IMAGE_MODEL`.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let var = |key: &str| std::env::var(key).unwrap_or_default();
        Self {
            api_base: var("DECKSMITH_API_BASE"),
            api_key: var("DECKSMITH_API_KEY"),
            text_model: var("DECKSMITH_TEXT_MODEL"),
            image_model: var("DECKSMITH_IMAGE_MODEL"),
        }
    }
}

/// Errors raised while constructing providers.
#[derive(Debug, Error, Diagnostic)]
pub enum FactoryError {
    /// The requested provider needs a cargo feature this build lacks.
    #[error("provider '{kind:?}' requires the '{feature}' feature")]
    #[diagnostic(
        code(decksmith::provider::feature_disabled),
        help("Rebuild with `--features {feature}`.")
    )]
    FeatureDisabled {
        kind: ProviderKind,
        feature: &'static str,
    },

    /// Required settings are missing for the requested provider.
    #[error("provider '{kind:?}' is missing setting '{setting}'")]
    #[diagnostic(code(decksmith::provider::missing_setting))]
    MissingSetting {
        kind: ProviderKind,
        setting: &'static str,
    },
}

/// Construct a text backend for `kind`.
///
/// # Errors
///
/// Returns [`FactoryError`] when the kind is feature-gated out of this
/// build or its settings are incomplete.
pub fn text_generator(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> Result<Arc<dyn TextGenerator>, FactoryError> {
    match kind {
        ProviderKind::Scripted => Ok(Arc::new(ScriptedTextProvider::empty())),
        #[cfg(feature = "http")]
        ProviderKind::OpenAi => Ok(Arc::new(http::OpenAiTextProvider::new(settings.clone())?)),
        #[cfg(not(feature = "http"))]
        ProviderKind::OpenAi => {
            let _ = settings;
            Err(FactoryError::FeatureDisabled {
                kind,
                feature: "http",
            })
        }
    }
}

/// Construct an image backend for `kind`.
///
/// # Errors
///
/// Returns [`FactoryError`] when the kind is feature-gated out of this
/// build or its settings are incomplete.
pub fn image_generator(
    kind: ProviderKind,
    settings: &ProviderSettings,
) -> Result<Arc<dyn ImageGenerator>, FactoryError> {
    match kind {
        ProviderKind::Scripted => Ok(Arc::new(StaticImageProvider::default())),
        #[cfg(feature = "http")]
        ProviderKind::OpenAi => Ok(Arc::new(http::OpenAiImageProvider::new(settings.clone())?)),
        #[cfg(not(feature = "http"))]
        ProviderKind::OpenAi => {
            let _ = settings;
            Err(FactoryError::FeatureDisabled {
                kind,
                feature: "http",
            })
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_tags_parse() {
        assert_eq!(ProviderKind::from_tag("scripted"), Some(ProviderKind::Scripted));
        assert_eq!(ProviderKind::from_tag(" OpenAI "), Some(ProviderKind::OpenAi));
        assert_eq!(ProviderKind::from_tag("mystery"), None);
    }

    #[test]
    fn auth_errors_are_not_transient() {
        let auth = ProviderError::Auth {
            provider: "test".into(),
        };
        assert!(!auth.is_transient());

        let network = ProviderError::Network {
            provider: "test".into(),
            message: "reset".into(),
        };
        assert!(network.is_transient());
    }

    #[test]
    fn scripted_factory_always_succeeds() {
        let settings = ProviderSettings::default();
        assert!(text_generator(ProviderKind::Scripted, &settings).is_ok());
        assert!(image_generator(ProviderKind::Scripted, &settings).is_ok());
    }

    #[cfg(not(feature = "http"))]
    #[test]
    fn http_provider_requires_feature() {
        let settings = ProviderSettings::default();
        assert!(matches!(
            text_generator(ProviderKind::OpenAi, &settings),
            Err(FactoryError::FeatureDisabled { .. })
        ));
    }
}

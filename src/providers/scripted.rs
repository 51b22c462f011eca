//! Deterministic in-process providers for tests and offline runs.

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{
    GeneratedImage, ImageGenerator, ImageSpec, ProviderError, TextGenerator, TextRequest,
    TextResponse,
};

/// A text backend that replays a fixed queue of responses in order.
///
/// Each call pops the front of the queue; an exhausted queue fails with a
/// backend error, which makes over-calling visible in tests.
///
/// ```rust
/// use decksmith::providers::{ScriptedTextProvider, TextGenerator, TextRequest};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let provider = ScriptedTextProvider::new(["first", "second"]);
/// let request = TextRequest {
///     prompt: "hi".into(),
///     system: None,
///     temperature: 0.3,
///     max_tokens: 16,
/// };
/// assert_eq!(provider.generate(request.clone()).await.unwrap().text, "first");
/// assert_eq!(provider.generate(request).await.unwrap().text, "second");
/// # }
/// ```
pub struct ScriptedTextProvider {
    responses: Mutex<VecDeque<String>>,
}

impl ScriptedTextProvider {
    /// Queue up the given responses.
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
        }
    }

    /// A provider with no queued responses; every call fails.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(std::iter::empty::<String>())
    }

    /// Responses still queued.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.responses.lock().map(|q| q.len()).unwrap_or(0)
    }
}

#[async_trait]
impl TextGenerator for ScriptedTextProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, _request: TextRequest) -> Result<TextResponse, ProviderError> {
        let next = self
            .responses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());

        match next {
            Some(text) => Ok(TextResponse { text, usage: None }),
            None => Err(ProviderError::Backend {
                provider: "scripted".into(),
                message: "response script exhausted".into(),
            }),
        }
    }
}

/// An image backend that returns the same 1×1 PNG for every request.
pub struct StaticImageProvider {
    payload: String,
    mime_type: String,
}

/// Smallest valid single-pixel PNG, used as the canned payload.
const ONE_PIXEL_PNG: &[u8] = &[
    0x89, 0x50, 0x4e, 0x47, 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0x00, 0x00, 0x0d, 0x49, 0x48, 0x44,
    0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1f,
    0x15, 0xc4, 0x89, 0x00, 0x00, 0x00, 0x0a, 0x49, 0x44, 0x41, 0x54, 0x78, 0x9c, 0x63, 0x00,
    0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0d, 0x0a, 0x2d, 0xb4, 0x00, 0x00, 0x00, 0x00, 0x49,
    0x45, 0x4e, 0x44, 0xae, 0x42, 0x60, 0x82,
];

impl Default for StaticImageProvider {
    fn default() -> Self {
        Self {
            payload: BASE64.encode(ONE_PIXEL_PNG),
            mime_type: "image/png".into(),
        }
    }
}

impl StaticImageProvider {
    /// A provider returning an arbitrary canned payload.
    pub fn with_payload(payload: impl Into<String>, mime_type: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            mime_type: mime_type.into(),
        }
    }
}

#[async_trait]
impl ImageGenerator for StaticImageProvider {
    fn name(&self) -> &str {
        "static"
    }

    async fn generate(&self, _spec: ImageSpec) -> Result<GeneratedImage, ProviderError> {
        Ok(GeneratedImage {
            payload: self.payload.clone(),
            mime_type: self.mime_type.clone(),
        })
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

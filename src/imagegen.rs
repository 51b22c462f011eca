//! Per-slide image synthesis with bounded concurrency and graceful
//! degradation.
//!
//! Requests are processed in fixed batches of `worker_count` when running
//! in parallel — the synthesizer waits for a whole batch before starting
//! the next, so one slow request delays its batch but never interleaves
//! batches. Every request resolves to a result: a generated image, or a
//! deterministic SVG placeholder once the retry budget is spent. Nothing
//! escapes this boundary as an error.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Resolution, Theme};
use crate::progress::{PipelineStage, ProgressEvent, ProgressSender};
use crate::providers::{ImageGenerator, ImageQuality, ImageSpec};
use crate::retry::backoff_delay;

/// Fixed quality and composition requirements appended to every prompt.
const PROMPT_QUALITY_SUFFIX: &str = "high detail, balanced composition, 16:9 framing";
/// Progress percentage when the image stage begins.
const STAGE_START_PERCENT: u8 = 75;
/// Progress percentage when the image stage completes.
const STAGE_END_PERCENT: u8 = 90;

// ── Data model ─────────────────────────────────────────────────────────

/// A single slide's image request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    /// The slide's image prompt, before enhancement.
    pub prompt: String,
    /// Slide the image belongs to.
    pub slide_number: usize,
    /// Requested resolution tag.
    pub resolution: Resolution,
    /// Theme governing the style descriptor.
    pub theme: Theme,
}

/// Generation metadata attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResultMeta {
    /// When the result was produced.
    pub generated_at: DateTime<Utc>,
    /// The enhanced prompt that resolved the request.
    pub prompt: String,
    /// Retries consumed before resolution. Equals the configured maximum
    /// when the result is a placeholder.
    pub retry_count: u32,
}

/// The outcome of one image request — always produced, never a failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageResult {
    /// Slide the image belongs to.
    pub slide_number: usize,
    /// Base64-encoded image bytes.
    pub payload: String,
    /// MIME type of the decoded payload. `image/svg+xml` marks a
    /// placeholder.
    pub mime_type: String,
    /// Generation metadata.
    pub metadata: ImageResultMeta,
}

impl ImageResult {
    /// Whether this result is a degradation placeholder.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        self.mime_type == "image/svg+xml"
    }
}

// ── ImageSynthesizer ───────────────────────────────────────────────────

/// Converts per-slide prompts into generated images.
pub struct ImageSynthesizer {
    provider: Arc<dyn ImageGenerator>,
    quality: ImageQuality,
    worker_count: usize,
    max_retries: u32,
    progress: ProgressSender,
}

impl ImageSynthesizer {
    /// Create a synthesizer over the given image backend.
    pub fn new(
        provider: Arc<dyn ImageGenerator>,
        quality: ImageQuality,
        worker_count: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            provider,
            quality,
            worker_count: worker_count.max(1),
            max_retries,
            progress: ProgressSender::disabled(),
        }
    }

    /// Route progress events through `sender`.
    #[must_use]
    pub fn with_progress(mut self, sender: ProgressSender) -> Self {
        self.progress = sender;
        self
    }

    /// Process `requests`, in batches of `worker_count` when `parallel` is
    /// true and strictly one at a time otherwise. Returns one result per
    /// request, in request order.
    pub async fn generate_images(
        &self,
        requests: Vec<ImageRequest>,
        parallel: bool,
    ) -> Vec<ImageResult> {
        let total = requests.len();
        if total == 0 {
            return Vec::new();
        }

        let started = Instant::now();
        let mut results = Vec::with_capacity(total);

        if parallel {
            for batch in requests.chunks(self.worker_count) {
                // Full-batch barrier: nothing from the next batch starts
                // until every request here has resolved.
                let batch_results =
                    join_all(batch.iter().map(|request| self.generate_with_retry(request))).await;
                results.extend(batch_results);
                self.report_progress(results.len(), total, started);
            }
        } else {
            for request in &requests {
                results.push(self.generate_with_retry(request).await);
                self.report_progress(results.len(), total, started);
            }
        }

        let placeholders = results.iter().filter(|r| r.is_placeholder()).count();
        if placeholders > 0 {
            tracing::warn!(placeholders, total, "some images degraded to placeholders");
        }
        results
    }

    /// Resolve one request, retrying with exponential backoff and falling
    /// back to a placeholder when the budget is spent. Never fails.
    pub async fn generate_with_retry(&self, request: &ImageRequest) -> ImageResult {
        let prompt = enhance_prompt(request);
        let (width, height) = request.resolution.dimensions();
        let mut attempt = 0u32;

        loop {
            let spec = ImageSpec {
                prompt: prompt.clone(),
                width,
                height,
                quality: self.quality,
            };
            match self.provider.generate(spec).await {
                Ok(image) => {
                    return ImageResult {
                        slide_number: request.slide_number,
                        payload: image.payload,
                        mime_type: image.mime_type,
                        metadata: ImageResultMeta {
                            generated_at: Utc::now(),
                            prompt,
                            retry_count: attempt,
                        },
                    };
                }
                Err(err) if attempt < self.max_retries => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        slide = request.slide_number,
                        attempt,
                        delay_secs = delay.as_secs(),
                        error = %err,
                        "image generation failed, backing off",
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        slide = request.slide_number,
                        retries = self.max_retries,
                        error = %err,
                        "image retries exhausted, emitting placeholder",
                    );
                    return placeholder_result(request, &prompt, self.max_retries, width, height);
                }
            }
        }
    }

    fn report_progress(&self, done: usize, total: usize, started: Instant) {
        let span = u64::from(STAGE_END_PERCENT - STAGE_START_PERCENT);
        let percent = STAGE_START_PERCENT + (span * done as u64 / total as u64) as u8;

        let mut event = ProgressEvent::new(
            PipelineStage::Generate,
            percent,
            format!("generated {done} of {total} images"),
        )
        .with_counters(done, total);

        if done < total {
            let per_item = started.elapsed().as_secs_f64() / done as f64;
            event = event.with_eta((per_item * (total - done) as f64).ceil() as u64);
        }
        self.progress.emit(event);
    }
}

/// Append the theme's style descriptor and the fixed quality requirements.
#[must_use]
pub fn enhance_prompt(request: &ImageRequest) -> String {
    format!(
        "{}, {}, {PROMPT_QUALITY_SUFFIX}",
        request.prompt,
        request.theme.style_phrase(),
    )
}

/// A deterministic vector-graphic stand-in for a failed generation.
fn placeholder_result(
    request: &ImageRequest,
    prompt: &str,
    retries: u32,
    width: u32,
    height: u32,
) -> ImageResult {
    let svg = format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}"><rect width="100%" height="100%" fill="#e2e8f0"/><text x="50%" y="48%" font-family="sans-serif" font-size="{title_size}" fill="#475569" text-anchor="middle">Image generation failed</text><text x="50%" y="56%" font-family="sans-serif" font-size="{detail_size}" fill="#64748b" text-anchor="middle">{retries} retries exhausted</text></svg>"##,
        title_size = height / 18,
        detail_size = height / 30,
    );

    ImageResult {
        slide_number: request.slide_number,
        payload: BASE64.encode(svg.as_bytes()),
        mime_type: "image/svg+xml".to_string(),
        metadata: ImageResultMeta {
            generated_at: Utc::now(),
            prompt: prompt.to_string(),
            retry_count: retries,
        },
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{GeneratedImage, ProviderError, StaticImageProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};

    /// Fails the first `failures` calls, then succeeds.
    struct FlakyImageProvider {
        failures: u32,
        calls: AtomicU32,
    }

    impl FlakyImageProvider {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for FlakyImageProvider {
        fn name(&self) -> &str {
            "flaky"
        }

        async fn generate(&self, _spec: ImageSpec) -> Result<GeneratedImage, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ProviderError::Backend {
                    provider: "flaky".into(),
                    message: "synthetic failure".into(),
                })
            } else {
                Ok(GeneratedImage {
                    payload: "cGl4ZWxz".into(),
                    mime_type: "image/png".into(),
                })
            }
        }
    }

    /// Tracks the peak number of concurrently in-flight requests.
    struct ConcurrencyProbe {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl ConcurrencyProbe {
        fn new() -> Self {
            Self {
                in_flight: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ImageGenerator for ConcurrencyProbe {
        fn name(&self) -> &str {
            "probe"
        }

        async fn generate(&self, _spec: ImageSpec) -> Result<GeneratedImage, ProviderError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(GeneratedImage {
                payload: "cGl4ZWxz".into(),
                mime_type: "image/png".into(),
            })
        }
    }

    fn request(slide: usize) -> ImageRequest {
        ImageRequest {
            prompt: format!("diagram for slide {slide}"),
            slide_number: slide,
            resolution: Resolution::OneK,
            theme: Theme::Minimal,
        }
    }

    #[test]
    fn enhanced_prompt_carries_theme_and_quality() {
        let prompt = enhance_prompt(&request(1));
        assert!(prompt.starts_with("diagram for slide 1"));
        assert!(prompt.contains(Theme::Minimal.style_phrase()));
        assert!(prompt.ends_with(PROMPT_QUALITY_SUFFIX));
    }

    #[tokio::test]
    async fn success_carries_retry_count_zero() {
        let synth = ImageSynthesizer::new(
            Arc::new(StaticImageProvider::default()),
            ImageQuality::Standard,
            2,
            3,
        );
        let result = synth.generate_with_retry(&request(1)).await;
        assert_eq!(result.metadata.retry_count, 0);
        assert!(!result.is_placeholder());
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let synth = ImageSynthesizer::new(
            Arc::new(FlakyImageProvider::new(2)),
            ImageQuality::Standard,
            2,
            3,
        );
        let result = synth.generate_with_retry(&request(4)).await;
        assert!(!result.is_placeholder());
        assert_eq!(result.metadata.retry_count, 2);
        assert_eq!(result.slide_number, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_degrade_to_placeholder() {
        let synth = ImageSynthesizer::new(
            Arc::new(FlakyImageProvider::new(u32::MAX)),
            ImageQuality::Standard,
            2,
            3,
        );
        let result = synth.generate_with_retry(&request(2)).await;
        assert!(result.is_placeholder());
        assert_eq!(result.mime_type, "image/svg+xml");
        assert_eq!(result.metadata.retry_count, 3);

        let decoded = BASE64.decode(&result.payload).unwrap();
        let svg = String::from_utf8(decoded).unwrap();
        assert!(svg.contains("Image generation failed"));
        assert!(svg.contains("3 retries"));
        assert!(svg.contains(r#"width="1280""#));
    }

    #[tokio::test]
    async fn parallel_batches_respect_worker_count() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let synth =
            ImageSynthesizer::new(probe.clone(), ImageQuality::Standard, 2, 0);
        let requests: Vec<ImageRequest> = (1..=5).map(request).collect();

        let results = synth.generate_images(requests, true).await;
        assert_eq!(results.len(), 5);
        assert!(probe.peak.load(Ordering::SeqCst) <= 2);
        // Request order is preserved.
        let slides: Vec<usize> = results.iter().map(|r| r.slide_number).collect();
        assert_eq!(slides, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn sequential_mode_never_overlaps() {
        let probe = Arc::new(ConcurrencyProbe::new());
        let synth =
            ImageSynthesizer::new(probe.clone(), ImageQuality::Standard, 4, 0);
        let requests: Vec<ImageRequest> = (1..=3).map(request).collect();

        let results = synth.generate_images(requests, false).await;
        assert_eq!(results.len(), 3);
        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_request_list_yields_no_results() {
        let synth = ImageSynthesizer::new(
            Arc::new(StaticImageProvider::default()),
            ImageQuality::Standard,
            2,
            3,
        );
        assert!(synth.generate_images(Vec::new(), true).await.is_empty());
    }
}

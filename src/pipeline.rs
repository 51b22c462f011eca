//! The stage orchestrator: index → summarize → plan → gate → images.
//!
//! [`DeckPipeline`] sequences the four stages, threads the configuration
//! through them, reports progress at fixed checkpoints, and honors a
//! single cancellation gate between planning and image synthesis. Nothing
//! irreversible happens before the gate, so a rejection leaves no partial
//! side effects.

use async_trait::async_trait;
use miette::Diagnostic;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::chunker::{ChunkError, Chunker};
use crate::config::{PipelineConfig, SlideMode};
use crate::imagegen::{ImageRequest, ImageResult, ImageSynthesizer};
use crate::index::RetrievalIndex;
use crate::planner::{Planner, SlideBlueprint};
use crate::progress::{PipelineStage, ProgressSender};
use crate::providers::{ImageGenerator, ImageQuality, ProviderError, TextGenerator};
use crate::retry::with_backoff;
use crate::summarizer::{ContentSummary, Summarizer};

// ── Results ────────────────────────────────────────────────────────────

/// Per-run statistics attached to the final result.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RunStats {
    /// Slides in the produced deck.
    pub slide_count: usize,
    /// Image results produced (placeholders included).
    pub image_count: usize,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Everything a pipeline run produces.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DeckResult {
    /// Unique identifier of this run.
    pub run_id: Uuid,
    /// The planned deck, in slide order.
    pub blueprints: Vec<SlideBlueprint>,
    /// One entry per slide that requested an image.
    pub images: Vec<ImageResult>,
    /// The summary the deck was planned from.
    pub summary: ContentSummary,
    /// Run statistics.
    pub stats: RunStats,
}

// ── Errors ─────────────────────────────────────────────────────────────

/// Fatal pipeline outcomes. Recoverable problems (unparseable responses,
/// failed images) never reach this type.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    /// The input document is blank; no stage was entered.
    #[error("input document is empty")]
    #[diagnostic(
        code(decksmith::pipeline::empty_input),
        help("Provide a document with at least one non-blank line.")
    )]
    EmptyInput,

    /// The plan was rejected at the cancellation gate.
    #[error("deck generation cancelled at the plan gate")]
    #[diagnostic(code(decksmith::pipeline::cancelled))]
    Cancelled,

    /// Chunking configuration was invalid.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Chunking(#[from] ChunkError),

    /// A generation stage failed even after its retry budget.
    #[error("stage '{stage}' failed after {attempts} attempts")]
    #[diagnostic(code(decksmith::pipeline::stage_exhausted))]
    StageExhausted {
        stage: PipelineStage,
        attempts: u32,
        #[source]
        source: ProviderError,
    },
}

// ── Cancellation gate ──────────────────────────────────────────────────

/// Decision returned by a [`PlanGate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanDecision {
    /// Continue into image synthesis and assembly.
    Approve,
    /// Abort the run; nothing further happens.
    Reject,
}

/// The single cancellation point of a run, consulted once right after
/// planning. The host application typically implements this with a
/// preview dialog; requests already dispatched to a backend are never
/// interrupted, which is why the gate sits before image synthesis.
#[async_trait]
pub trait PlanGate: Send + Sync {
    /// Review the planned deck.
    async fn review(&self, blueprints: &[SlideBlueprint]) -> PlanDecision;
}

/// A gate that approves every plan. The default.
pub struct AutoApprove;

#[async_trait]
impl PlanGate for AutoApprove {
    async fn review(&self, _blueprints: &[SlideBlueprint]) -> PlanDecision {
        PlanDecision::Approve
    }
}

// ── DeckPipeline ───────────────────────────────────────────────────────

/// Orchestrates a full document-to-deck run.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use decksmith::config::PipelineConfig;
/// use decksmith::pipeline::DeckPipeline;
/// use decksmith::providers::{ScriptedTextProvider, StaticImageProvider};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), decksmith::pipeline::PipelineError> {
/// let pipeline = DeckPipeline::builder()
///     .config(PipelineConfig::default())
///     .text_provider(Arc::new(ScriptedTextProvider::new(["{…}", "[…]"])))
///     .image_provider(Arc::new(StaticImageProvider::default()))
///     .build();
///
/// let result = pipeline.run("# My document\nSome content.").await?;
/// println!("{} slides", result.stats.slide_count);
/// # Ok(())
/// # }
/// ```
pub struct DeckPipeline {
    config: PipelineConfig,
    summarizer: Summarizer,
    planner: Planner,
    synthesizer: ImageSynthesizer,
    gate: Arc<dyn PlanGate>,
    progress: ProgressSender,
}

impl DeckPipeline {
    /// Start building a pipeline.
    #[must_use]
    pub fn builder() -> DeckPipelineBuilder {
        DeckPipelineBuilder::default()
    }

    /// Run the pipeline over `document`.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::EmptyInput`] for a blank document, before any
    ///   stage runs.
    /// - [`PipelineError::StageExhausted`] when summarization or planning
    ///   keeps failing at the provider after the retry budget.
    /// - [`PipelineError::Cancelled`] when the gate rejects the plan.
    ///
    /// Image failures never surface here; they degrade to placeholders.
    pub async fn run(&self, document: &str) -> Result<DeckResult, PipelineError> {
        if document.trim().is_empty() {
            return Err(PipelineError::EmptyInput);
        }

        let run_id = Uuid::new_v4();
        let started = Instant::now();
        tracing::info!(%run_id, "deck generation started");

        // Stage 1: chunk and index.
        self.progress
            .report(PipelineStage::Index, 10, "indexing document");
        let chunker = Chunker::new(self.config.chunk_size, self.config.overlap_ratio)?;
        let index = RetrievalIndex::build(chunker.chunk(document));
        self.progress.report(
            PipelineStage::Index,
            25,
            format!("indexed {} chunks", index.stats().chunk_count),
        );

        // Stage 2: summarize, with stage-level retries.
        self.progress
            .report(PipelineStage::Summarize, 35, "summarizing content");
        let summary = self
            .retry_stage(PipelineStage::Summarize, || self.summarizer.summarize(&index))
            .await?;
        self.progress.report(
            PipelineStage::Summarize,
            50,
            format!("summary ready, {} slides suggested", summary.suggested_slide_count),
        );

        // Stage 3: plan, with stage-level retries.
        self.progress
            .report(PipelineStage::Plan, 60, "planning slides");
        let blueprints = self
            .retry_stage(PipelineStage::Plan, || self.planner.plan(&summary, &self.config))
            .await?;
        self.progress.report(
            PipelineStage::Plan,
            70,
            format!("planned {} slides", blueprints.len()),
        );

        // Cancellation gate: the one point where the caller can abort
        // before irreversible work begins.
        if self.gate.review(&blueprints).await == PlanDecision::Reject {
            tracing::info!(%run_id, "plan rejected at the gate");
            return Err(PipelineError::Cancelled);
        }

        // Stage 4: images, only when enabled and any slide wants one.
        let requests: Vec<ImageRequest> = blueprints
            .iter()
            .filter_map(|blueprint| {
                blueprint.image_prompt.as_ref().map(|prompt| ImageRequest {
                    prompt: prompt.clone(),
                    slide_number: blueprint.slide_number,
                    resolution: self.config.resolution,
                    theme: self.config.theme,
                })
            })
            .collect();

        let images = if self.config.generate_images && !requests.is_empty() {
            self.progress.report(
                PipelineStage::Generate,
                75,
                format!("generating {} images", requests.len()),
            );
            let parallel = self.config.worker_count > 1;
            let images = self.synthesizer.generate_images(requests, parallel).await;
            self.progress
                .report(PipelineStage::Generate, 90, "images ready");
            images
        } else {
            Vec::new()
        };

        let stats = RunStats {
            slide_count: blueprints.len(),
            image_count: images.len(),
            duration: started.elapsed(),
        };
        self.progress
            .report(PipelineStage::Generate, 100, "deck assembled");
        tracing::info!(
            %run_id,
            slides = stats.slide_count,
            images = stats.image_count,
            "deck generation finished",
        );

        Ok(DeckResult {
            run_id,
            blueprints,
            images,
            summary,
            stats,
        })
    }

    /// Stage-level retry wrapper: re-invokes a whole stage on transient
    /// provider failures, with the same backoff schedule as per-image
    /// retries. Exhaustion is fatal — there is no fallback above the
    /// per-call fallback already applied inside each stage.
    async fn retry_stage<T, F, Fut>(
        &self,
        stage: PipelineStage,
        op: F,
    ) -> Result<T, PipelineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, ProviderError>>,
    {
        with_backoff(self.config.max_retries, ProviderError::is_transient, op)
            .await
            .map_err(|source| PipelineError::StageExhausted {
                stage,
                attempts: self.config.max_retries + 1,
                source,
            })
    }
}

// ── DeckPipelineBuilder ────────────────────────────────────────────────

/// Builder for [`DeckPipeline`].
#[derive(Default)]
pub struct DeckPipelineBuilder {
    config: Option<PipelineConfig>,
    text_provider: Option<Arc<dyn TextGenerator>>,
    image_provider: Option<Arc<dyn ImageGenerator>>,
    gate: Option<Arc<dyn PlanGate>>,
    progress: Option<ProgressSender>,
}

impl DeckPipelineBuilder {
    /// Set the pipeline configuration (defaults to [`PipelineConfig::default`]).
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the text backend used by the summarizer and planner.
    #[must_use]
    pub fn text_provider(mut self, provider: Arc<dyn TextGenerator>) -> Self {
        self.text_provider = Some(provider);
        self
    }

    /// Set the image backend used by the synthesizer.
    #[must_use]
    pub fn image_provider(mut self, provider: Arc<dyn ImageGenerator>) -> Self {
        self.image_provider = Some(provider);
        self
    }

    /// Set the cancellation gate (defaults to [`AutoApprove`]).
    #[must_use]
    pub fn gate(mut self, gate: Arc<dyn PlanGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Route progress events through `sender` (defaults to disabled).
    #[must_use]
    pub fn progress(mut self, sender: ProgressSender) -> Self {
        self.progress = Some(sender);
        self
    }

    /// Build the pipeline.
    ///
    /// # Panics
    ///
    /// Panics when no text or image provider was supplied; the pipeline is
    /// unusable without its backends, so this is a construction bug rather
    /// than a runtime condition.
    #[must_use]
    pub fn build(self) -> DeckPipeline {
        let config = self.config.unwrap_or_default();
        let text_provider = self
            .text_provider
            .expect("DeckPipelineBuilder requires a text provider");
        let image_provider = self
            .image_provider
            .expect("DeckPipelineBuilder requires an image provider");
        let progress = self.progress.unwrap_or_else(ProgressSender::disabled);

        let quality = match config.mode {
            SlideMode::Fast => ImageQuality::Draft,
            SlideMode::Normal => ImageQuality::High,
        };
        let synthesizer = ImageSynthesizer::new(
            image_provider,
            quality,
            config.worker_count,
            config.max_retries,
        )
        .with_progress(progress.clone());

        DeckPipeline {
            summarizer: Summarizer::new(text_provider.clone()),
            planner: Planner::new(text_provider),
            synthesizer,
            gate: self.gate.unwrap_or_else(|| Arc::new(AutoApprove)),
            progress,
            config,
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

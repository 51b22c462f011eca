//! # Decksmith: document-to-slide-deck generation pipeline
//!
//! Decksmith turns a free-form text document into a structured slide deck
//! through four staged transformations:
//!
//! 1. **Index** — sliding-window chunking with overlap and structural
//!    metadata, aggregated into a lexical [`RetrievalIndex`](index::RetrievalIndex).
//! 2. **Summarize** — a retrieval-backed call to a generative text backend
//!    producing a [`ContentSummary`](summarizer::ContentSummary), with a
//!    deterministic fallback when the response is unusable.
//! 3. **Plan** — a second backend call producing per-slide
//!    [`SlideBlueprint`](planner::SlideBlueprint)s, normalized by a layout
//!    optimizer that enforces the deck invariants.
//! 4. **Generate** — bounded-concurrency image synthesis with exponential
//!    backoff and placeholder degradation; image failures never abort a run.
//!
//! The [`DeckPipeline`](pipeline::DeckPipeline) orchestrator sequences the
//! stages, reports progress through a [`ProgressBus`](progress::ProgressBus),
//! and honors a single cancellation gate between planning and synthesis.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use decksmith::config::{LengthBucket, PipelineConfig, Theme};
//! use decksmith::pipeline::DeckPipeline;
//! use decksmith::progress::ProgressBus;
//! use decksmith::providers::{ProviderKind, ProviderSettings};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> miette::Result<()> {
//! let settings = ProviderSettings::from_env();
//! let config = PipelineConfig::builder()
//!     .length(LengthBucket::Medium)
//!     .theme(Theme::Professional)
//!     .build();
//!
//! let bus = ProgressBus::default();
//! bus.listen();
//!
//! let pipeline = DeckPipeline::builder()
//!     .config(config)
//!     .text_provider(decksmith::providers::text_generator(
//!         ProviderKind::OpenAi,
//!         &settings,
//!     ).map_err(miette::Report::from)?)
//!     .image_provider(decksmith::providers::image_generator(
//!         ProviderKind::OpenAi,
//!         &settings,
//!     ).map_err(miette::Report::from)?)
//!     .progress(bus.sender())
//!     .build();
//!
//! let result = pipeline.run("# Quarterly review\n…").await
//!     .map_err(miette::Report::from)?;
//! println!("{} slides, {} images", result.stats.slide_count, result.stats.image_count);
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure model
//!
//! Unparseable backend responses degrade to deterministic fallbacks and
//! never surface. Provider failures are retried with exponential backoff at
//! two levels: per image (degrading to an SVG placeholder) and per stage
//! (fatal once exhausted). A blank input fails fast, and a rejected plan
//! cancels the run before any image work begins.
//!
//! ## Module Guide
//!
//! - [`chunker`] — sliding-window chunking and metadata extraction
//! - [`index`] — the lexical retrieval index and its TF-IDF scoring
//! - [`summarizer`] — content summarization with heuristic fallback
//! - [`planner`] — blueprint planning and layout optimization
//! - [`imagegen`] — batched image synthesis with retry and placeholders
//! - [`pipeline`] — the stage orchestrator and cancellation gate
//! - [`progress`] — progress events, sinks, and the broadcast bus
//! - [`providers`] — generative backend traits and the provider factory
//! - [`config`] — run configuration and environment loading
//! - [`retry`] — the shared bounded-backoff helper
//! - [`telemetry`] — tracing subscriber setup

pub mod chunker;
pub mod config;
pub mod imagegen;
pub mod index;
pub mod pipeline;
pub mod planner;
pub mod progress;
pub mod providers;
pub mod retry;
pub mod summarizer;
pub mod telemetry;
pub mod utils;

/// Re-exports for convenient access to the core surface.
pub mod prelude {
    pub use crate::chunker::{Chunker, DocumentChunk};
    pub use crate::config::{LengthBucket, PipelineConfig, Resolution, SlideMode, Theme};
    pub use crate::imagegen::{ImageRequest, ImageResult, ImageSynthesizer};
    pub use crate::index::RetrievalIndex;
    pub use crate::pipeline::{
        AutoApprove, DeckPipeline, DeckResult, PipelineError, PlanDecision, PlanGate, RunStats,
    };
    pub use crate::planner::{Planner, SlideBlueprint, SlideLayout};
    pub use crate::progress::{PipelineStage, ProgressBus, ProgressEvent, ProgressSink};
    pub use crate::providers::{
        ImageGenerator, ProviderError, ProviderKind, ProviderSettings, TextGenerator,
    };
    pub use crate::summarizer::{ContentSummary, Summarizer};
}

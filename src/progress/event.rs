use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The pipeline stage a progress event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Chunking and index construction.
    Index,
    /// Content summarization.
    Summarize,
    /// Blueprint planning.
    Plan,
    /// Image synthesis.
    Generate,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Index => write!(f, "index"),
            PipelineStage::Summarize => write!(f, "summarize"),
            PipelineStage::Plan => write!(f, "plan"),
            PipelineStage::Generate => write!(f, "generate"),
        }
    }
}

/// One progress report from a running pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Stage that produced the event.
    pub stage: PipelineStage,
    /// Overall completion, 0–100, monotone across a run.
    pub percent: u8,
    /// Human-readable description.
    pub message: String,
    /// Completed unit count within the stage, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<usize>,
    /// Total unit count within the stage, when meaningful.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
    /// Estimated seconds remaining, when the stage can tell.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<u64>,
    /// When the event was emitted.
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// A plain stage/percent/message event.
    pub fn new(stage: PipelineStage, percent: u8, message: impl Into<String>) -> Self {
        Self {
            stage,
            percent,
            message: message.into(),
            current: None,
            total: None,
            eta_seconds: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach per-unit counters, e.g. slides completed out of total.
    #[must_use]
    pub fn with_counters(mut self, current: usize, total: usize) -> Self {
        self.current = Some(current);
        self.total = Some(total);
        self
    }

    /// Attach an estimated-seconds-remaining hint.
    #[must_use]
    pub fn with_eta(mut self, eta_seconds: u64) -> Self {
        self.eta_seconds = Some(eta_seconds);
        self
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.current, self.total) {
            (Some(current), Some(total)) => write!(
                f,
                "[{}] {}% ({current}/{total}) {}",
                self.stage, self.percent, self.message
            ),
            _ => write!(f, "[{}] {}% {}", self.stage, self.percent, self.message),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

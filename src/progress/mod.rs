//! Progress reporting for pipeline runs.
//!
//! Stages emit [`ProgressEvent`]s through a [`ProgressSender`]; a
//! [`ProgressBus`] receives them and broadcasts to any number of
//! [`ProgressSink`]s (tracing output, host-application channels). The
//! sender clamps percentages so the stream is monotonically non-decreasing
//! no matter how stages interleave their reports.

mod bus;
mod event;
mod sink;

pub use bus::ProgressBus;
pub use event::{PipelineStage, ProgressEvent};
pub use sink::{ChannelSink, ProgressSink, SinkError, TracingSink};

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Cloneable handle stages use to emit progress.
///
/// A disabled sender drops events instead of failing, so components can
/// report unconditionally. All clones share one percentage floor, keeping
/// the emitted stream monotone.
#[derive(Clone)]
pub struct ProgressSender {
    inner: Option<flume::Sender<ProgressEvent>>,
    floor: Arc<AtomicU8>,
}

impl ProgressSender {
    pub(crate) fn new(sender: flume::Sender<ProgressEvent>) -> Self {
        Self {
            inner: Some(sender),
            floor: Arc::new(AtomicU8::new(0)),
        }
    }

    /// A sender that silently drops every event.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            inner: None,
            floor: Arc::new(AtomicU8::new(0)),
        }
    }

    /// Emit an event, lifting its percentage to the monotone floor.
    ///
    /// Send failures (a dropped bus) are ignored; progress is advisory.
    pub fn emit(&self, event: ProgressEvent) {
        let Some(sender) = &self.inner else {
            return;
        };
        let percent = self.floor.fetch_max(event.percent, Ordering::SeqCst).max(event.percent);
        let _ = sender.send(ProgressEvent { percent, ..event });
    }

    /// Convenience for a plain stage/percent/message event.
    pub fn report(&self, stage: PipelineStage, percent: u8, message: impl Into<String>) {
        self.emit(ProgressEvent::new(stage, percent, message));
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_sender_drops_silently() {
        let sender = ProgressSender::disabled();
        sender.report(PipelineStage::Index, 10, "no one is listening");
    }

    #[test]
    fn percentages_never_regress() {
        let (tx, rx) = flume::unbounded();
        let sender = ProgressSender::new(tx);

        sender.report(PipelineStage::Plan, 70, "ahead");
        sender.report(PipelineStage::Summarize, 50, "late report");
        sender.report(PipelineStage::Generate, 85, "onward");

        let percents: Vec<u8> = rx.drain().map(|e| e.percent).collect();
        assert_eq!(percents, vec![70, 70, 85]);
    }
}

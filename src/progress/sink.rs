use thiserror::Error;

use super::event::ProgressEvent;

/// Errors a sink may raise while handling an event.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink's downstream consumer is gone.
    #[error("progress sink disconnected")]
    Disconnected,
}

/// Receives every progress event broadcast by a [`ProgressBus`](super::ProgressBus).
pub trait ProgressSink: Send {
    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkError`] when the sink can no longer deliver events;
    /// the bus logs and carries on with its other sinks.
    fn handle(&mut self, event: &ProgressEvent) -> Result<(), SinkError>;
}

/// Logs every event through `tracing` at info level.
#[derive(Debug, Default)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn handle(&mut self, event: &ProgressEvent) -> Result<(), SinkError> {
        tracing::info!(
            stage = %event.stage,
            percent = event.percent,
            current = event.current,
            total = event.total,
            "{}",
            event.message,
        );
        Ok(())
    }
}

/// Forwards events into a tokio channel, e.g. toward a host-application UI.
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelSink {
    /// Wrap an unbounded sender.
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn handle(&mut self, event: &ProgressEvent) -> Result<(), SinkError> {
        self.sender
            .send(event.clone())
            .map_err(|_| SinkError::Disconnected)
    }
}

// ── Tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::PipelineStage;

    #[test]
    fn channel_sink_forwards_events() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);
        let event = ProgressEvent::new(PipelineStage::Index, 10, "chunking");
        sink.handle(&event).unwrap();
        assert_eq!(rx.try_recv().unwrap(), event);
    }

    #[test]
    fn channel_sink_reports_disconnect() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        let event = ProgressEvent::new(PipelineStage::Index, 10, "chunking");
        assert!(matches!(sink.handle(&event), Err(SinkError::Disconnected)));
    }
}

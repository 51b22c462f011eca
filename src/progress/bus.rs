use std::sync::{Arc, Mutex};
use tokio::{sync::oneshot, task};

use super::ProgressSender;
use super::event::ProgressEvent;
use super::sink::{ProgressSink, TracingSink};

/// Receives progress events and broadcasts them to multiple sinks.
///
/// The bus owns an unbounded channel; stages hold [`ProgressSender`] clones
/// of the sending side, and a background task drains the receiving side
/// into the registered sinks.
pub struct ProgressBus {
    sinks: Arc<Mutex<Vec<Box<dyn ProgressSink>>>>,
    channel: (flume::Sender<ProgressEvent>, flume::Receiver<ProgressEvent>),
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for ProgressBus {
    fn default() -> Self {
        Self::with_sink(TracingSink)
    }
}

impl ProgressBus {
    /// Create a bus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: ProgressSink + 'static,
    {
        Self {
            sinks: Arc::new(Mutex::new(vec![Box::new(sink)])),
            channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Create a bus with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn ProgressSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Register an additional sink, e.g. a per-run streaming channel.
    pub fn add_sink<T: ProgressSink + 'static>(&self, sink: T) {
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push(Box::new(sink));
        }
    }

    /// A sender handle for pipeline stages.
    #[must_use]
    pub fn sender(&self) -> ProgressSender {
        ProgressSender::new(self.channel.0.clone())
    }

    /// Spawn the background task that drains events into the sinks.
    /// Idempotent: calling again has no effect.
    pub fn listen(&self) {
        let Ok(mut guard) = self.listener.lock() else {
            return;
        };
        if guard.is_some() {
            return;
        }

        let receiver = self.channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => {
                            let Ok(mut sinks) = sinks.lock() else { break };
                            for sink in sinks.iter_mut() {
                                if let Err(err) = sink.handle(&event) {
                                    tracing::warn!(error = %err, "progress sink failed");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener, waiting for it to drain.
    pub async fn stop(&self) {
        let state = {
            let Ok(mut guard) = self.listener.lock() else {
                return;
            };
            guard.take()
        };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for ProgressBus {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener.lock() {
            if let Some(state) = guard.take() {
                let _ = state.shutdown_tx.send(());
                state.handle.abort();
            }
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

// ── Tests ──────────────────────────────────────────────────────────────

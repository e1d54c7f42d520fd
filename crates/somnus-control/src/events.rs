//! Event aggregation from all Somnus subsystems
//!
//! The EventAggregator collects events from the lifecycle controller, the
//! monitor loop and the wake orchestrator into one stream for operators and
//! audit consumers.

use somnus_types::{EventSeverity, EventSource, SomnusEvent, SomnusEventEnvelope};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Channel capacity for the unified event stream
const EVENT_CHANNEL_CAPACITY: usize = 4096;

/// Aggregates events from all Somnus subsystems into a single stream
#[derive(Clone)]
pub struct EventAggregator {
    unified_tx: broadcast::Sender<SomnusEventEnvelope>,
}

impl EventAggregator {
    pub fn new() -> Self {
        let (unified_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { unified_tx }
    }

    /// Subscribe to the unified event stream
    pub fn subscribe(&self) -> broadcast::Receiver<SomnusEventEnvelope> {
        self.unified_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.unified_tx.receiver_count()
    }

    /// Relay one subsystem's events into the unified stream.
    ///
    /// Returns once the subsystem's sender is gone. Events the receiver
    /// skipped because it fell behind are counted, not replayed.
    pub async fn forward_from(
        &self,
        mut source_rx: broadcast::Receiver<SomnusEventEnvelope>,
        source: EventSource,
    ) -> ForwardStats {
        let mut stats = ForwardStats::default();
        loop {
            let envelope = match source_rx.recv().await {
                Ok(envelope) => envelope,
                Err(RecvError::Lagged(skipped)) => {
                    stats.skipped += skipped;
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            stats.forwarded += 1;
            // No subscribers is fine
            let _ = self.unified_tx.send(envelope);
        }

        if stats.skipped > 0 {
            warn!(source = ?source, skipped = stats.skipped, "Subsystem events lost before aggregation");
        }
        debug!(source = ?source, forwarded = stats.forwarded, "Subsystem event stream ended");
        stats
    }

    /// Emit a control plane event
    pub fn emit(&self, event: SomnusEvent, severity: EventSeverity, actor: Option<String>) {
        let envelope =
            SomnusEventEnvelope::new(EventSource::ControlPlane, severity, event).with_actor(actor);
        let _ = self.unified_tx.send(envelope);
    }

    pub fn emit_info(&self, event: SomnusEvent) {
        self.emit(event, EventSeverity::Info, None);
    }
}

/// What one forwarder relayed before its source went away
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForwardStats {
    pub forwarded: u64,
    pub skipped: u64,
}

impl Default for EventAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for constructing event forwarding pipelines
pub struct EventForwarderBuilder {
    aggregator: EventAggregator,
    handles: Vec<JoinHandle<ForwardStats>>,
}

impl EventForwarderBuilder {
    pub fn new(aggregator: EventAggregator) -> Self {
        Self {
            aggregator,
            handles: Vec::new(),
        }
    }

    /// Add a source to forward events from. Must be called inside a runtime.
    pub fn add_source(
        mut self,
        source_rx: broadcast::Receiver<SomnusEventEnvelope>,
        source: EventSource,
    ) -> Self {
        let aggregator = self.aggregator.clone();
        self.handles.push(tokio::spawn(async move {
            aggregator.forward_from(source_rx, source).await
        }));
        self
    }

    /// Handles for the forwarding tasks
    pub fn build(self) -> Vec<JoinHandle<ForwardStats>> {
        self.handles
    }
}

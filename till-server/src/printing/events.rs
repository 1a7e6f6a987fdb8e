//! Print failure events
//!
//! Every transport failure the manager sees is reported here, including
//! ones that a fallback or retry later recovers from.

use std::sync::Mutex;

use super::types::PrintEvent;

/// Receiver for print failure events
pub trait PrintEventSink: Send + Sync {
    fn record(&self, event: &PrintEvent);
}

/// Writes events to the tracing log
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl PrintEventSink for TracingEventSink {
    fn record(&self, event: &PrintEvent) {
        tracing::warn!(
            profile = %event.profile,
            error_kind = ?event.error_kind,
            transport_error = ?event.transport_error,
            "Print failure: {}",
            event.message
        );
    }
}

/// Keeps events in memory, for tests and diagnostics
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<PrintEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events recorded so far
    pub fn events(&self) -> Vec<PrintEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl PrintEventSink for MemoryEventSink {
    fn record(&self, event: &PrintEvent) {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printing::types::PrintErrorKind;
    use till_printer::TransportErrorKind;

    #[test]
    fn test_memory_sink_keeps_order() {
        let sink = MemoryEventSink::new();
        sink.record(&PrintEvent::new("front", PrintErrorKind::ConnectionFailed, "gone"));
        sink.record(
            &PrintEvent::new("back", PrintErrorKind::TransmissionFailed, "broken pipe")
                .with_transport_error(TransportErrorKind::IoFailure),
        );

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].profile, "front");
        assert_eq!(events[1].transport_error, Some(TransportErrorKind::IoFailure));
    }
}

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use super::SessionEvent;

/// Envelope wrapping a session event with metadata
#[derive(Debug, Clone)]
pub struct EventEnvelope {
    pub timestamp: DateTime<Utc>,
    pub event: SessionEvent,
}

/// Handle for emitting session events
///
/// This is cheaply cloneable. Events are sent through an async channel to
/// whatever the host attached to the receiving end.
#[derive(Debug, Clone)]
pub struct EventHandle {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventHandle {
    /// Create a new event handle from a channel sender
    pub fn new(tx: mpsc::Sender<EventEnvelope>) -> Self {
        Self { tx }
    }

    /// Emit an event asynchronously
    ///
    /// If the channel is closed, the error is logged but the caller is not failed.
    pub async fn emit(&self, event: SessionEvent) {
        let envelope = EventEnvelope {
            timestamp: Utc::now(),
            event,
        };
        if let Err(e) = self.tx.send(envelope).await {
            tracing::warn!("Failed to emit session event: {}", e);
        }
    }
}

/// Create an event handle and the receiver the host drains.
pub fn create_event_channel(buffer: usize) -> (EventHandle, mpsc::Receiver<EventEnvelope>) {
    let (tx, rx) = mpsc::channel(buffer);
    (EventHandle::new(tx), rx)
}

/// Emit through an optional handle.
pub(crate) async fn emit(handle: &Option<EventHandle>, event: SessionEvent) {
    if let Some(handle) = handle {
        handle.emit(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_emit_event() {
        let (handle, mut rx) = create_event_channel(10);

        handle.emit(SessionEvent::RoundStarted { round: 1 }).await;

        let envelope = rx.recv().await.expect("Should receive event");
        assert_eq!(envelope.event, SessionEvent::RoundStarted { round: 1 });
    }

    #[tokio::test]
    async fn test_multiple_handles_same_channel() {
        let (handle1, mut rx) = create_event_channel(10);
        let handle2 = handle1.clone();

        handle1.emit(SessionEvent::RoundStarted { round: 1 }).await;
        handle2
            .emit(SessionEvent::RoundCompleted {
                round: 1,
                outcome: "continue".to_string(),
            })
            .await;

        let e1 = rx.recv().await.expect("Should receive first event");
        let e2 = rx.recv().await.expect("Should receive second event");

        assert!(matches!(e1.event, SessionEvent::RoundStarted { .. }));
        assert!(matches!(e2.event, SessionEvent::RoundCompleted { .. }));
    }

    #[tokio::test]
    async fn test_emit_after_receiver_dropped_does_not_panic() {
        let (handle, rx) = create_event_channel(1);
        drop(rx);
        handle.emit(SessionEvent::RoundStarted { round: 1 }).await;
        handle.emit(SessionEvent::RoundStarted { round: 2 }).await;
    }

    #[tokio::test]
    async fn test_emit_optional_none_is_noop() {
        emit(&None, SessionEvent::RoundStarted { round: 1 }).await;
    }
}

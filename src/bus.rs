//! Event bus connecting source workers to the dispatcher.
//!
//! The bus is a pair of bounded channels: one for [`EventRecord`]s and one for
//! recoverable [`PipelineError`]s. Every source worker holds a cloned
//! [`BusSender`]; the dispatcher owns the single [`BusReceiver`]. The events
//! channel closes once every sender has been dropped, which is the normal
//! end-of-input signal for the dispatcher.
//!
//! Fatal worker failures travel on a separate channel (see [`fatal_channel`])
//! so the top-level process never competes with the dispatcher for
//! recoverable errors.

use tokio::sync::mpsc;

use crate::errors::{BusError, LifecycleError, PipelineError};
use crate::event::EventRecord;

/// Receiver for fatal worker failures, read only by the top-level process.
pub type FatalReceiver = mpsc::Receiver<LifecycleError>;

/// Sender for fatal worker failures.
pub type FatalSender = mpsc::Sender<LifecycleError>;

/// Writer half of the bus, cloned into each source worker.
#[derive(Clone)]
pub struct BusSender {
    events: mpsc::Sender<EventRecord>,
    errors: mpsc::Sender<PipelineError>,
}

/// Reader half of the bus, owned by the dispatcher.
pub struct BusReceiver {
    pub events: mpsc::Receiver<EventRecord>,
    pub errors: mpsc::Receiver<PipelineError>,
}

/// Creates the event bus with the given per-channel capacity.
pub fn channel(capacity: usize) -> (BusSender, BusReceiver) {
    let capacity = capacity.max(1);
    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (errors_tx, errors_rx) = mpsc::channel(capacity);

    (
        BusSender {
            events: events_tx,
            errors: errors_tx,
        },
        BusReceiver {
            events: events_rx,
            errors: errors_rx,
        },
    )
}

/// Creates the fatal channel. Only the first fatal failure is retained.
pub fn fatal_channel() -> (FatalSender, FatalReceiver) {
    mpsc::channel(1)
}

impl BusSender {
    /// Sends an event, waiting for capacity when the dispatcher is behind.
    pub async fn send_event(&self, event: EventRecord) -> Result<(), BusError> {
        self.events
            .send(event)
            .await
            .map_err(|_| BusError::Closed { channel: "events" })
    }

    /// Sends a recoverable error to the dispatcher's reporting path.
    pub async fn send_error(&self, error: impl Into<PipelineError>) -> Result<(), BusError> {
        self.errors
            .send(error.into())
            .await
            .map_err(|_| BusError::Closed { channel: "errors" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;
    use crate::event::ProviderKind;

    fn sample_event(id: &str) -> EventRecord {
        EventRecord::new(ProviderKind::Social, id, "text", "url", vec![], vec![])
    }

    #[tokio::test]
    async fn test_events_preserve_send_order() {
        let (sender, mut receiver) = channel(8);

        sender.send_event(sample_event("1")).await.unwrap();
        sender.send_event(sample_event("2")).await.unwrap();
        drop(sender);

        assert_eq!(receiver.events.recv().await.unwrap().id(), "1");
        assert_eq!(receiver.events.recv().await.unwrap().id(), "2");
        assert!(receiver.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_errors_flow_on_their_own_channel() {
        let (sender, mut receiver) = channel(8);

        sender
            .send_error(SourceError::NotImplemented {
                capability: "chat.rtm".to_string(),
            })
            .await
            .unwrap();

        assert!(receiver.events.try_recv().is_err());
        let error = receiver.errors.try_recv().unwrap();
        assert!(matches!(error, PipelineError::Source(_)));
    }

    #[tokio::test]
    async fn test_send_after_receiver_dropped_reports_closed() {
        let (sender, receiver) = channel(8);
        drop(receiver);

        let result = sender.send_event(sample_event("1")).await;
        assert!(matches!(
            result,
            Err(BusError::Closed { channel: "events" })
        ));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let (sender, _receiver) = channel(0);
        assert_eq!(sender.events.max_capacity(), 1);
    }
}

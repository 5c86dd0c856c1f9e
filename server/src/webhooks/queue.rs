//! Delivery Queue
//!
//! Bounded hand-off between HTTP workers and the single delivery consumer.
//! Enqueueing never blocks: when the queue is full the new delivery is dropped
//! so the webhook endpoint keeps answering promptly.

use tokio::sync::mpsc;
use tracing::warn;

use super::types::Delivery;

/// Default number of deliveries buffered ahead of the consumer.
pub const DEFAULT_CAPACITY: usize = 10;

/// Outcome of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued,
    /// Queue full, delivery discarded.
    Dropped,
    /// Consumer gone, delivery discarded.
    Closed,
}

/// Producer side of the delivery queue. Cheap to clone into every worker.
#[derive(Debug, Clone)]
pub struct DeliveryQueue {
    tx: mpsc::Sender<Delivery>,
}

impl DeliveryQueue {
    /// Create a queue holding at most `capacity` deliveries.
    ///
    /// Returns the producer handle and the receiver the consumer drains.
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Delivery>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Try to enqueue without waiting.
    pub fn try_enqueue(&self, delivery: Delivery) -> EnqueueOutcome {
        match self.tx.try_send(delivery) {
            Ok(()) => EnqueueOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(dropped)) => {
                warn!(
                    event = %dropped.kind,
                    delivery = dropped.delivery_id.as_deref().unwrap_or("unknown"),
                    "Delivery queue full, dropping event"
                );
                EnqueueOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(dropped)) => {
                warn!(
                    event = %dropped.kind,
                    "Delivery consumer stopped, dropping event"
                );
                EnqueueOutcome::Closed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn delivery(kind: &str) -> Delivery {
        Delivery {
            kind: kind.to_string(),
            delivery_id: None,
            body: Bytes::from_static(b"{}"),
        }
    }

    #[tokio::test]
    async fn drops_new_deliveries_when_full() {
        let (queue, mut rx) = DeliveryQueue::new(2);
        assert_eq!(queue.try_enqueue(delivery("push")), EnqueueOutcome::Queued);
        assert_eq!(queue.try_enqueue(delivery("issues")), EnqueueOutcome::Queued);
        assert_eq!(queue.try_enqueue(delivery("gollum")), EnqueueOutcome::Dropped);

        // FIFO, and the dropped delivery never shows up
        assert_eq!(rx.recv().await.unwrap().kind, "push");
        assert_eq!(rx.recv().await.unwrap().kind, "issues");
        assert!(rx.try_recv().is_err());

        assert_eq!(queue.try_enqueue(delivery("gollum")), EnqueueOutcome::Queued);
        assert_eq!(rx.recv().await.unwrap().kind, "gollum");
    }

    #[tokio::test]
    async fn reports_closed_consumer() {
        let (queue, rx) = DeliveryQueue::new(DEFAULT_CAPACITY);
        drop(rx);
        assert_eq!(queue.try_enqueue(delivery("push")), EnqueueOutcome::Closed);
    }
}

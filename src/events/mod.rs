use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Events emitted by the order and payment services.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated(Uuid),
    OrderConfirmed {
        order_id: Uuid,
        payment_id: String,
    },
    OrderCancelled(Uuid),
    OrderAbandoned(Uuid),
    /// A provider-side payment order was minted (nothing persisted
    /// locally; traceability only).
    PaymentOrderCreated {
        user_id: String,
        provider_order_id: String,
        amount_minor: i64,
    },
    /// A callback failed signature verification. Security event.
    PaymentVerificationFailed {
        provider_order_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously.
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Consumes events until the channel is closed. Spawned once at
/// startup; downstream integrations hang off this loop.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        match &event {
            Event::OrderConfirmed {
                order_id,
                payment_id,
            } => {
                info!(%order_id, %payment_id, "order confirmed");
            }
            Event::PaymentVerificationFailed { provider_order_id } => {
                warn!(%provider_order_id, "payment verification failed");
            }
            other => {
                info!(event = ?other, "event processed");
            }
        }
    }
    info!("event channel closed; processor exiting");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_flow_through_the_channel() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender
            .send(Event::OrderConfirmed {
                order_id,
                payment_id: "pay_123".to_string(),
            })
            .await
            .expect("send should succeed");

        match rx.recv().await {
            Some(Event::OrderConfirmed {
                order_id: got,
                payment_id,
            }) => {
                assert_eq!(got, order_id);
                assert_eq!(payment_id, "pay_123");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::OrderCreated(Uuid::new_v4()))
            .await
            .is_err());
    }
}

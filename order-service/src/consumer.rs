use futures::StreamExt;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::Message;
use shared::SettlementEvent;
use std::sync::Arc;
use tracing::{error, info};

use crate::clients::{FieldApi, PaymentApi};
use crate::orchestrator::OrderService;
use crate::store::OrderStore;

/// Receive loop for settlement events. Delivery is at-least-once: a message
/// is committed only after it has been fully applied or classified as
/// unprocessable, so transient failures are redelivered.
pub struct SettlementConsumer<S, F, P> {
    service: Arc<OrderService<S, F, P>>,
}

impl<S, F, P> SettlementConsumer<S, F, P>
where
    S: OrderStore,
    F: FieldApi,
    P: PaymentApi,
{
    pub fn new(service: Arc<OrderService<S, F, P>>) -> Self {
        Self { service }
    }

    pub async fn run(&self, consumer: StreamConsumer) {
        let mut message_stream = consumer.stream();

        while let Some(message) = message_stream.next().await {
            match message {
                Ok(m) => {
                    let commit = match m.payload_view::<str>() {
                        Some(Ok(json_str)) => self.process(json_str).await,
                        Some(Err(e)) => {
                            error!("Dropping non-utf8 settlement payload: {}", e);
                            true
                        }
                        None => {
                            error!("Dropping empty settlement message");
                            true
                        }
                    };

                    if commit {
                        if let Err(e) = consumer.commit_message(&m, CommitMode::Async) {
                            error!("Error committing message: {}", e);
                        }
                    }
                }
                Err(e) => error!("Error receiving message: {}", e),
            }
        }
    }

    /// Returns whether the message should be committed. Malformed payloads
    /// and non-retryable failures are dropped; retryable failures leave the
    /// message uncommitted for redelivery.
    async fn process(&self, payload: &str) -> bool {
        let event: SettlementEvent = match serde_json::from_str(payload) {
            Ok(event) => event,
            Err(e) => {
                error!("Dropping malformed settlement event: {}", e);
                return true;
            }
        };

        match self.service.handle_settlement(&event).await {
            Ok(()) => {
                info!(order = %event.order_id, "settlement event applied");
                true
            }
            Err(err) if err.is_retryable() => {
                error!(order = %event.order_id, "settlement failed, leaving for redelivery: {err}");
                false
            }
            Err(err) => {
                error!(order = %event.order_id, "dropping unprocessable settlement event: {err}");
                true
            }
        }
    }
}

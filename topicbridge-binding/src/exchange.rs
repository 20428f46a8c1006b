//! Publishing to topics and exchanging messages with queues

use std::sync::Arc;
use tracing::{info, warn};

use topicbridge_client::QueueTopicService;
use topicbridge_core::{
    validation, Ack, ExchangeError, ExchangeErrorKind, Message, Received, ServiceError,
};

/// Receives are bounded to a single message
const RECEIVE_BATCH: i32 = 1;

pub struct MessageExchange {
    service: Arc<dyn QueueTopicService>,
}

fn failed(kind: ExchangeErrorKind, err: ServiceError) -> ExchangeError {
    warn!(step = %kind, error = %err, "Message exchange failed");
    ExchangeError::new(kind, err)
}

impl MessageExchange {
    pub fn new(service: Arc<dyn QueueTopicService>) -> Self {
        Self { service }
    }

    /// Publish `body` to a topic as-is
    pub async fn publish(&self, topic_arn: &str, body: &str) -> Result<Ack, ExchangeError> {
        validation::require("topic ARN", topic_arn)
            .map_err(|e| failed(ExchangeErrorKind::InvalidInput, e))?;

        let ack = self
            .service
            .publish(topic_arn, body)
            .await
            .map_err(|e| failed(ExchangeErrorKind::PublishFailed, e))?;

        info!(topic = %topic_arn, message_id = %ack.message_id, "Published message");
        Ok(ack)
    }

    /// Send `body` straight to a queue as-is
    pub async fn send(&self, queue_address: &str, body: &str) -> Result<Ack, ExchangeError> {
        validation::require("queue address", queue_address)
            .map_err(|e| failed(ExchangeErrorKind::InvalidInput, e))?;

        let ack = self
            .service
            .send_message(queue_address, body)
            .await
            .map_err(|e| failed(ExchangeErrorKind::SendFailed, e))?;

        info!(queue = %queue_address, message_id = %ack.message_id, "Sent message");
        Ok(ack)
    }

    /// Receive at most one message and decode it
    ///
    /// The message is not deleted, so a later receive may return it again.
    pub async fn receive(&self, queue_address: &str) -> Result<Received, ExchangeError> {
        validation::require("queue address", queue_address)
            .map_err(|e| failed(ExchangeErrorKind::InvalidInput, e))?;

        let messages = self
            .service
            .receive_message(queue_address, RECEIVE_BATCH)
            .await
            .map_err(|e| failed(ExchangeErrorKind::ReceiveFailed, e))?;

        let Some(raw) = messages.into_iter().next() else {
            info!(queue = %queue_address, "No messages available");
            return Ok(Received::Empty);
        };

        let message = Message::from(raw);
        info!(queue = %queue_address, message_id = %message.id, "Received message");
        Ok(Received::Message(message))
    }
}

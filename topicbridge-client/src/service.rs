//! Queue/topic service contract

use async_trait::async_trait;
use topicbridge_core::{Ack, RawMessage, ServiceError, SubscriptionSummary, TopicSummary};

/// Queue attributes the binding core asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueAttributes {
    pub arn: String,
    /// Visible messages as reported by the service; zero when not reported
    pub approximate_messages: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicAttributes {
    pub display_name: Option<String>,
}

/// Operations of the external queue and topic services
///
/// Implementations report every failure as a classified [`ServiceError`];
/// callers only branch on `NotFound` from [`get_queue_url`](Self::get_queue_url).
#[async_trait]
pub trait QueueTopicService: Send + Sync {
    /// List the addresses of all queues
    async fn list_queues(&self) -> Result<Vec<String>, ServiceError>;

    /// Resolve a queue's address by name
    async fn get_queue_url(&self, name: &str) -> Result<String, ServiceError>;

    /// Create a queue and return its address
    async fn create_queue(&self, name: &str) -> Result<String, ServiceError>;

    async fn delete_queue(&self, address: &str) -> Result<(), ServiceError>;

    /// Fetch the ARN and depth of the queue at `address`
    async fn get_queue_attributes(&self, address: &str) -> Result<QueueAttributes, ServiceError>;

    async fn send_message(&self, address: &str, body: &str) -> Result<Ack, ServiceError>;

    /// Receive up to `max_count` messages without deleting them
    async fn receive_message(
        &self,
        address: &str,
        max_count: i32,
    ) -> Result<Vec<RawMessage>, ServiceError>;

    async fn list_topics(&self) -> Result<Vec<TopicSummary>, ServiceError>;

    /// Create a topic and return its ARN
    async fn create_topic(&self, name: &str) -> Result<String, ServiceError>;

    async fn get_topic_attributes(&self, topic_arn: &str) -> Result<TopicAttributes, ServiceError>;

    /// Subscribe `endpoint_arn` to a topic and return the subscription ARN
    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint_arn: &str,
    ) -> Result<String, ServiceError>;

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), ServiceError>;

    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<SubscriptionSummary>, ServiceError>;

    async fn publish(&self, topic_arn: &str, body: &str) -> Result<Ack, ServiceError>;
}

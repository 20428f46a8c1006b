//! In-memory queue/topic service
//!
//! Behaves like a local emulator: queue URLs carry an advertised host that is
//! not necessarily reachable, topic deliveries to queues are wrapped in a
//! notification envelope, and received messages are not removed.

use async_trait::async_trait;
use dashmap::DashMap;
use md5::{Digest, Md5};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::info;

use topicbridge_client::{QueueAttributes, QueueTopicService, TopicAttributes};
use topicbridge_core::{
    queue_name_from_address, validation, Ack, Envelope, RawMessage, ServiceError,
    SubscriptionSummary, TopicSummary, LOCAL_ACCOUNT_ID, QUEUE_PROTOCOL,
};

/// Host the in-memory service writes into queue URLs by default
pub const DEFAULT_ADVERTISED_HOST: &str = "sqs.us-east-1.localhost.localstack.cloud:4566";

const KNOWN_PROTOCOLS: [&str; 5] = ["sqs", "http", "https", "email", "lambda"];

/// Service operation, used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListQueues,
    GetQueueUrl,
    CreateQueue,
    DeleteQueue,
    GetQueueAttributes,
    SendMessage,
    ReceiveMessage,
    ListTopics,
    CreateTopic,
    GetTopicAttributes,
    Subscribe,
    Unsubscribe,
    ListSubscriptionsByTopic,
    Publish,
}

#[derive(Debug, Clone)]
struct Queue {
    url: String,
    arn: String,
}

#[derive(Debug, Clone)]
struct StoredMessage {
    message_id: String,
    body: String,
    md5_of_body: String,
}

impl StoredMessage {
    fn new(body: String) -> Self {
        Self {
            message_id: uuid::Uuid::new_v4().to_string(),
            md5_of_body: md5_hex(&body),
            body,
        }
    }
}

fn md5_hex(body: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(body.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone)]
struct Topic {
    arn: String,
    display_name: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredSubscription {
    subscription_arn: String,
    protocol: String,
    endpoint: String,
}

/// In-memory [`QueueTopicService`] with failure injection
#[derive(Debug)]
pub struct MemoryService {
    advertised_host: String,
    region: String,
    idempotent_subscribe: bool,
    queues: DashMap<String, Queue>,
    messages: DashMap<String, VecDeque<StoredMessage>>,
    topics: DashMap<String, Topic>,
    subscriptions: DashMap<String, Vec<StoredSubscription>>,
    failures: Mutex<HashMap<Operation, VecDeque<ServiceError>>>,
    calls: DashMap<Operation, usize>,
}

impl Default for MemoryService {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryService {
    pub fn new() -> Self {
        Self::with_advertised_host(DEFAULT_ADVERTISED_HOST)
    }

    /// Service whose queue URLs use `host` as their authority
    pub fn with_advertised_host(host: impl Into<String>) -> Self {
        Self {
            advertised_host: host.into(),
            region: "us-east-1".to_string(),
            idempotent_subscribe: false,
            queues: DashMap::new(),
            messages: DashMap::new(),
            topics: DashMap::new(),
            subscriptions: DashMap::new(),
            failures: Mutex::new(HashMap::new()),
            calls: DashMap::new(),
        }
    }

    /// Return the existing subscription ARN when the same endpoint subscribes
    /// twice, as SNS does, instead of recording a second subscription
    pub fn idempotent_subscribe(mut self) -> Self {
        self.idempotent_subscribe = true;
        self
    }

    /// Fail the next call of `operation` with `error`
    ///
    /// Failures queue up per operation and are consumed in order.
    pub fn fail_next(&self, operation: Operation, error: ServiceError) {
        self.failures
            .lock()
            .entry(operation)
            .or_default()
            .push_back(error);
    }

    /// Number of times `operation` has been invoked, failed calls included
    pub fn calls(&self, operation: Operation) -> usize {
        self.calls.get(&operation).map_or(0, |c| *c)
    }

    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Number of messages currently held by the queue called `name`
    pub fn message_count(&self, name: &str) -> usize {
        self.messages.get(name).map_or(0, |m| m.len())
    }

    pub fn subscription_count(&self, topic_arn: &str) -> usize {
        self.subscriptions
            .get(topic_name_from_arn(topic_arn))
            .map_or(0, |s| s.len())
    }

    pub fn set_topic_display_name(&self, topic_arn: &str, display_name: &str) {
        if let Some(mut topic) = self.topics.get_mut(topic_name_from_arn(topic_arn)) {
            topic.display_name = Some(display_name.to_string());
        }
    }

    fn enter(&self, operation: Operation) -> Result<(), ServiceError> {
        *self.calls.entry(operation).or_insert(0) += 1;

        let injected = self
            .failures
            .lock()
            .get_mut(&operation)
            .and_then(VecDeque::pop_front);

        match injected {
            Some(err) => {
                info!(operation = ?operation, error = %err, "Injected failure");
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn queue_url(&self, name: &str) -> String {
        format!("http://{}/{}/{}", self.advertised_host, LOCAL_ACCOUNT_ID, name)
    }

    fn queue_arn(&self, name: &str) -> String {
        format!("arn:aws:sqs:{}:{}:{}", self.region, LOCAL_ACCOUNT_ID, name)
    }

    fn topic_arn(&self, name: &str) -> String {
        format!("arn:aws:sns:{}:{}:{}", self.region, LOCAL_ACCOUNT_ID, name)
    }

    fn existing_queue(&self, address: &str) -> Result<(String, Queue), ServiceError> {
        let name = queue_name_from_address(address);
        self.queues
            .get(name)
            .map(|q| (name.to_string(), q.value().clone()))
            .ok_or_else(|| ServiceError::NotFound(format!("queue does not exist: {address}")))
    }

    fn existing_topic(&self, topic_arn: &str) -> Result<(String, Topic), ServiceError> {
        let name = topic_name_from_arn(topic_arn);
        self.topics
            .get(name)
            .map(|t| (name.to_string(), t.value().clone()))
            .ok_or_else(|| ServiceError::NotFound(format!("topic does not exist: {topic_arn}")))
    }

    fn queue_name_for_arn(&self, arn: &str) -> Option<String> {
        self.queues
            .iter()
            .find(|q| q.value().arn == arn)
            .map(|q| q.key().clone())
    }
}

/// Topics are keyed by the last ARN segment, so `topic:orders` and the full
/// ARN of `orders` name the same topic
fn topic_name_from_arn(arn: &str) -> &str {
    arn.rsplit(':').next().unwrap_or(arn)
}

#[async_trait]
impl QueueTopicService for MemoryService {
    async fn list_queues(&self) -> Result<Vec<String>, ServiceError> {
        self.enter(Operation::ListQueues)?;
        let mut urls: Vec<String> = self.queues.iter().map(|q| q.value().url.clone()).collect();
        urls.sort();
        Ok(urls)
    }

    async fn get_queue_url(&self, name: &str) -> Result<String, ServiceError> {
        self.enter(Operation::GetQueueUrl)?;
        self.queues
            .get(name)
            .map(|q| q.value().url.clone())
            .ok_or_else(|| ServiceError::NotFound(format!("queue does not exist: {name}")))
    }

    async fn create_queue(&self, name: &str) -> Result<String, ServiceError> {
        self.enter(Operation::CreateQueue)?;
        validation::validate_queue_name(name)?;

        if let Some(existing) = self.queues.get(name) {
            return Ok(existing.url.clone());
        }

        let queue = Queue {
            url: self.queue_url(name),
            arn: self.queue_arn(name),
        };
        info!(name = %name, url = %queue.url, "Creating queue");
        let url = queue.url.clone();
        self.queues.insert(name.to_string(), queue);
        self.messages.insert(name.to_string(), VecDeque::new());
        Ok(url)
    }

    async fn delete_queue(&self, address: &str) -> Result<(), ServiceError> {
        self.enter(Operation::DeleteQueue)?;
        let (name, _) = self.existing_queue(address)?;

        info!(name = %name, "Deleting queue");
        self.queues.remove(&name);
        self.messages.remove(&name);
        Ok(())
    }

    async fn get_queue_attributes(&self, address: &str) -> Result<QueueAttributes, ServiceError> {
        self.enter(Operation::GetQueueAttributes)?;
        let (name, queue) = self.existing_queue(address)?;
        Ok(QueueAttributes {
            arn: queue.arn,
            approximate_messages: self.message_count(&name) as u64,
        })
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<Ack, ServiceError> {
        self.enter(Operation::SendMessage)?;
        let (name, _) = self.existing_queue(address)?;

        let message = StoredMessage::new(body.to_string());
        let message_id = message.message_id.clone();
        if let Some(mut messages) = self.messages.get_mut(&name) {
            messages.push_back(message);
        }

        info!(queue = %name, message_id = %message_id, "Sent message");
        Ok(Ack { message_id })
    }

    async fn receive_message(
        &self,
        address: &str,
        max_count: i32,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        self.enter(Operation::ReceiveMessage)?;
        let (name, _) = self.existing_queue(address)?;

        if !(1..=10).contains(&max_count) {
            return Err(ServiceError::Validation(format!(
                "MaxNumberOfMessages must be between 1 and 10, got {max_count}"
            )));
        }

        let mut received = Vec::new();
        if let Some(mut messages) = self.messages.get_mut(&name) {
            let take = usize::try_from(max_count).unwrap_or(1).min(messages.len());
            for _ in 0..take {
                if let Some(message) = messages.pop_front() {
                    received.push(message);
                }
            }

            // No visibility timeout: received messages stay available
            for message in &received {
                messages.push_back(message.clone());
            }
        }

        info!(queue = %name, count = received.len(), "Received messages");
        Ok(received
            .into_iter()
            .map(|m| RawMessage {
                message_id: m.message_id,
                body: m.body,
                md5_of_body: Some(m.md5_of_body),
            })
            .collect())
    }

    async fn list_topics(&self) -> Result<Vec<TopicSummary>, ServiceError> {
        self.enter(Operation::ListTopics)?;
        let mut topics: Vec<TopicSummary> = self
            .topics
            .iter()
            .map(|t| TopicSummary {
                arn: t.value().arn.clone(),
            })
            .collect();
        topics.sort_by(|a, b| a.arn.cmp(&b.arn));
        Ok(topics)
    }

    async fn create_topic(&self, name: &str) -> Result<String, ServiceError> {
        self.enter(Operation::CreateTopic)?;
        validation::validate_topic_name(name)?;

        if let Some(existing) = self.topics.get(name) {
            return Ok(existing.arn.clone());
        }

        let arn = self.topic_arn(name);
        info!(name = %name, arn = %arn, "Creating topic");
        self.topics.insert(
            name.to_string(),
            Topic {
                arn: arn.clone(),
                display_name: None,
            },
        );
        self.subscriptions.insert(name.to_string(), Vec::new());
        Ok(arn)
    }

    async fn get_topic_attributes(&self, topic_arn: &str) -> Result<TopicAttributes, ServiceError> {
        self.enter(Operation::GetTopicAttributes)?;
        let (_, topic) = self.existing_topic(topic_arn)?;
        Ok(TopicAttributes {
            display_name: topic.display_name,
        })
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint_arn: &str,
    ) -> Result<String, ServiceError> {
        self.enter(Operation::Subscribe)?;
        let (name, topic) = self.existing_topic(topic_arn)?;

        let protocol = protocol.to_lowercase();
        if !KNOWN_PROTOCOLS.contains(&protocol.as_str()) {
            return Err(ServiceError::Validation(format!("unsupported protocol: {protocol}")));
        }
        if endpoint_arn.is_empty() {
            return Err(ServiceError::Validation("endpoint must not be empty".to_string()));
        }

        let mut subs = self.subscriptions.entry(name.clone()).or_default();

        if self.idempotent_subscribe {
            if let Some(existing) = subs
                .iter()
                .find(|s| s.protocol == protocol && s.endpoint == endpoint_arn)
            {
                return Ok(existing.subscription_arn.clone());
            }
        }

        let subscription_arn = format!("{}:{}", topic.arn, uuid::Uuid::new_v4());
        subs.push(StoredSubscription {
            subscription_arn: subscription_arn.clone(),
            protocol: protocol.clone(),
            endpoint: endpoint_arn.to_string(),
        });

        info!(topic = %name, protocol = %protocol, endpoint = %endpoint_arn, "Subscribed");
        Ok(subscription_arn)
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), ServiceError> {
        self.enter(Operation::Unsubscribe)?;

        for mut subs in self.subscriptions.iter_mut() {
            let original_len = subs.len();
            subs.retain(|s| s.subscription_arn != subscription_arn);
            if subs.len() != original_len {
                info!(arn = %subscription_arn, "Unsubscribed");
                return Ok(());
            }
        }

        Err(ServiceError::NotFound(format!(
            "subscription does not exist: {subscription_arn}"
        )))
    }

    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<SubscriptionSummary>, ServiceError> {
        self.enter(Operation::ListSubscriptionsByTopic)?;
        let (name, _) = self.existing_topic(topic_arn)?;

        Ok(self
            .subscriptions
            .get(&name)
            .map(|subs| {
                subs.iter()
                    .map(|s| SubscriptionSummary {
                        endpoint_arn: s.endpoint.clone(),
                        subscription_arn: s.subscription_arn.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn publish(&self, topic_arn: &str, body: &str) -> Result<Ack, ServiceError> {
        self.enter(Operation::Publish)?;
        let (name, topic) = self.existing_topic(topic_arn)?;

        let message_id = uuid::Uuid::new_v4().to_string();
        let subscriptions = self
            .subscriptions
            .get(&name)
            .map(|s| s.clone())
            .unwrap_or_default();

        let envelope = Envelope::notification(message_id.clone(), topic.arn.clone(), body);
        let payload = serde_json::to_string(&envelope)
            .map_err(|e| ServiceError::Transport(format!("failed to encode envelope: {e}")))?;

        let mut delivered = 0;
        for sub in subscriptions.iter().filter(|s| s.protocol == QUEUE_PROTOCOL) {
            let Some(queue_name) = self.queue_name_for_arn(&sub.endpoint) else {
                continue;
            };
            if let Some(mut messages) = self.messages.get_mut(&queue_name) {
                messages.push_back(StoredMessage::new(payload.clone()));
                delivered += 1;
            }
        }

        info!(topic = %name, message_id = %message_id, delivered, "Published message");
        Ok(Ack { message_id })
    }
}

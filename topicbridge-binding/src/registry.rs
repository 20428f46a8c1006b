//! Cached view of queues, topics and subscriptions
//!
//! Every refresh re-lists from the service and swaps the cached collection in
//! one write, so readers see either the old or the new snapshot. Nothing is
//! diffed: changes made elsewhere only show up after the next refresh.

use futures::future::try_join_all;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use topicbridge_client::QueueTopicService;
use topicbridge_core::{
    normalize, queue_name_from_address, QueueResource, RegistryError, RegistryErrorKind,
    ServiceError, Subscription, TopicResource,
};

pub struct ResourceRegistry {
    service: Arc<dyn QueueTopicService>,
    local_host: String,
    queues: RwLock<BTreeMap<String, QueueResource>>,
    topics: RwLock<BTreeMap<String, TopicResource>>,
    subscriptions: RwLock<HashMap<String, Vec<Subscription>>>,
}

fn list_failed(err: ServiceError) -> RegistryError {
    warn!(error = %err, "Listing failed");
    RegistryError::new(RegistryErrorKind::ListFailed, err)
}

fn describe_failed(err: ServiceError) -> RegistryError {
    warn!(error = %err, "Describing resource failed");
    RegistryError::new(RegistryErrorKind::DescribeFailed, err)
}

impl ResourceRegistry {
    /// Empty registry; queue addresses are normalized to `local_host`
    pub fn new(service: Arc<dyn QueueTopicService>, local_host: impl Into<String>) -> Self {
        Self {
            service,
            local_host: local_host.into(),
            queues: RwLock::new(BTreeMap::new()),
            topics: RwLock::new(BTreeMap::new()),
            subscriptions: RwLock::new(HashMap::new()),
        }
    }

    pub fn local_host(&self) -> &str {
        &self.local_host
    }

    // === Refresh ===

    /// Re-list all queues and replace the cached queue map
    pub async fn refresh_queues(&self) -> Result<Vec<QueueResource>, RegistryError> {
        let addresses = self.service.list_queues().await.map_err(list_failed)?;

        let described = try_join_all(addresses.iter().map(|address| async move {
            match self.describe_queue(address).await {
                Ok(queue) => Ok(Some(queue)),
                // Deleted between the listing and the attribute lookup
                Err(err) if err.is_not_found() => {
                    debug!(address = %address, "Queue vanished during refresh");
                    Ok(None)
                }
                Err(err) => Err(describe_failed(err)),
            }
        }))
        .await?;

        let queues: Vec<QueueResource> = described.into_iter().flatten().collect();
        let snapshot = queues
            .iter()
            .map(|q| (q.name.clone(), q.clone()))
            .collect();
        *self.queues.write() = snapshot;

        info!(count = queues.len(), "Refreshed queues");
        Ok(queues)
    }

    /// Re-list all topics, looking up each display name, and replace the
    /// cached topic map
    pub async fn refresh_topics(&self) -> Result<Vec<TopicResource>, RegistryError> {
        let summaries = self.service.list_topics().await.map_err(list_failed)?;

        let described = try_join_all(summaries.into_iter().map(|summary| async move {
            match self.service.get_topic_attributes(&summary.arn).await {
                Ok(attrs) => Ok(Some(TopicResource::new(summary.arn, attrs.display_name))),
                Err(err) if err.is_not_found() => {
                    debug!(arn = %summary.arn, "Topic vanished during refresh");
                    Ok(None)
                }
                Err(err) => Err(describe_failed(err)),
            }
        }))
        .await?;

        let topics: Vec<TopicResource> = described.into_iter().flatten().collect();
        let snapshot = topics
            .iter()
            .map(|t| (t.arn.clone(), t.clone()))
            .collect();
        *self.topics.write() = snapshot;

        info!(count = topics.len(), "Refreshed topics");
        Ok(topics)
    }

    /// Re-list one topic's subscriptions and replace its cached list
    pub async fn refresh_subscriptions(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<Subscription>, RegistryError> {
        let subscriptions = self.fetch_subscriptions(topic_arn).await?;
        self.subscriptions
            .write()
            .insert(topic_arn.to_string(), subscriptions.clone());

        info!(topic = %topic_arn, count = subscriptions.len(), "Refreshed subscriptions");
        Ok(subscriptions)
    }

    /// Refresh queues and topics concurrently, then every topic's
    /// subscriptions, replacing the whole subscription map
    pub async fn refresh_all(&self) -> Result<(), RegistryError> {
        let (_, topics) = futures::try_join!(self.refresh_queues(), self.refresh_topics())?;

        let lists = try_join_all(topics.iter().map(|topic| async move {
            let subscriptions = self.fetch_subscriptions(&topic.arn).await?;
            Ok::<_, RegistryError>((topic.arn.clone(), subscriptions))
        }))
        .await?;

        *self.subscriptions.write() = lists.into_iter().collect();
        Ok(())
    }

    async fn fetch_subscriptions(&self, topic_arn: &str) -> Result<Vec<Subscription>, RegistryError> {
        let summaries = self
            .service
            .list_subscriptions_by_topic(topic_arn)
            .await
            .map_err(list_failed)?;

        Ok(summaries
            .into_iter()
            .map(|s| Subscription {
                subscription_arn: s.subscription_arn,
                topic_arn: topic_arn.to_string(),
                endpoint_arn: s.endpoint_arn,
            })
            .collect())
    }

    /// Build the registry entry for a queue at its service-reported address
    pub(crate) async fn describe_queue(
        &self,
        reported_address: &str,
    ) -> Result<QueueResource, ServiceError> {
        let address = normalize(reported_address, &self.local_host);
        let attrs = self.service.get_queue_attributes(&address).await?;
        Ok(QueueResource {
            name: queue_name_from_address(&address).to_string(),
            address,
            arn: attrs.arn,
            approximate_messages: attrs.approximate_messages,
        })
    }

    // === Snapshots ===

    /// Known queues ordered by name
    pub fn queues(&self) -> Vec<QueueResource> {
        self.queues.read().values().cloned().collect()
    }

    pub fn queue(&self, name: &str) -> Option<QueueResource> {
        self.queues.read().get(name).cloned()
    }

    /// Known topics ordered by ARN
    pub fn topics(&self) -> Vec<TopicResource> {
        self.topics.read().values().cloned().collect()
    }

    pub fn topic(&self, arn: &str) -> Option<TopicResource> {
        self.topics.read().get(arn).cloned()
    }

    /// Subscriptions recorded for a topic, in recording order
    pub fn subscriptions(&self, topic_arn: &str) -> Vec<Subscription> {
        self.subscriptions
            .read()
            .get(topic_arn)
            .cloned()
            .unwrap_or_default()
    }

    /// Number of subscriptions recorded for a topic
    pub fn subscriber_count(&self, topic_arn: &str) -> usize {
        self.subscriptions.read().get(topic_arn).map_or(0, Vec::len)
    }

    // === Mutation ===

    /// Append a subscription to its topic's list
    pub fn record_subscription(&self, subscription: Subscription) {
        self.subscriptions
            .write()
            .entry(subscription.topic_arn.clone())
            .or_default()
            .push(subscription);
    }

    /// Drop exactly the entry with `subscription_arn` from the topic's list
    ///
    /// Returns whether an entry was removed.
    pub fn remove_subscription(&self, topic_arn: &str, subscription_arn: &str) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let Some(list) = subscriptions.get_mut(topic_arn) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.subscription_arn != subscription_arn);
        list.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicbridge_test::{MemoryService, Operation, LOCAL_HOST};

    fn registry(service: &Arc<MemoryService>) -> ResourceRegistry {
        ResourceRegistry::new(service.clone(), LOCAL_HOST)
    }

    fn subscription(arn: &str, topic: &str) -> Subscription {
        Subscription {
            subscription_arn: arn.to_string(),
            topic_arn: topic.to_string(),
            endpoint_arn: format!("{arn}-endpoint"),
        }
    }

    #[tokio::test]
    async fn test_refresh_queues_normalizes_addresses() {
        let service = Arc::new(MemoryService::new());
        service.create_queue("orders").await.unwrap();
        let registry = registry(&service);

        let queues = registry.refresh_queues().await.unwrap();

        assert_eq!(queues.len(), 1);
        let orders = registry.queue("orders").unwrap();
        assert_eq!(orders.address, "http://localhost:4566/000000000000/orders");
        assert_eq!(orders.arn, "arn:aws:sqs:us-east-1:000000000000:orders");
    }

    #[tokio::test]
    async fn test_refresh_queues_reports_depth() {
        let service = Arc::new(MemoryService::new());
        let orders = service.create_queue("orders").await.unwrap();
        service.create_queue("audit").await.unwrap();
        for body in ["a", "b", "c"] {
            service.send_message(&orders, body).await.unwrap();
        }
        let registry = registry(&service);

        registry.refresh_queues().await.unwrap();

        assert_eq!(registry.queue("orders").unwrap().approximate_messages, 3);
        assert_eq!(registry.queue("audit").unwrap().approximate_messages, 0);
        assert_eq!(service.message_count("orders"), 3);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let service = Arc::new(MemoryService::new());
        service.create_queue("orders").await.unwrap();
        let registry = registry(&service);
        registry.refresh_queues().await.unwrap();

        service.create_queue("payments").await.unwrap();
        service.fail_next(
            Operation::GetQueueAttributes,
            ServiceError::Transport("connection reset".to_string()),
        );
        let err = registry.refresh_queues().await.unwrap_err();

        assert_eq!(err.kind, RegistryErrorKind::DescribeFailed);
        assert_eq!(registry.queues().len(), 1);
        assert!(registry.queue("payments").is_none());
    }

    #[tokio::test]
    async fn test_refresh_topics_uses_display_name() {
        let service = Arc::new(MemoryService::new());
        let named = service.create_topic("orders-topic").await.unwrap();
        let plain = service.create_topic("audit").await.unwrap();
        service.set_topic_display_name(&named, "Orders");
        let registry = registry(&service);

        registry.refresh_topics().await.unwrap();

        assert_eq!(registry.topic(&named).unwrap().name, "Orders");
        assert_eq!(registry.topic(&plain).unwrap().name, "audit");
        assert_eq!(service.calls(Operation::GetTopicAttributes), 2);
    }

    #[tokio::test]
    async fn test_refresh_all_rebuilds_subscriptions() {
        let service = Arc::new(MemoryService::new());
        let topic = service.create_topic("orders-topic").await.unwrap();
        service.subscribe(&topic, "sqs", "arn:q1").await.unwrap();
        service.subscribe(&topic, "sqs", "arn:q2").await.unwrap();
        let registry = registry(&service);
        registry.record_subscription(subscription("stale", "arn:gone-topic"));

        registry.refresh_all().await.unwrap();

        let subs = registry.subscriptions(&topic);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].endpoint_arn, "arn:q1");
        assert!(registry.subscriptions("arn:gone-topic").is_empty());
    }

    #[tokio::test]
    async fn test_subscriber_counts_per_topic() {
        let service = Arc::new(MemoryService::new());
        let orders = service.create_topic("orders-topic").await.unwrap();
        let audit = service.create_topic("audit").await.unwrap();
        service.subscribe(&orders, "sqs", "arn:q1").await.unwrap();
        service.subscribe(&orders, "sqs", "arn:q2").await.unwrap();
        let registry = registry(&service);

        registry.refresh_all().await.unwrap();

        assert_eq!(registry.subscriber_count(&orders), 2);
        assert_eq!(registry.subscriber_count(&audit), 0);
        assert_eq!(registry.subscriber_count("arn:unknown"), 0);
    }

    #[test]
    fn test_remove_subscription_is_precise() {
        let service = Arc::new(MemoryService::new());
        let registry = registry(&service);
        for arn in ["s1", "s2", "s3"] {
            registry.record_subscription(subscription(arn, "t"));
        }
        registry.record_subscription(subscription("s2", "other"));

        assert!(registry.remove_subscription("t", "s2"));

        let remaining: Vec<_> = registry
            .subscriptions("t")
            .into_iter()
            .map(|s| s.subscription_arn)
            .collect();
        assert_eq!(remaining, ["s1", "s3"]);
        assert_eq!(registry.subscriptions("other").len(), 1);
        assert!(!registry.remove_subscription("t", "s2"));
        assert!(!registry.remove_subscription("missing", "s1"));
    }
}

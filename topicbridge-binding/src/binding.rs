//! Binding queues to topics
//!
//! A bind walks QueueLookup -> QueueCreate (only on `NotFound`) ->
//! AddressNormalize -> ArnResolve -> Subscribe. The first failing step ends
//! the bind with a [`BindError`] naming that step; earlier effects such as a
//! freshly created queue are left in place.

use std::sync::Arc;
use tracing::{debug, info, warn};

use topicbridge_client::QueueTopicService;
use topicbridge_core::{
    normalize, validation, BindError, BindErrorKind, BindingConfig, DuplicatePolicy,
    ServiceError, Subscription, QUEUE_PROTOCOL,
};

use crate::registry::ResourceRegistry;

pub struct BindingOrchestrator {
    service: Arc<dyn QueueTopicService>,
    registry: Arc<ResourceRegistry>,
    config: BindingConfig,
}

fn failed(kind: BindErrorKind, err: ServiceError) -> BindError {
    warn!(step = %kind, error = %err, "Bind failed");
    BindError::new(kind, err)
}

impl BindingOrchestrator {
    pub fn new(
        service: Arc<dyn QueueTopicService>,
        registry: Arc<ResourceRegistry>,
        config: BindingConfig,
    ) -> Self {
        Self {
            service,
            registry,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }

    /// Subscribe the queue called `queue_name` to `topic_arn`, creating the
    /// queue if it does not exist yet
    ///
    /// Repeating a bind never creates a second queue. Under
    /// [`DuplicatePolicy::Allow`] it may create a second subscription.
    pub async fn bind_queue_to_topic(
        &self,
        queue_name: &str,
        topic_arn: &str,
    ) -> Result<Subscription, BindError> {
        validation::validate_queue_name(queue_name)
            .and_then(|()| validation::require("topic ARN", topic_arn))
            .map_err(|e| failed(BindErrorKind::InvalidInput, e))?;

        let reported = self.lookup_or_create_queue(queue_name).await?;
        let address = normalize(&reported, self.registry.local_host());
        debug!(queue = %queue_name, reported = %reported, address = %address, "Normalized queue address");

        let queue_arn = self
            .service
            .get_queue_attributes(&address)
            .await
            .map_err(|e| failed(BindErrorKind::ArnResolveFailed, e))?
            .arn;

        if self.config.duplicate_policy == DuplicatePolicy::Reject {
            self.ensure_not_subscribed(&queue_arn, topic_arn).await?;
        }

        let subscription_arn = self
            .service
            .subscribe(topic_arn, QUEUE_PROTOCOL, &queue_arn)
            .await
            .map_err(|e| failed(BindErrorKind::SubscribeFailed, e))?;

        let subscription = Subscription {
            subscription_arn,
            topic_arn: topic_arn.to_string(),
            endpoint_arn: queue_arn,
        };
        self.registry.record_subscription(subscription.clone());

        info!(
            queue = %queue_name,
            topic = %topic_arn,
            subscription = %subscription.subscription_arn,
            "Bound queue to topic"
        );
        Ok(subscription)
    }

    /// Resolve the queue's reported address, creating the queue only when the
    /// lookup says it does not exist
    async fn lookup_or_create_queue(&self, queue_name: &str) -> Result<String, BindError> {
        match self.service.get_queue_url(queue_name).await {
            Ok(address) => Ok(address),
            Err(err) if err.is_not_found() => {
                debug!(queue = %queue_name, "Queue not found, creating it");
                let address = self
                    .service
                    .create_queue(queue_name)
                    .await
                    .map_err(|e| failed(BindErrorKind::CreateFailed, e))?;
                info!(queue = %queue_name, address = %address, "Created queue for binding");
                Ok(address)
            }
            Err(err) => Err(failed(BindErrorKind::LookupFailed, err)),
        }
    }

    /// Re-list the topic's subscriptions and fail if the queue is already on it
    ///
    /// Not atomic with the subscribe that follows; two concurrent binds can
    /// still both pass.
    async fn ensure_not_subscribed(&self, queue_arn: &str, topic_arn: &str) -> Result<(), BindError> {
        let existing = self
            .registry
            .refresh_subscriptions(topic_arn)
            .await
            .map_err(|e| failed(BindErrorKind::SubscribeFailed, e.source))?;

        match existing.iter().find(|s| s.endpoint_arn == queue_arn) {
            Some(duplicate) => Err(failed(
                BindErrorKind::DuplicateSubscription,
                ServiceError::Conflict(format!(
                    "{queue_arn} is already subscribed to {topic_arn} as {}",
                    duplicate.subscription_arn
                )),
            )),
            None => Ok(()),
        }
    }

    /// Remove one subscription, first from the service and then from the
    /// registry
    pub async fn unsubscribe(&self, subscription_arn: &str, topic_arn: &str) -> Result<(), BindError> {
        validation::require("subscription ARN", subscription_arn)
            .and_then(|()| validation::require("topic ARN", topic_arn))
            .map_err(|e| failed(BindErrorKind::InvalidInput, e))?;

        self.service
            .unsubscribe(subscription_arn)
            .await
            .map_err(|e| failed(BindErrorKind::UnsubscribeFailed, e))?;

        let removed = self.registry.remove_subscription(topic_arn, subscription_arn);
        info!(subscription = %subscription_arn, topic = %topic_arn, cached = removed, "Unsubscribed");
        Ok(())
    }
}

//! Queue and topic administration
//!
//! Each mutation goes to the service first and is followed by a re-list of
//! the affected collection. Nothing is rolled back when a later step fails.

use std::sync::Arc;
use tracing::{info, warn};

use topicbridge_client::QueueTopicService;
use topicbridge_core::{
    validation, QueueResource, RegistryError, RegistryErrorKind, ServiceError, TopicResource,
};

use crate::registry::ResourceRegistry;

pub struct ResourceAdmin {
    service: Arc<dyn QueueTopicService>,
    registry: Arc<ResourceRegistry>,
}

fn failed(kind: RegistryErrorKind, err: ServiceError) -> RegistryError {
    warn!(step = %kind, error = %err, "Admin operation failed");
    RegistryError::new(kind, err)
}

impl ResourceAdmin {
    pub fn new(service: Arc<dyn QueueTopicService>, registry: Arc<ResourceRegistry>) -> Self {
        Self { service, registry }
    }

    /// Create a queue (or return the existing one of that name) with a
    /// locally reachable address
    pub async fn create_queue(&self, name: &str) -> Result<QueueResource, RegistryError> {
        validation::validate_queue_name(name)
            .map_err(|e| failed(RegistryErrorKind::InvalidInput, e))?;

        let reported = self
            .service
            .create_queue(name)
            .await
            .map_err(|e| failed(RegistryErrorKind::CreateFailed, e))?;

        let queue = self
            .registry
            .describe_queue(&reported)
            .await
            .map_err(|e| failed(RegistryErrorKind::DescribeFailed, e))?;
        info!(name = %queue.name, address = %queue.address, arn = %queue.arn, "Created queue");

        self.registry.refresh_queues().await?;
        Ok(queue)
    }

    pub async fn delete_queue(&self, address: &str) -> Result<(), RegistryError> {
        validation::require("queue address", address)
            .map_err(|e| failed(RegistryErrorKind::InvalidInput, e))?;

        self.service
            .delete_queue(address)
            .await
            .map_err(|e| failed(RegistryErrorKind::DeleteFailed, e))?;
        info!(address = %address, "Deleted queue");

        self.registry.refresh_queues().await?;
        Ok(())
    }

    pub async fn create_topic(&self, name: &str) -> Result<TopicResource, RegistryError> {
        validation::validate_topic_name(name)
            .map_err(|e| failed(RegistryErrorKind::InvalidInput, e))?;

        let arn = self
            .service
            .create_topic(name)
            .await
            .map_err(|e| failed(RegistryErrorKind::CreateFailed, e))?;
        info!(name = %name, arn = %arn, "Created topic");

        self.registry.refresh_topics().await?;
        Ok(self
            .registry
            .topic(&arn)
            .unwrap_or_else(|| TopicResource::new(arn, None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicbridge_test::{MemoryService, Operation, LOCAL_HOST};

    fn admin(service: &Arc<MemoryService>) -> (ResourceAdmin, Arc<ResourceRegistry>) {
        let registry = Arc::new(ResourceRegistry::new(service.clone(), LOCAL_HOST));
        (ResourceAdmin::new(service.clone(), registry.clone()), registry)
    }

    #[tokio::test]
    async fn test_create_queue_refreshes_registry() {
        let service = Arc::new(MemoryService::new());
        let (admin, registry) = admin(&service);

        let queue = admin.create_queue("orders").await.unwrap();

        assert_eq!(queue.address, "http://localhost:4566/000000000000/orders");
        assert_eq!(registry.queue("orders"), Some(queue));
        assert_eq!(service.calls(Operation::ListQueues), 1);
    }

    #[tokio::test]
    async fn test_invalid_queue_name_makes_no_calls() {
        let service = Arc::new(MemoryService::new());
        let (admin, _) = admin(&service);

        let err = admin.create_queue("").await.unwrap_err();

        assert_eq!(err.kind, RegistryErrorKind::InvalidInput);
        assert_eq!(service.calls(Operation::CreateQueue), 0);
    }

    #[tokio::test]
    async fn test_delete_queue() {
        let service = Arc::new(MemoryService::new());
        let (admin, registry) = admin(&service);
        let queue = admin.create_queue("orders").await.unwrap();

        admin.delete_queue(&queue.address).await.unwrap();

        assert!(registry.queues().is_empty());
        assert_eq!(service.queue_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_missing_queue_fails() {
        let service = Arc::new(MemoryService::new());
        let (admin, _) = admin(&service);

        let err = admin
            .delete_queue("http://localhost:4566/000000000000/missing")
            .await
            .unwrap_err();

        assert_eq!(err.kind, RegistryErrorKind::DeleteFailed);
        assert!(err.source.is_not_found());
    }

    #[tokio::test]
    async fn test_create_topic() {
        let service = Arc::new(MemoryService::new());
        let (admin, registry) = admin(&service);

        let topic = admin.create_topic("orders-topic").await.unwrap();

        assert_eq!(topic.name, "orders-topic");
        assert_eq!(topic.arn, "arn:aws:sns:us-east-1:000000000000:orders-topic");
        assert_eq!(registry.topics(), vec![topic]);
    }

    #[tokio::test]
    async fn test_create_conflict_surfaces_verbatim() {
        let service = Arc::new(MemoryService::new());
        let (admin, _) = admin(&service);
        let conflict = ServiceError::Conflict("queue deleted recently".to_string());
        service.fail_next(Operation::CreateQueue, conflict.clone());

        let err = admin.create_queue("orders").await.unwrap_err();

        assert_eq!(err.kind, RegistryErrorKind::CreateFailed);
        assert_eq!(err.source, conflict);
    }
}

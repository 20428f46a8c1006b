//! Queue–topic binding for TopicBridge
//!
//! Provides the stateful core on top of a [`QueueTopicService`]:
//! - [`ResourceRegistry`]: cached queues, topics and subscriptions
//! - [`ResourceAdmin`]: create and delete queues, create topics
//! - [`BindingOrchestrator`]: get-or-create a queue and subscribe it to a topic
//! - [`MessageExchange`]: publish, send and receive with envelope decoding
//!
//! [`Bridge`] wires all four around one injected service.

pub mod admin;
pub mod binding;
pub mod exchange;
pub mod registry;

use std::sync::Arc;

use topicbridge_client::QueueTopicService;
use topicbridge_core::BindingConfig;

pub use admin::ResourceAdmin;
pub use binding::BindingOrchestrator;
pub use exchange::MessageExchange;
pub use registry::ResourceRegistry;

/// Components sharing one service client and one registry
pub struct Bridge {
    pub registry: Arc<ResourceRegistry>,
    pub admin: ResourceAdmin,
    pub binding: BindingOrchestrator,
    pub exchange: MessageExchange,
}

impl Bridge {
    pub fn new(
        service: Arc<dyn QueueTopicService>,
        local_host: impl Into<String>,
        config: BindingConfig,
    ) -> Self {
        let registry = Arc::new(ResourceRegistry::new(service.clone(), local_host));
        Self {
            admin: ResourceAdmin::new(service.clone(), registry.clone()),
            binding: BindingOrchestrator::new(service.clone(), registry.clone(), config),
            exchange: MessageExchange::new(service),
            registry,
        }
    }
}

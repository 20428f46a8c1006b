//! Queue/topic service access for TopicBridge
//!
//! [`QueueTopicService`] is the contract the binding core is written
//! against. [`SdkService`] realizes it over the AWS SDK so the same code runs
//! against a local emulator or a real account.

pub mod sdk;
pub mod service;

pub use sdk::SdkService;
pub use service::{QueueAttributes, QueueTopicService, TopicAttributes};

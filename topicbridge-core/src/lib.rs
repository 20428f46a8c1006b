//! Core types for TopicBridge
//!
//! This crate provides the data model, error taxonomy, address normalization
//! and configuration types shared by the service client and the binding core.

pub mod address;
pub mod config;
pub mod error;
pub mod model;
pub mod validation;

pub use address::{normalize, queue_name_from_address};
pub use config::{BindingConfig, DuplicatePolicy, ServiceConfig, LOCAL_ACCOUNT_ID};
pub use error::{
    BindError, BindErrorKind, ErrorCode, ErrorKind, ExchangeError, ExchangeErrorKind,
    RegistryError, RegistryErrorKind, ServiceError,
};
pub use model::{
    decode_body, Ack, Envelope, Message, QueueResource, RawMessage, Received, Subscription,
    SubscriptionSummary, TopicResource, TopicSummary, QUEUE_PROTOCOL,
};

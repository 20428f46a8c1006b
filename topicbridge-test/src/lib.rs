//! Test utilities for TopicBridge
//!
//! Provides an in-memory stand-in for the queue and topic services so the
//! binding core can be exercised without an emulator:
//! - Queue URLs advertise a non-local host, like a containerised emulator
//! - Topic deliveries to queues arrive wrapped in a notification envelope
//! - Any operation can be made to fail on demand
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use topicbridge_test::{MemoryService, Operation};
//! use topicbridge_core::ServiceError;
//!
//! let service = Arc::new(MemoryService::new());
//! service.fail_next(
//!     Operation::Subscribe,
//!     ServiceError::Transport("connection reset".to_string()),
//! );
//! ```

pub mod memory;

pub use memory::{MemoryService, Operation, DEFAULT_ADVERTISED_HOST};

/// Local host queue addresses are normalized to in tests
pub const LOCAL_HOST: &str = "localhost:4566";

/// Install a test-friendly tracing subscriber; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "topicbridge=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

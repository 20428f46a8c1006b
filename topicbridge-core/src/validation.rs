//! Input checks applied before any call reaches the service

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::error::ServiceError;

static RESOURCE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+(\.fifo)?$").expect("valid resource name regex"));

const MAX_QUEUE_NAME_LEN: usize = 80;
const MAX_TOPIC_NAME_LEN: usize = 256;

/// Queue names: up to 80 alphanumerics, hyphens and underscores, optional `.fifo`
pub fn validate_queue_name(name: &str) -> Result<(), ServiceError> {
    if name.is_empty() {
        return Err(ServiceError::Validation("queue name must not be empty".to_string()));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "queue name exceeds {MAX_QUEUE_NAME_LEN} characters: {name}"
        )));
    }
    if !RESOURCE_NAME.is_match(name) {
        return Err(ServiceError::Validation(format!("invalid queue name: {name}")));
    }
    Ok(())
}

/// Topic names: up to 256 alphanumerics, hyphens and underscores, optional `.fifo`
pub fn validate_topic_name(name: &str) -> Result<(), ServiceError> {
    if name.is_empty() {
        return Err(ServiceError::Validation("topic name must not be empty".to_string()));
    }
    if name.len() > MAX_TOPIC_NAME_LEN {
        return Err(ServiceError::Validation(format!(
            "topic name exceeds {MAX_TOPIC_NAME_LEN} characters: {name}"
        )));
    }
    if !RESOURCE_NAME.is_match(name) {
        return Err(ServiceError::Validation(format!("invalid topic name: {name}")));
    }
    Ok(())
}

/// Identifiers such as ARNs and addresses only need to be present
pub fn require(field: &str, value: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// A bare `host[:port]` authority that queue addresses can be rewritten to
///
/// Schemes, paths, queries, fragments and userinfo are rejected: any of them
/// would leak into every normalized address.
pub fn validate_local_host(host: &str) -> Result<(), ServiceError> {
    let invalid =
        |reason: &str| ServiceError::Validation(format!("invalid local host '{host}': {reason}"));

    if host.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if host.contains("://") {
        return Err(invalid("expected host[:port] without a scheme"));
    }
    if host.contains(['/', '\\', '?', '#', '@']) || host.chars().any(char::is_whitespace) {
        return Err(invalid("expected host[:port]"));
    }

    let url = Url::parse(&format!("http://{host}")).map_err(|e| invalid(&e.to_string()))?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    Ok(())
}

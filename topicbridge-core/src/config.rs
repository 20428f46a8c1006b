//! Service and binding configuration
//!
//! These are plain serde types; loading them from files and environment is
//! left to the binary.

use serde::Deserialize;
use url::Url;

use crate::error::ServiceError;
use crate::validation;

/// Account id used by local emulators in queue URLs and ARNs
pub const LOCAL_ACCOUNT_ID: &str = "000000000000";

/// Connection settings for the queue/topic service
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_credential")]
    pub access_key_id: String,

    #[serde(default = "default_credential")]
    pub secret_access_key: String,

    /// Endpoint override; `None` uses the SDK's regional endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub tls: bool,

    /// `host[:port]` queue addresses are rewritten to; derived from the
    /// endpoint when unset
    #[serde(default)]
    pub local_host: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            access_key_id: default_credential(),
            secret_access_key: default_credential(),
            endpoint: default_endpoint(),
            tls: false,
            local_host: None,
        }
    }
}

impl ServiceConfig {
    /// Endpoint with its scheme forced to match the TLS flag
    pub fn endpoint_url(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?;
        let Ok(mut url) = Url::parse(endpoint) else {
            return Some(endpoint.to_string());
        };
        let scheme = if self.tls { "https" } else { "http" };
        if url.scheme() != scheme && url.set_scheme(scheme).is_err() {
            return Some(endpoint.to_string());
        }
        Some(url.as_str().trim_end_matches('/').to_string())
    }

    /// Reject settings that would produce unusable addresses
    ///
    /// The endpoint must be a URL with a host and an explicit `local_host`
    /// must be a bare `host[:port]`.
    pub fn validate(&self) -> Result<(), ServiceError> {
        if let Some(endpoint) = self.endpoint.as_deref() {
            let invalid = |reason: String| {
                ServiceError::Validation(format!("invalid endpoint '{endpoint}': {reason}"))
            };
            let url = Url::parse(endpoint).map_err(|e| invalid(e.to_string()))?;
            if url.host_str().is_none() {
                return Err(invalid("missing host".to_string()));
            }
        }
        if let Some(host) = self.local_host.as_deref().filter(|h| !h.is_empty()) {
            validation::validate_local_host(host)?;
        }
        Ok(())
    }

    /// Host queue addresses are normalized to
    pub fn local_host(&self) -> String {
        if let Some(host) = self.local_host.as_deref().filter(|h| !h.is_empty()) {
            return host.to_string();
        }

        self.endpoint
            .as_deref()
            .and_then(|e| Url::parse(e).ok())
            .and_then(|url| {
                let host = url.host_str()?.to_string();
                Some(match url.port() {
                    Some(port) => format!("{host}:{port}"),
                    None => host,
                })
            })
            .unwrap_or_else(default_local_host)
    }
}

/// How a bind treats an existing subscription of the same queue to the topic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Subscribe again; the service may hand back a second subscription
    #[default]
    Allow,
    /// Fail the bind when the queue already has a subscription on the topic
    Reject,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BindingConfig {
    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_credential() -> String {
    "test".to_string()
}

#[allow(clippy::unnecessary_wraps)]
fn default_endpoint() -> Option<String> {
    Some("http://localhost:4566".to_string())
}

fn default_local_host() -> String {
    "localhost:4566".to_string()
}

//! Queue, topic, subscription and message types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Protocol name used when subscribing a queue to a topic
pub const QUEUE_PROTOCOL: &str = "sqs";

/// A queue known to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueResource {
    pub name: String,
    /// Locally reachable address (already normalized)
    pub address: String,
    pub arn: String,
    /// Approximate number of visible messages when the queue was last described
    #[serde(default)]
    pub approximate_messages: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicResource {
    pub name: String,
    pub arn: String,
    pub display_name: Option<String>,
}

impl TopicResource {
    /// Build a topic entry, naming it by display name when one is set and by
    /// the last ARN segment otherwise
    pub fn new(arn: impl Into<String>, display_name: Option<String>) -> Self {
        let arn = arn.into();
        let display_name = display_name.filter(|d| !d.is_empty());
        let name = display_name
            .clone()
            .unwrap_or_else(|| arn.rsplit(':').next().unwrap_or(&arn).to_string());
        Self {
            name,
            arn,
            display_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub subscription_arn: String,
    pub topic_arn: String,
    pub endpoint_arn: String,
}

/// Topic summary as returned by a topic listing
///
/// Listings carry no attributes; display names come from a separate lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSummary {
    pub arn: String,
}

/// Subscription summary as returned by a per-topic listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSummary {
    pub endpoint_arn: String,
    pub subscription_arn: String,
}

/// Acknowledgement of an accepted publish or send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message_id: String,
}

/// A message as handed back by the queue service, before decoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub message_id: String,
    pub body: String,
    pub md5_of_body: Option<String>,
}

/// A received message with its decoded text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub raw_body: String,
    pub decoded_text: String,
    pub md5_of_body: Option<String>,
}

impl From<RawMessage> for Message {
    fn from(raw: RawMessage) -> Self {
        let decoded_text = decode_body(&raw.body);
        Self {
            id: raw.message_id,
            raw_body: raw.body,
            decoded_text,
            md5_of_body: raw.md5_of_body,
        }
    }
}

/// Outcome of a bounded receive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Message(Message),
    Empty,
}

/// Notification wrapper a topic places around a payload delivered to a queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Envelope {
    #[serde(rename = "Type")]
    pub kind: String,
    pub message_id: String,
    pub topic_arn: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    pub fn notification(
        message_id: impl Into<String>,
        topic_arn: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: "Notification".to_string(),
            message_id: message_id.into(),
            topic_arn: topic_arn.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Decode a raw message body, unwrapping a topic envelope when present
///
/// A body that parses as a JSON object with a `Message` field decodes to that
/// field (string values verbatim, other values as JSON text). Anything else,
/// including a `null` field, decodes to the raw body unchanged.
pub fn decode_body(raw: &str) -> String {
    let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(raw)
    else {
        return raw.to_string();
    };

    match fields.get("Message") {
        Some(serde_json::Value::String(text)) => text.clone(),
        Some(serde_json::Value::Null) | None => raw.to_string(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope() {
        assert_eq!(decode_body(r#"{"Message":"hello"}"#), "hello");
    }

    #[test]
    fn test_decode_plain_text() {
        assert_eq!(decode_body("plain text"), "plain text");
    }

    #[test]
    fn test_decode_json_without_message_field() {
        let raw = r#"{"order":42}"#;
        assert_eq!(decode_body(raw), raw);
    }

    #[test]
    fn test_decode_non_object_json() {
        assert_eq!(decode_body("42"), "42");
        assert_eq!(decode_body(r#"["Message"]"#), r#"["Message"]"#);
    }

    #[test]
    fn test_decode_non_string_message() {
        assert_eq!(decode_body(r#"{"Message":{"id":1}}"#), r#"{"id":1}"#);
        assert_eq!(decode_body(r#"{"Message":null}"#), r#"{"Message":null}"#);
    }

    #[test]
    fn test_envelope_serializes_with_message_field() {
        let envelope = Envelope::notification("m-1", "arn:aws:sns:us-east-1:000000000000:t", "hi");
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""Type":"Notification""#));
        assert!(json.contains(r#""TopicArn":"arn:aws:sns:us-east-1:000000000000:t""#));
        assert_eq!(decode_body(&json), "hi");
    }

    #[test]
    fn test_envelope_field_set() {
        let envelope = Envelope::notification("m-1", "arn:aws:sns:us-east-1:000000000000:t", "hi");
        let value = serde_json::to_value(&envelope).unwrap();

        let mut keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["Message", "MessageId", "Timestamp", "TopicArn", "Type"]);
    }

    #[test]
    fn test_queue_resource_depth_defaults_to_zero() {
        let queue: QueueResource = serde_json::from_str(
            r#"{"name":"orders","address":"http://localhost:4566/000000000000/orders","arn":"arn:aws:sqs:us-east-1:000000000000:orders"}"#,
        )
        .unwrap();
        assert_eq!(queue.approximate_messages, 0);
    }

    #[test]
    fn test_topic_name_fallback() {
        let topic = TopicResource::new("arn:aws:sns:us-east-1:000000000000:orders-topic", None);
        assert_eq!(topic.name, "orders-topic");

        let topic = TopicResource::new("arn:aws:sns:us-east-1:000000000000:t", Some(String::new()));
        assert_eq!(topic.name, "t");
        assert_eq!(topic.display_name, None);

        let topic = TopicResource::new("arn:aws:sns:us-east-1:000000000000:t", Some("Orders".into()));
        assert_eq!(topic.name, "Orders");
    }
}

//! AWS SDK realization of the queue/topic service contract

use async_trait::async_trait;
use aws_config::{retry::RetryConfig, BehaviorVersion, Region, SdkConfig};
use aws_sdk_sqs::config::Credentials;
use aws_sdk_sqs::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_sqs::types::QueueAttributeName;
use tracing::{debug, info};

use topicbridge_core::{
    Ack, RawMessage, ServiceConfig, ServiceError, SubscriptionSummary, TopicSummary,
};

use crate::service::{QueueAttributes, QueueTopicService, TopicAttributes};

const CREDENTIALS_PROVIDER: &str = "topicbridge";

/// Queue/topic service backed by the SQS and SNS SDK clients
#[derive(Debug, Clone)]
pub struct SdkService {
    sqs: aws_sdk_sqs::Client,
    sns: aws_sdk_sns::Client,
}

impl SdkService {
    /// Build clients from explicit connection settings
    ///
    /// Static credentials are used and SDK retries are disabled: a failed
    /// call surfaces immediately.
    pub async fn connect(config: &ServiceConfig) -> Self {
        let credentials = Credentials::new(
            config.access_key_id.clone(),
            config.secret_access_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled());

        if let Some(endpoint) = config.endpoint_url() {
            info!(endpoint = %endpoint, region = %config.region, "Using endpoint override");
            loader = loader.endpoint_url(endpoint);
        }

        Self::from_sdk_config(&loader.load().await)
    }

    pub fn from_sdk_config(config: &SdkConfig) -> Self {
        Self {
            sqs: aws_sdk_sqs::Client::new(config),
            sns: aws_sdk_sns::Client::new(config),
        }
    }
}

/// Map an SDK failure onto the service error taxonomy
fn classify<E>(operation: &'static str, err: SdkError<E>) -> ServiceError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    if let Some(service_err) = err.as_service_error() {
        let code = service_err.code().unwrap_or("Unknown");
        let message = service_err.message().unwrap_or(operation).to_string();
        debug!(operation, code, message = %message, "Service rejected request");
        return ServiceError::from_code(code, message);
    }

    ServiceError::Transport(format!("{operation}: {}", DisplayErrorContext(&err)))
}

fn missing(operation: &str, field: &str) -> ServiceError {
    ServiceError::Transport(format!("malformed {operation} response: missing {field}"))
}

#[async_trait]
impl QueueTopicService for SdkService {
    async fn list_queues(&self) -> Result<Vec<String>, ServiceError> {
        let mut urls = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .sqs
                .list_queues()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListQueues", e))?;

            urls.extend(output.queue_urls().iter().cloned());

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(urls)
    }

    async fn get_queue_url(&self, name: &str) -> Result<String, ServiceError> {
        let output = self
            .sqs
            .get_queue_url()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| classify("GetQueueUrl", e))?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| missing("GetQueueUrl", "QueueUrl"))
    }

    async fn create_queue(&self, name: &str) -> Result<String, ServiceError> {
        let output = self
            .sqs
            .create_queue()
            .queue_name(name)
            .send()
            .await
            .map_err(|e| classify("CreateQueue", e))?;

        output
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| missing("CreateQueue", "QueueUrl"))
    }

    async fn delete_queue(&self, address: &str) -> Result<(), ServiceError> {
        self.sqs
            .delete_queue()
            .queue_url(address)
            .send()
            .await
            .map_err(|e| classify("DeleteQueue", e))?;
        Ok(())
    }

    async fn get_queue_attributes(&self, address: &str) -> Result<QueueAttributes, ServiceError> {
        let output = self
            .sqs
            .get_queue_attributes()
            .queue_url(address)
            .attribute_names(QueueAttributeName::QueueArn)
            .attribute_names(QueueAttributeName::ApproximateNumberOfMessages)
            .send()
            .await
            .map_err(|e| classify("GetQueueAttributes", e))?;

        let attrs = output.attributes();
        let arn = attrs
            .and_then(|attrs| attrs.get(&QueueAttributeName::QueueArn))
            .cloned()
            .ok_or_else(|| missing("GetQueueAttributes", "QueueArn"))?;
        let approximate_messages = attrs
            .and_then(|attrs| attrs.get(&QueueAttributeName::ApproximateNumberOfMessages))
            .and_then(|count| count.parse().ok())
            .unwrap_or(0);

        Ok(QueueAttributes {
            arn,
            approximate_messages,
        })
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<Ack, ServiceError> {
        let output = self
            .sqs
            .send_message()
            .queue_url(address)
            .message_body(body)
            .send()
            .await
            .map_err(|e| classify("SendMessage", e))?;

        let message_id = output
            .message_id()
            .map(str::to_string)
            .ok_or_else(|| missing("SendMessage", "MessageId"))?;

        Ok(Ack { message_id })
    }

    async fn receive_message(
        &self,
        address: &str,
        max_count: i32,
    ) -> Result<Vec<RawMessage>, ServiceError> {
        let output = self
            .sqs
            .receive_message()
            .queue_url(address)
            .max_number_of_messages(max_count)
            .send()
            .await
            .map_err(|e| classify("ReceiveMessage", e))?;

        output
            .messages()
            .iter()
            .map(|m| {
                Ok(RawMessage {
                    message_id: m
                        .message_id()
                        .map(str::to_string)
                        .ok_or_else(|| missing("ReceiveMessage", "MessageId"))?,
                    body: m.body().unwrap_or_default().to_string(),
                    md5_of_body: m.md5_of_body().map(str::to_string),
                })
            })
            .collect()
    }

    async fn list_topics(&self) -> Result<Vec<TopicSummary>, ServiceError> {
        let mut topics = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .sns
                .list_topics()
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListTopics", e))?;

            topics.extend(output.topics().iter().filter_map(|t| {
                t.topic_arn().map(|arn| TopicSummary {
                    arn: arn.to_string(),
                })
            }));

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(topics)
    }

    async fn create_topic(&self, name: &str) -> Result<String, ServiceError> {
        let output = self
            .sns
            .create_topic()
            .name(name)
            .send()
            .await
            .map_err(|e| classify("CreateTopic", e))?;

        output
            .topic_arn()
            .map(str::to_string)
            .ok_or_else(|| missing("CreateTopic", "TopicArn"))
    }

    async fn get_topic_attributes(&self, topic_arn: &str) -> Result<TopicAttributes, ServiceError> {
        let output = self
            .sns
            .get_topic_attributes()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(|e| classify("GetTopicAttributes", e))?;

        let display_name = output
            .attributes()
            .and_then(|attrs| attrs.get("DisplayName"))
            .filter(|name| !name.is_empty())
            .cloned();

        Ok(TopicAttributes { display_name })
    }

    async fn subscribe(
        &self,
        topic_arn: &str,
        protocol: &str,
        endpoint_arn: &str,
    ) -> Result<String, ServiceError> {
        let output = self
            .sns
            .subscribe()
            .topic_arn(topic_arn)
            .protocol(protocol)
            .endpoint(endpoint_arn)
            .send()
            .await
            .map_err(|e| classify("Subscribe", e))?;

        output
            .subscription_arn()
            .map(str::to_string)
            .ok_or_else(|| missing("Subscribe", "SubscriptionArn"))
    }

    async fn unsubscribe(&self, subscription_arn: &str) -> Result<(), ServiceError> {
        self.sns
            .unsubscribe()
            .subscription_arn(subscription_arn)
            .send()
            .await
            .map_err(|e| classify("Unsubscribe", e))?;
        Ok(())
    }

    async fn list_subscriptions_by_topic(
        &self,
        topic_arn: &str,
    ) -> Result<Vec<SubscriptionSummary>, ServiceError> {
        let mut subscriptions = Vec::new();
        let mut next_token = None;

        loop {
            let output = self
                .sns
                .list_subscriptions_by_topic()
                .topic_arn(topic_arn)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| classify("ListSubscriptionsByTopic", e))?;

            subscriptions.extend(output.subscriptions().iter().filter_map(|s| {
                Some(SubscriptionSummary {
                    endpoint_arn: s.endpoint()?.to_string(),
                    subscription_arn: s.subscription_arn()?.to_string(),
                })
            }));

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(subscriptions)
    }

    async fn publish(&self, topic_arn: &str, body: &str) -> Result<Ack, ServiceError> {
        let output = self
            .sns
            .publish()
            .topic_arn(topic_arn)
            .message(body)
            .send()
            .await
            .map_err(|e| classify("Publish", e))?;

        let message_id = output
            .message_id()
            .map(str::to_string)
            .ok_or_else(|| missing("Publish", "MessageId"))?;

        Ok(Ack { message_id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use topicbridge_core::ErrorKind;

    /// Nothing listens on port 1, so every call fails before reaching a service
    fn unreachable_config() -> ServiceConfig {
        ServiceConfig {
            endpoint: Some("http://127.0.0.1:1".to_string()),
            ..ServiceConfig::default()
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transport_error() {
        let service = SdkService::connect(&unreachable_config()).await;

        let err = service.list_queues().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);

        let err = service.get_queue_url("orders").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }

    #[tokio::test]
    async fn test_unreachable_topic_service_is_transport_error() {
        let service = SdkService::connect(&unreachable_config()).await;

        let err = service
            .publish("arn:aws:sns:us-east-1:000000000000:orders-topic", "hello")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transport);
    }
}

//! TopicBridge - queue to topic binding against a local emulator
//!
//! Lists queues and topics, binds queues to topics and moves messages
//! through them. Every queue address printed points at the local host, not
//! the hostname the emulator advertises.

mod config;

use anyhow::{anyhow, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use topicbridge_binding::Bridge;
use topicbridge_client::SdkService;
use topicbridge_core::{DuplicatePolicy, Received};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "topicbridge")]
#[command(about = "Bind queues to topics on a local emulator", long_about = None)]
struct Args {
    /// Configuration file (defaults to an optional ./topicbridge.toml)
    #[arg(short, long, env = "TOPICBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Service endpoint, e.g. http://localhost:4566
    #[arg(long, env = "TOPICBRIDGE_ENDPOINT")]
    endpoint: Option<String>,

    /// Region to sign requests for
    #[arg(long, env = "TOPICBRIDGE_REGION")]
    region: Option<String>,

    /// Host[:port] queue addresses are rewritten to
    #[arg(long, env = "TOPICBRIDGE_LOCAL_HOST")]
    local_host: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TOPICBRIDGE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Fail a bind when the queue is already subscribed to the topic
    #[arg(long)]
    reject_duplicates: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List queues with their local addresses
    Queues,
    /// List topics and their subscriptions
    Topics,
    /// Create a queue, or return the existing one of that name
    CreateQueue { name: String },
    /// Delete a queue by name or address
    DeleteQueue { queue: String },
    /// Create a topic
    CreateTopic { name: String },
    /// Subscribe a queue to a topic, creating the queue if needed
    Bind {
        #[arg(long)]
        queue: String,
        #[arg(long)]
        topic: String,
    },
    /// Remove one subscription from a topic
    Unbind {
        #[arg(long)]
        subscription: String,
        #[arg(long)]
        topic: String,
    },
    /// Publish a message to a topic
    Publish {
        #[arg(long)]
        topic: String,
        body: String,
    },
    /// Send a message straight to a queue
    Send {
        #[arg(long)]
        queue: String,
        body: String,
    },
    /// Receive at most one message from a queue
    Receive {
        #[arg(long)]
        queue: String,
    },
}

impl Args {
    /// Command line flags win over file and environment configuration
    fn apply(&self, config: &mut Config) {
        if let Some(endpoint) = &self.endpoint {
            config.service.endpoint = Some(endpoint.clone());
        }
        if let Some(region) = &self.region {
            config.service.region = region.clone();
        }
        if let Some(local_host) = &self.local_host {
            config.service.local_host = Some(local_host.clone());
        }
        if let Some(log_level) = &self.log_level {
            config.log_level = log_level.clone();
        }
        if self.reject_duplicates {
            config.binding.duplicate_policy = DuplicatePolicy::Reject;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    args.apply(&mut config);
    config.validate().context("invalid configuration")?;

    // Logs go to stderr so command output stays clean on stdout
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("topicbridge={}", config.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let local_host = config.service.local_host();
    info!(
        endpoint = ?config.service.endpoint_url(),
        region = %config.service.region,
        local_host = %local_host,
        duplicate_policy = ?config.binding.duplicate_policy,
        "Starting TopicBridge"
    );

    let service = SdkService::connect(&config.service).await;
    let bridge = Bridge::new(Arc::new(service), local_host, config.binding);

    run(&bridge, args.command).await
}

async fn run(bridge: &Bridge, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Queues => {
            for queue in bridge.registry.refresh_queues().await? {
                println!(
                    "{}\t{}\t{}\tmessages={}",
                    queue.name, queue.address, queue.arn, queue.approximate_messages
                );
            }
        }
        Command::Topics => {
            bridge.registry.refresh_all().await?;
            for topic in bridge.registry.topics() {
                println!(
                    "{}\t{}\tsubscribers={}",
                    topic.name,
                    topic.arn,
                    bridge.registry.subscriber_count(&topic.arn)
                );
                for sub in bridge.registry.subscriptions(&topic.arn) {
                    println!("  {}\t{}", sub.subscription_arn, sub.endpoint_arn);
                }
            }
        }
        Command::CreateQueue { name } => {
            let queue = bridge.admin.create_queue(&name).await?;
            println!("{}", queue.address);
        }
        Command::DeleteQueue { queue } => {
            let address = resolve_queue(bridge, &queue).await?;
            bridge.admin.delete_queue(&address).await?;
            println!("deleted {address}");
        }
        Command::CreateTopic { name } => {
            let topic = bridge.admin.create_topic(&name).await?;
            println!("{}", topic.arn);
        }
        Command::Bind { queue, topic } => {
            let topic_arn = resolve_topic(bridge, &topic).await?;
            let sub = bridge.binding.bind_queue_to_topic(&queue, &topic_arn).await?;
            println!("{}", sub.subscription_arn);
        }
        Command::Unbind {
            subscription,
            topic,
        } => {
            let topic_arn = resolve_topic(bridge, &topic).await?;
            bridge.binding.unsubscribe(&subscription, &topic_arn).await?;
            println!("unsubscribed {subscription}");
        }
        Command::Publish { topic, body } => {
            let topic_arn = resolve_topic(bridge, &topic).await?;
            let ack = bridge.exchange.publish(&topic_arn, &body).await?;
            println!("{}", ack.message_id);
        }
        Command::Send { queue, body } => {
            let address = resolve_queue(bridge, &queue).await?;
            let ack = bridge.exchange.send(&address, &body).await?;
            println!("{}", ack.message_id);
        }
        Command::Receive { queue } => {
            let address = resolve_queue(bridge, &queue).await?;
            match bridge.exchange.receive(&address).await? {
                Received::Message(message) => {
                    println!("{}\t{}", message.id, message.decoded_text);
                }
                Received::Empty => println!("no messages"),
            }
        }
    }
    Ok(())
}

/// Accept either a queue address or a queue name known to the service
async fn resolve_queue(bridge: &Bridge, queue: &str) -> anyhow::Result<String> {
    if queue.contains("://") {
        return Ok(queue.to_string());
    }
    bridge.registry.refresh_queues().await?;
    bridge
        .registry
        .queue(queue)
        .map(|q| q.address)
        .ok_or_else(|| anyhow!("no queue named '{queue}'"))
}

/// Accept either a topic ARN or a topic name known to the service
async fn resolve_topic(bridge: &Bridge, topic: &str) -> anyhow::Result<String> {
    if topic.starts_with("arn:") {
        return Ok(topic.to_string());
    }
    bridge
        .registry
        .refresh_topics()
        .await?
        .into_iter()
        .find(|t| t.name == topic)
        .map(|t| t.arn)
        .ok_or_else(|| anyhow!("no topic named '{topic}'"))
}

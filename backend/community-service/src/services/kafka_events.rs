//! Kafka publisher for community events
//!
//! Sends notification requests to the subscriptions service and comment
//! metrics to the video-manager service.

use anyhow::{Context, Result};
use async_trait::async_trait;
use event_schema::{
    TopicEvent, EVENT_ID_HEADER, EVENT_TYPE_HEADER, SCHEMA_VERSION, SCHEMA_VERSION_HEADER,
};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::{info, warn};

use super::notifications::{EventPublisher, OutboundEvent};
use crate::config::KafkaConfig;

const SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    notification_topic: String,
    metrics_topic: String,
}

impl KafkaEventPublisher {
    pub fn new(brokers: &str, config: &KafkaConfig) -> Result<Self> {
        let producer = rdkafka::config::ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("client.id", "community-service")
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("max.in.flight.requests.per.connection", "5")
            .set("retries", "3")
            .set("linger.ms", "5")
            .create::<FutureProducer>()
            .context("Failed to create Kafka producer")?;

        info!(
            brokers = %brokers,
            notification_topic = %config.notification_topic,
            metrics_topic = %config.metrics_topic,
            "Community service Kafka producer initialized"
        );

        Ok(Self {
            producer,
            notification_topic: config.notification_topic.clone(),
            metrics_topic: config.metrics_topic.clone(),
        })
    }

    async fn send<T: TopicEvent>(&self, topic: &str, event: &T) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let partition_key = event.partition_key();
        let event_id = event.event_id().to_string();
        let schema_version = SCHEMA_VERSION.to_string();

        let headers = OwnedHeaders::new()
            .insert(Header {
                key: EVENT_TYPE_HEADER,
                value: Some(T::EVENT_TYPE),
            })
            .insert(Header {
                key: EVENT_ID_HEADER,
                value: Some(event_id.as_str()),
            })
            .insert(Header {
                key: SCHEMA_VERSION_HEADER,
                value: Some(schema_version.as_str()),
            });

        let record = FutureRecord::to(topic)
            .key(&partition_key)
            .payload(&payload)
            .headers(headers);

        match self.producer.send(record, SEND_TIMEOUT).await {
            Ok(_) => {
                info!(
                    event_type = T::EVENT_TYPE,
                    event_id = %event_id,
                    partition_key = %partition_key,
                    topic = %topic,
                    "Published community event to Kafka"
                );
                Ok(())
            }
            Err((err, _)) => {
                warn!(
                    error = ?err,
                    event_type = T::EVENT_TYPE,
                    topic = %topic,
                    "Failed to publish community event to Kafka"
                );
                Err(anyhow::anyhow!("Failed to publish event: {}", err))
            }
        }
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, event: &OutboundEvent) -> Result<()> {
        match event {
            OutboundEvent::Notification(notification) => {
                self.send(&self.notification_topic, notification).await
            }
            OutboundEvent::CommentsMetrics(metrics) => {
                self.send(&self.metrics_topic, metrics).await
            }
        }
    }
}

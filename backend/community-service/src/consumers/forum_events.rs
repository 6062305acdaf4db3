//! Forum Events Consumer
//!
//! Consumes forum lifecycle events from the video-manager service and creator
//! profile events from the identity service. Routing uses the `event_type`
//! header; payloads are camelCase JSON from `event-schema`.

use anyhow::Context;
use event_schema::{
    inbound, is_compatible, CreateForumEvent, UnregisterForumEvent, UpsertCreatorEvent,
    EVENT_TYPE_HEADER, SCHEMA_VERSION, SCHEMA_VERSION_HEADER,
};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Headers, Message};
use std::time::Duration;
use tracing::{debug, error, info, warn};

const INITIAL_RETRY_BACKOFF: Duration = Duration::from_millis(200);
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

use crate::domain::Creator;
use crate::error::ServiceError;
use crate::metrics;
use crate::repository::CommunityStore;
use crate::services::CommunityService;

/// What happened to one inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handled {
    Applied,
    /// Redelivered or already-satisfied event
    Skipped,
    /// Event type this consumer does not own
    Ignored,
}

impl Handled {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
            Self::Ignored => "ignored",
        }
    }
}

pub struct ForumEventsConsumer<S: CommunityStore> {
    service: CommunityService<S>,
    brokers: String,
    group_id: String,
    topic: String,
}

impl<S: CommunityStore> ForumEventsConsumer<S> {
    pub fn new(
        service: CommunityService<S>,
        brokers: impl Into<String>,
        group_id: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            service,
            brokers: brokers.into(),
            group_id: group_id.into(),
            topic: topic.into(),
        }
    }

    /// Run the consumer loop
    pub async fn run(self) {
        if let Err(err) = self.run_inner().await {
            error!("Forum events consumer terminated with error: {err}");
        }
    }

    async fn run_inner(self) -> Result<(), KafkaError> {
        info!(
            topic = %self.topic,
            group_id = %self.group_id,
            "Starting forum events consumer"
        );

        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()?;

        consumer.subscribe(&[&self.topic])?;

        loop {
            match consumer.recv().await {
                Ok(record) => {
                    let Some(data) = record.payload() else {
                        debug!(topic = record.topic(), "Received Kafka message with empty payload");
                        continue;
                    };

                    let event_type = header_value(&record, EVENT_TYPE_HEADER).unwrap_or_default();
                    let version = header_value(&record, SCHEMA_VERSION_HEADER)
                        .and_then(|v| v.parse::<u32>().ok())
                        .unwrap_or(SCHEMA_VERSION);

                    if !is_compatible(SCHEMA_VERSION, version) {
                        warn!(event_type, version, "Skipping event with incompatible schema version");
                    } else {
                        self.handle_until_settled(event_type, data).await;
                    }

                    if let Err(commit_err) = consumer.commit_message(&record, CommitMode::Async) {
                        warn!("Failed to commit Kafka offset: {}", commit_err);
                    }
                }
                Err(err) => {
                    error!("Kafka error: {}", err);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    /// Handle a record until it succeeds or fails for good. Storage faults
    /// are retried with capped backoff so the offset is only committed once
    /// the event was applied or rejected as a poison payload.
    async fn handle_until_settled(&self, event_type: &str, data: &[u8]) {
        let mut backoff = INITIAL_RETRY_BACKOFF;
        loop {
            match self.handle_event(event_type, data).await {
                Ok(outcome) => {
                    metrics::record_inbound_event(event_type, outcome.as_str());
                    return;
                }
                Err(e) if is_retryable(&e) => {
                    metrics::record_inbound_event(event_type, "retried");
                    warn!(
                        event_type,
                        retry_in_ms = backoff.as_millis() as u64,
                        error = %format!("{:#}", e),
                        "Retryable failure handling forum event"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_RETRY_BACKOFF);
                }
                Err(e) => {
                    metrics::record_inbound_event(event_type, "failed");
                    warn!(event_type, error = %format!("{:#}", e), "Failed to handle forum event");
                    return;
                }
            }
        }
    }

    /// Apply one inbound event to the community service.
    ///
    /// Redelivery of `create_forum` for an existing forum is skipped so the
    /// consumer stays idempotent.
    pub async fn handle_event(&self, event_type: &str, data: &[u8]) -> anyhow::Result<Handled> {
        match event_type {
            inbound::CREATE_FORUM => {
                let event: CreateForumEvent =
                    serde_json::from_slice(data).context("Invalid create_forum payload")?;

                if self.service.store().find_forum(event.video_id).await?.is_some() {
                    debug!(video_id = %event.video_id, "Forum already registered");
                    return Ok(Handled::Skipped);
                }
                self.service
                    .register_forum(event.video_id, event.creator_id)
                    .await?;
                Ok(Handled::Applied)
            }
            inbound::UNREGISTER_FORUM => {
                let event: UnregisterForumEvent =
                    serde_json::from_slice(data).context("Invalid unregister_forum payload")?;

                self.service.unregister_forum(event.video_id).await?;
                Ok(Handled::Applied)
            }
            inbound::UPSERT_CREATOR => {
                let event: UpsertCreatorEvent =
                    serde_json::from_slice(data).context("Invalid upsert_creator payload")?;

                self.service
                    .sync_creator(Creator {
                        id: event.id,
                        display_name: event.display_name,
                        nickname: event.nickname,
                        thumbnail_url: event.thumbnail_url,
                    })
                    .await?;
                Ok(Handled::Applied)
            }
            other => {
                debug!(event_type = other, "Ignoring event type");
                Ok(Handled::Ignored)
            }
        }
    }
}

/// Storage faults are worth another attempt; anything else is a poison payload
pub fn is_retryable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ServiceError>()
        .is_some_and(ServiceError::is_retryable)
}

fn header_value<'a>(message: &'a BorrowedMessage<'a>, key: &str) -> Option<&'a str> {
    message
        .headers()
        .and_then(|headers| {
            headers
                .iter()
                .find(|header| header.key == key)
                .and_then(|header| header.value)
        })
        .and_then(|value| std::str::from_utf8(value).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ForumStatus;
    use crate::repository::InMemoryCommunityStore;
    use crate::services::NotificationEmitter;
    use std::sync::Arc;
    use uuid::Uuid;

    fn consumer() -> ForumEventsConsumer<InMemoryCommunityStore> {
        let service = CommunityService::new(
            Arc::new(InMemoryCommunityStore::new()),
            NotificationEmitter::noop(),
        );
        ForumEventsConsumer::new(service, "localhost:9092", "test-group", "forum-events")
    }

    #[tokio::test]
    async fn test_forum_lifecycle_events() {
        let consumer = consumer();
        let video_id = Uuid::new_v4();
        let creator_id = Uuid::new_v4();

        let create = serde_json::to_vec(&CreateForumEvent {
            video_id,
            creator_id,
        })
        .unwrap();
        assert_eq!(
            consumer.handle_event(inbound::CREATE_FORUM, &create).await.unwrap(),
            Handled::Applied
        );
        assert_eq!(
            consumer.handle_event(inbound::CREATE_FORUM, &create).await.unwrap(),
            Handled::Skipped
        );

        let unregister = serde_json::to_vec(&UnregisterForumEvent { video_id }).unwrap();
        consumer
            .handle_event(inbound::UNREGISTER_FORUM, &unregister)
            .await
            .unwrap();

        let forum = consumer
            .service
            .store()
            .find_forum(video_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(forum.status, ForumStatus::Unregistered);
        assert_eq!(forum.creator_id, creator_id);
    }

    #[tokio::test]
    async fn test_upsert_creator_overwrites_profile() {
        let consumer = consumer();
        let id = Uuid::new_v4();

        for name in ["Ann", "Annie"] {
            let payload = serde_json::json!({
                "id": id,
                "displayName": name,
                "nickname": "ann",
            });
            consumer
                .handle_event(inbound::UPSERT_CREATOR, payload.to_string().as_bytes())
                .await
                .unwrap();
        }

        let creator = consumer.service.store().find_creator(id).await.unwrap().unwrap();
        assert_eq!(creator.display_name, "Annie");
        assert_eq!(creator.thumbnail_url, "");
    }

    #[tokio::test]
    async fn test_storage_failure_is_retryable_and_not_applied() {
        let consumer = consumer();
        let video_id = Uuid::new_v4();
        let create = serde_json::to_vec(&CreateForumEvent {
            video_id,
            creator_id: Uuid::new_v4(),
        })
        .unwrap();

        consumer.service.store().fail_next_commit();
        let err = consumer
            .handle_event(inbound::CREATE_FORUM, &create)
            .await
            .unwrap_err();
        assert!(is_retryable(&err));
        assert!(consumer
            .service
            .store()
            .find_forum(video_id)
            .await
            .unwrap()
            .is_none());

        // Redelivery after the fault applies the event
        assert_eq!(
            consumer.handle_event(inbound::CREATE_FORUM, &create).await.unwrap(),
            Handled::Applied
        );
    }

    #[tokio::test]
    async fn test_poison_payloads_are_not_retryable() {
        let consumer = consumer();

        let malformed = consumer
            .handle_event(inbound::CREATE_FORUM, b"not json")
            .await
            .unwrap_err();
        assert!(!is_retryable(&malformed));

        let missing = serde_json::to_vec(&UnregisterForumEvent {
            video_id: Uuid::new_v4(),
        })
        .unwrap();
        let not_found = consumer
            .handle_event(inbound::UNREGISTER_FORUM, &missing)
            .await
            .unwrap_err();
        assert!(!is_retryable(&not_found));
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_events() {
        let consumer = consumer();

        assert_eq!(
            consumer.handle_event("video.transcoded", b"{}").await.unwrap(),
            Handled::Ignored
        );
        assert!(consumer
            .handle_event(inbound::CREATE_FORUM, b"not json")
            .await
            .is_err());

        let missing = serde_json::to_vec(&UnregisterForumEvent {
            video_id: Uuid::new_v4(),
        })
        .unwrap();
        assert!(consumer
            .handle_event(inbound::UNREGISTER_FORUM, &missing)
            .await
            .is_err());
    }
}

//! Event schemas exchanged between community-service and its neighbours
//!
//! Inbound events (forum lifecycle, creator profile sync) are produced by the
//! video-manager and identity services. Outbound events (notifications,
//! comment metrics) are consumed by the subscriptions and video-manager
//! services. Payloads are camelCase JSON; routing metadata travels in Kafka
//! headers.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current schema version for all events
pub const SCHEMA_VERSION: u32 = 1;

/// Header carrying the event type on every Kafka record
pub const EVENT_TYPE_HEADER: &str = "event_type";
/// Header carrying the unique event id on every Kafka record
pub const EVENT_ID_HEADER: &str = "event_id";
/// Header carrying the schema version on every Kafka record
pub const SCHEMA_VERSION_HEADER: &str = "schema_version";

/// Common behaviour of every event published to Kafka.
pub trait TopicEvent: Serialize {
    /// Event type, written to the `event_type` header
    const EVENT_TYPE: &'static str;

    /// Unique id used for consumer-side deduplication
    fn event_id(&self) -> Uuid;

    /// Partition key; events sharing a key keep their relative order
    fn partition_key(&self) -> String;
}

// ============================================================================
// INBOUND: FORUM LIFECYCLE
// ============================================================================

pub mod inbound {
    /// Event type of a forum registration
    pub const CREATE_FORUM: &str = "create_forum";
    /// Event type of a forum closure
    pub const UNREGISTER_FORUM: &str = "unregister_forum";
    /// Event type of a creator profile upsert
    pub const UPSERT_CREATOR: &str = "upsert_creator";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateForumEvent {
    pub video_id: Uuid,
    pub creator_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnregisterForumEvent {
    pub video_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCreatorEvent {
    pub id: Uuid,
    pub display_name: String,
    pub nickname: String,
    #[serde(default)]
    pub thumbnail_url: String,
}

// ============================================================================
// OUTBOUND: NOTIFICATIONS AND METRICS
// ============================================================================

/// Channel descriptor of the user who triggered a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationChannel {
    pub nickname: String,
    pub thumbnail_url: String,
}

/// Asks the subscriptions service to persist and deliver a user-facing alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistNotificationEvent {
    pub notification_id: Uuid,
    /// Recipient of the notification
    pub creator_id: Uuid,
    pub message: String,
    pub url: String,
    pub channel: NotificationChannel,
}

impl PersistNotificationEvent {
    pub fn new(
        creator_id: Uuid,
        message: impl Into<String>,
        url: impl Into<String>,
        channel: NotificationChannel,
    ) -> Self {
        Self {
            notification_id: Uuid::new_v4(),
            creator_id,
            message: message.into(),
            url: url.into(),
            channel,
        }
    }
}

impl TopicEvent for PersistNotificationEvent {
    const EVENT_TYPE: &'static str = "persist_notification";

    fn event_id(&self) -> Uuid {
        self.notification_id
    }

    fn partition_key(&self) -> String {
        self.creator_id.to_string()
    }
}

/// Tells the video-manager service the new total comment count of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateVideoCommentsMetricsEvent {
    #[serde(skip, default = "Uuid::new_v4")]
    pub event_id: Uuid,
    pub video_id: Uuid,
    pub comments_count: i64,
    pub updated_at: DateTime<Utc>,
}

impl UpdateVideoCommentsMetricsEvent {
    pub fn new(video_id: Uuid, comments_count: i64, updated_at: DateTime<Utc>) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            video_id,
            comments_count,
            updated_at,
        }
    }
}

impl TopicEvent for UpdateVideoCommentsMetricsEvent {
    const EVENT_TYPE: &'static str = "update_video_comments_metrics";

    fn event_id(&self) -> Uuid {
        self.event_id
    }

    fn partition_key(&self) -> String {
        self.video_id.to_string()
    }
}

// ============================================================================
// Version compatibility helpers
// ============================================================================

pub fn is_compatible(current_version: u32, message_version: u32) -> bool {
    // Exact match until a second schema version exists
    current_version == message_version
}

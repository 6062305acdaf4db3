//! Post-commit side effects.
//!
//! The coordinator hands committed values to `NotificationEmitter`, which
//! builds the outbound events and dispatches them on a spawned task. A failed
//! delivery is logged and counted; it never reaches the caller whose
//! operation already committed.

use async_trait::async_trait;
use chrono::Utc;
use event_schema::{
    NotificationChannel, PersistNotificationEvent, TopicEvent, UpdateVideoCommentsMetricsEvent,
};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::{Creator, ForumCounters};
use crate::metrics;

/// Events leaving the service after a commit
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundEvent {
    Notification(PersistNotificationEvent),
    CommentsMetrics(UpdateVideoCommentsMetricsEvent),
}

impl OutboundEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Notification(_) => PersistNotificationEvent::EVENT_TYPE,
            Self::CommentsMetrics(_) => UpdateVideoCommentsMetricsEvent::EVENT_TYPE,
        }
    }
}

/// Messaging client handle. Its connection lifecycle belongs to `main`.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OutboundEvent) -> anyhow::Result<()>;
}

/// Publisher used when no broker is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, event: &OutboundEvent) -> anyhow::Result<()> {
        debug!(
            event_type = event.event_type(),
            "Kafka disabled, dropping outbound event"
        );
        Ok(())
    }
}

fn channel_of(author: &Creator) -> NotificationChannel {
    NotificationChannel {
        nickname: author.nickname.clone(),
        thumbnail_url: author.thumbnail_url.clone(),
    }
}

/// Alert for the forum owner about a new root comment; `None` for the owner's own comment
pub fn root_comment_notification(
    owner_id: Uuid,
    video_id: Uuid,
    author: &Creator,
) -> Option<PersistNotificationEvent> {
    if owner_id == author.id {
        return None;
    }

    Some(PersistNotificationEvent::new(
        owner_id,
        format!("{} left a comment on your video", author.display_name),
        format!("/dashboard/videos/{}?tab=comments", video_id),
        channel_of(author),
    ))
}

/// Alert for the parent author about a reply; `None` for a self-reply
pub fn reply_notification(
    parent_author_id: Uuid,
    video_id: Uuid,
    parent_comment_id: Uuid,
    author: &Creator,
) -> Option<PersistNotificationEvent> {
    if parent_author_id == author.id {
        return None;
    }

    Some(PersistNotificationEvent::new(
        parent_author_id,
        format!("{} replied to your comment!", author.display_name),
        format!(
            "/watch?videoId={}&commentId={}",
            video_id, parent_comment_id
        ),
        channel_of(author),
    ))
}

/// Alert for the comment author about a like; `None` when liking one's own comment
pub fn like_notification(
    comment_author_id: Uuid,
    video_id: Uuid,
    comment_id: Uuid,
    voter: &Creator,
) -> Option<PersistNotificationEvent> {
    if comment_author_id == voter.id {
        return None;
    }

    Some(PersistNotificationEvent::new(
        comment_author_id,
        format!("{} liked your comment!", voter.display_name),
        format!("/watch?videoId={}&commentId={}", video_id, comment_id),
        channel_of(voter),
    ))
}

#[derive(Clone)]
pub struct NotificationEmitter {
    publisher: Arc<dyn EventPublisher>,
}

impl NotificationEmitter {
    pub fn new(publisher: Arc<dyn EventPublisher>) -> Self {
        Self { publisher }
    }

    pub fn noop() -> Self {
        Self::new(Arc::new(NoopPublisher))
    }

    pub fn notify(&self, event: Option<PersistNotificationEvent>) {
        if let Some(event) = event {
            self.dispatch(OutboundEvent::Notification(event));
        }
    }

    pub fn comments_metrics(&self, video_id: Uuid, counters: ForumCounters) {
        self.dispatch(OutboundEvent::CommentsMetrics(
            UpdateVideoCommentsMetricsEvent::new(
                video_id,
                counters.video_comments_count,
                Utc::now(),
            ),
        ));
    }

    /// Fire and forget. Must be called after the transaction committed.
    pub fn dispatch(&self, event: OutboundEvent) {
        let publisher = Arc::clone(&self.publisher);
        tokio::spawn(async move {
            let event_type = event.event_type();
            match publisher.publish(&event).await {
                Ok(()) => {
                    metrics::record_outbound_event(event_type, "sent");
                    debug!(event_type, "Outbound event dispatched");
                }
                Err(err) => {
                    metrics::record_outbound_event(event_type, "failed");
                    warn!(
                        error = %err,
                        event_type,
                        "Failed to dispatch outbound event"
                    );
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn creator(display_name: &str) -> Creator {
        Creator {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            nickname: format!("@{}", display_name.to_lowercase()),
            thumbnail_url: "https://cdn.example/t.png".to_string(),
        }
    }

    #[test]
    fn test_root_comment_message_and_url() {
        let author = creator("Ann");
        let owner = Uuid::new_v4();
        let video = Uuid::new_v4();

        let event = root_comment_notification(owner, video, &author).unwrap();
        assert_eq!(event.creator_id, owner);
        assert_eq!(event.message, "Ann left a comment on your video");
        assert_eq!(event.url, format!("/dashboard/videos/{}?tab=comments", video));
        assert_eq!(event.channel.nickname, "@ann");
    }

    #[test]
    fn test_reply_points_at_parent_comment() {
        let author = creator("Bob");
        let parent_author = Uuid::new_v4();
        let video = Uuid::new_v4();
        let parent = Uuid::new_v4();

        let event = reply_notification(parent_author, video, parent, &author).unwrap();
        assert_eq!(event.message, "Bob replied to your comment!");
        assert_eq!(
            event.url,
            format!("/watch?videoId={}&commentId={}", video, parent)
        );
    }

    #[test]
    fn test_self_actions_are_silent() {
        let author = creator("Cy");
        let video = Uuid::new_v4();

        assert!(root_comment_notification(author.id, video, &author).is_none());
        assert!(reply_notification(author.id, video, Uuid::new_v4(), &author).is_none());
        assert!(like_notification(author.id, video, Uuid::new_v4(), &author).is_none());
    }

    #[test]
    fn test_notification_ids_are_fresh() {
        let author = creator("Di");
        let owner = Uuid::new_v4();
        let video = Uuid::new_v4();

        let a = like_notification(owner, video, Uuid::new_v4(), &author).unwrap();
        let b = like_notification(owner, video, Uuid::new_v4(), &author).unwrap();
        assert_ne!(a.notification_id, b.notification_id);
        assert_eq!(a.message, "Di liked your comment!");
    }

    struct FailingPublisher {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl EventPublisher for FailingPublisher {
        async fn publish(&self, _event: &OutboundEvent) -> anyhow::Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("broker unavailable")
        }
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_swallowed() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let emitter = NotificationEmitter::new(Arc::new(FailingPublisher {
            attempts: Arc::clone(&attempts),
        }));

        emitter.comments_metrics(
            Uuid::new_v4(),
            ForumCounters {
                video_comments_count: 3,
                root_video_comments_count: 2,
            },
        );

        for _ in 0..50 {
            if attempts.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}

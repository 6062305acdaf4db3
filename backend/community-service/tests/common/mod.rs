#![allow(dead_code)]

use async_trait::async_trait;
use community_service::domain::{Creator, Forum};
use community_service::repository::InMemoryCommunityStore;
use community_service::services::{
    CommunityService, EventPublisher, NotificationEmitter, OutboundEvent,
};
use event_schema::{PersistNotificationEvent, UpdateVideoCommentsMetricsEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Forwards every published event to the test
pub struct RecordingPublisher {
    tx: mpsc::UnboundedSender<OutboundEvent>,
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &OutboundEvent) -> anyhow::Result<()> {
        self.tx
            .send(event.clone())
            .map_err(|_| anyhow::anyhow!("recorder closed"))
    }
}

pub struct Harness {
    pub service: CommunityService<InMemoryCommunityStore>,
    pub store: InMemoryCommunityStore,
    events: mpsc::UnboundedReceiver<OutboundEvent>,
}

impl Harness {
    pub fn new() -> Self {
        let (tx, events) = mpsc::unbounded_channel();
        let store = InMemoryCommunityStore::new();
        let service = CommunityService::new(
            Arc::new(store.clone()),
            NotificationEmitter::new(Arc::new(RecordingPublisher { tx })),
        );
        Self {
            service,
            store,
            events,
        }
    }

    pub async fn creator(&self, display_name: &str) -> Creator {
        let creator = Creator {
            id: Uuid::new_v4(),
            display_name: display_name.to_string(),
            nickname: display_name.to_lowercase(),
            thumbnail_url: format!("https://cdn.example/{}.png", display_name.to_lowercase()),
        };
        self.service.sync_creator(creator.clone()).await.unwrap();
        creator
    }

    pub async fn forum(&self, owner: &Creator) -> Forum {
        self.service
            .register_forum(Uuid::new_v4(), owner.id)
            .await
            .unwrap()
    }

    pub async fn forum_state(&self, video_id: Uuid) -> Forum {
        use community_service::repository::CommunityStore;
        self.store.find_forum(video_id).await.unwrap().unwrap()
    }

    /// Collect everything dispatched within `wait`
    pub async fn drain(&mut self, wait: Duration) -> Vec<OutboundEvent> {
        let mut collected = Vec::new();
        let deadline = tokio::time::Instant::now() + wait;
        while let Ok(Some(event)) = tokio::time::timeout_at(deadline, self.events.recv()).await {
            collected.push(event);
        }
        collected
    }

    pub async fn notifications(&mut self) -> Vec<PersistNotificationEvent> {
        self.drain(Duration::from_millis(150))
            .await
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::Notification(n) => Some(n),
                OutboundEvent::CommentsMetrics(_) => None,
            })
            .collect()
    }

    pub async fn metrics_events(&mut self) -> Vec<UpdateVideoCommentsMetricsEvent> {
        self.drain(Duration::from_millis(150))
            .await
            .into_iter()
            .filter_map(|event| match event {
                OutboundEvent::CommentsMetrics(m) => Some(m),
                OutboundEvent::Notification(_) => None,
            })
            .collect()
    }
}

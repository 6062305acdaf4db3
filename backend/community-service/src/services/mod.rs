pub mod community;
pub mod kafka_events;
pub mod notifications;

pub use community::CommunityService;
pub use kafka_events::KafkaEventPublisher;
pub use notifications::{EventPublisher, NoopPublisher, NotificationEmitter, OutboundEvent};

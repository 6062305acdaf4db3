pub mod forum_events;

pub use forum_events::ForumEventsConsumer;

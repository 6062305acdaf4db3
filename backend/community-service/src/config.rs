/// Configuration management for Community Service
///
/// Loads configuration from environment variables.
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application settings
    pub app: AppConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Kafka configuration
    pub kafka: KafkaConfig,
}

/// Application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Application environment (dev, staging, prod)
    pub env: String,
    /// Server host to bind to
    pub host: String,
    /// HTTP port for the REST API, health checks and metrics
    pub http_port: u16,
    /// "json" switches log output to JSON lines
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database URL
    pub url: String,
    /// Max connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Min connections in pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Kafka configuration; messaging is disabled when `brokers` is unset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
    /// Outbound `persist_notification` events
    #[serde(default = "default_notification_topic")]
    pub notification_topic: String,
    /// Outbound `update_video_comments_metrics` events
    #[serde(default = "default_metrics_topic")]
    pub metrics_topic: String,
    /// Inbound forum lifecycle and creator events
    #[serde(default = "default_forum_events_topic")]
    pub forum_events_topic: String,
    #[serde(default = "default_group_id")]
    pub group_id: String,
}

impl KafkaConfig {
    pub fn enabled_brokers(&self) -> Option<&str> {
        self.brokers
            .as_deref()
            .map(str::trim)
            .filter(|brokers| !brokers.is_empty())
    }
}

// Default values
fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_log_format() -> String {
    "text".to_string()
}

fn default_notification_topic() -> String {
    "persist_notification".to_string()
}

fn default_metrics_topic() -> String {
    "update_video_comments_metrics".to_string()
}

fn default_forum_events_topic() -> String {
    "community.forum.events".to_string()
}

fn default_group_id() -> String {
    "community-service".to_string()
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let app = AppConfig {
            env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8010),
            log_format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| default_log_format()),
        };

        let database = DatabaseConfig {
            url: std::env::var("DATABASE_URL")
                .context("DATABASE_URL environment variable not set")?,
            max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_max_connections),
            min_connections: std::env::var("DB_MIN_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_min_connections),
        };

        let kafka = KafkaConfig {
            brokers: std::env::var("KAFKA_BROKERS").ok(),
            notification_topic: std::env::var("KAFKA_NOTIFICATION_TOPIC")
                .unwrap_or_else(|_| default_notification_topic()),
            metrics_topic: std::env::var("KAFKA_METRICS_TOPIC")
                .unwrap_or_else(|_| default_metrics_topic()),
            forum_events_topic: std::env::var("KAFKA_FORUM_EVENTS_TOPIC")
                .unwrap_or_else(|_| default_forum_events_topic()),
            group_id: std::env::var("KAFKA_COMMUNITY_GROUP_ID")
                .unwrap_or_else(|_| default_group_id()),
        };

        Ok(Config {
            app,
            database,
            kafka,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Single test so env mutations never race with each other
    #[test]
    fn test_from_env_defaults_and_overrides() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::remove_var("KAFKA_BROKERS");
        std::env::remove_var("PORT");

        let config = Config::from_env().unwrap();

        assert_eq!(config.app.env, "development");
        assert_eq!(config.app.host, "0.0.0.0");
        assert_eq!(config.app.http_port, 8010);
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.database.min_connections, 5);
        assert_eq!(config.kafka.notification_topic, "persist_notification");
        assert_eq!(config.kafka.metrics_topic, "update_video_comments_metrics");
        assert!(config.kafka.enabled_brokers().is_none());

        std::env::set_var("KAFKA_BROKERS", "  ");
        let config = Config::from_env().unwrap();
        assert!(config.kafka.enabled_brokers().is_none());

        std::env::set_var("KAFKA_BROKERS", "kafka:9092");
        std::env::set_var("PORT", "9000");
        let config = Config::from_env().unwrap();
        assert_eq!(config.kafka.enabled_brokers(), Some("kafka:9092"));
        assert_eq!(config.app.http_port, 9000);

        std::env::remove_var("KAFKA_BROKERS");
        std::env::remove_var("PORT");
    }
}

use actix_web::{web, App, HttpResponse, HttpServer};
use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use community_service::config::Config;
use community_service::consumers::ForumEventsConsumer;
use community_service::handlers;
use community_service::metrics;
use community_service::repository::PgCommunityStore;
use community_service::services::{
    CommunityService, EventPublisher, KafkaEventPublisher, NoopPublisher, NotificationEmitter,
};

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,community_service=debug".into());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn readiness(pool: web::Data<PgPool>) -> HttpResponse {
    match sqlx::query("SELECT 1").execute(pool.get_ref()).await {
        Ok(_) => HttpResponse::Ok().body("READY"),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            HttpResponse::ServiceUnavailable().body("NOT READY")
        }
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(&config.app.log_format);

    info!(
        env = %config.app.env,
        http_port = config.app.http_port,
        "Starting community-service"
    );

    // Prepared statement caching disabled for PgBouncer transaction mode
    let connect_options = PgConnectOptions::from_str(&config.database.url)
        .context("Failed to parse DATABASE_URL")?
        .statement_cache_capacity(0);

    let pg_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pg_pool)
        .await
        .context("Failed to run database migrations")?;
    info!("Database pool created and migrations applied");

    // Messaging client; owned here for the whole process lifetime
    let brokers = config.kafka.enabled_brokers().map(str::to_string);
    let publisher: Arc<dyn EventPublisher> = match brokers.as_deref() {
        Some(brokers) => Arc::new(
            KafkaEventPublisher::new(brokers, &config.kafka)
                .context("Failed to initialize Kafka publisher")?,
        ),
        None => {
            info!("KAFKA_BROKERS not configured, outbound events are dropped");
            Arc::new(NoopPublisher)
        }
    };

    let store = Arc::new(PgCommunityStore::new(pg_pool.clone()));
    let service = CommunityService::new(store, NotificationEmitter::new(publisher));

    let mut join_set = JoinSet::new();

    if let Some(brokers) = brokers {
        let consumer = ForumEventsConsumer::new(
            service.clone(),
            brokers,
            config.kafka.group_id.clone(),
            config.kafka.forum_events_topic.clone(),
        );
        join_set.spawn(async move {
            consumer.run().await;
            Ok(())
        });
        info!("Forum events consumer started");
    } else {
        info!("Forum events consumer disabled: KAFKA_BROKERS not configured");
    }

    let http_addr = format!("{}:{}", config.app.host, config.app.http_port);
    let service_data = web::Data::new(service);
    let pool_data = web::Data::new(pg_pool.clone());

    let http_server = HttpServer::new(move || {
        App::new()
            .app_data(service_data.clone())
            .app_data(pool_data.clone())
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/ready", web::get().to(readiness))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(handlers::register_routes::<PgCommunityStore>)
    })
    .bind(&http_addr)
    .context("Failed to bind HTTP server")?
    .disable_signals()
    .run();

    let server_handle = http_server.handle();
    join_set.spawn(async move {
        http_server
            .await
            .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))
    });
    info!(address = %http_addr, "HTTP server started");

    join_set.spawn(async move {
        shutdown_signal().await;
        info!("Shutdown signal received");
        server_handle.stop(true).await;
        Ok(())
    });

    // Wait for the first task to finish, then stop the rest
    if let Some(result) = join_set.join_next().await {
        match result {
            Ok(Ok(())) => info!("Task completed"),
            Ok(Err(e)) => {
                tracing::error!("Task failed: {:#}", e);
                join_set.shutdown().await;
                return Err(e);
            }
            Err(e) => {
                tracing::error!("Task panicked: {:#}", e);
                join_set.shutdown().await;
                return Err(anyhow::anyhow!("Task panicked: {}", e));
            }
        }
    }
    join_set.shutdown().await;

    pg_pool.close().await;
    info!("community-service shut down");
    Ok(())
}

//! Application coordinator.
//!
//! [`ConferenceApp`] owns every long-lived component:
//!
//! ```text
//! HTTP listener ──► Router ──► Services ──► EntityStore (memory | postgres)
//!                                  │
//!                                  └──► TaskQueue ──► TaskWorker ──► Cache (memory | redis)
//!                                                          └───────► EmailSender (console)
//! announcement interval ──► AnnouncementService::refresh
//! metrics listener ──► /metrics (Prometheus)
//! ```

use crate::cache::RedisCache;
use crate::config::{CacheBackend, Config, ConfigError, StoreBackend};
use crate::server::{AppState, build_router};
use crate::services::{AnnouncementService, Dependencies, Services};
use axum::{Router, routing::get};
use conference_core::environment::SystemClock;
use conference_core::{Cache, CacheError, EntityStore, StoreError, Task};
use conference_postgres::PostgresEntityStore;
use conference_runtime::metrics::{MetricsError, MetricsServer};
use conference_runtime::retry::RetryPolicy;
use conference_runtime::{ConsoleEmailSender, EmailSender, TaskQueue, TaskWorker};
use conference_testing::{InMemoryCache, InMemoryEntityStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc::Receiver;

/// Time the worker gets to drain queued tasks on shutdown.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors starting or running the application.
#[derive(Error, Debug)]
pub enum AppError {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Entity store connection or migration failed
    #[error("Entity store error: {0}")]
    Store(#[from] StoreError),

    /// Cache connection failed
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Metrics recorder could not be installed
    #[error(transparent)]
    Metrics(#[from] MetricsError),

    /// A listen address does not parse
    #[error("Invalid listen address {0:?}")]
    Address(String),

    /// Binding or serving failed
    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

/// The conference backend, wired and ready to run.
pub struct ConferenceApp {
    config: Config,
    services: Services,
    worker: TaskWorker,
    receiver: Receiver<Task>,
    metrics: MetricsServer,
}

impl ConferenceApp {
    /// Connect the configured backends and wire every service.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if a backend cannot be reached, the schema cannot be
    /// installed, or the metrics address is invalid.
    pub async fn new(config: Config) -> Result<Self, AppError> {
        tracing::info!("Initializing conference application...");

        let store = connect_store(&config).await?;
        let cache = connect_cache(&config).await?;
        let email: Arc<dyn EmailSender> =
            Arc::new(ConsoleEmailSender::new(config.tasks.email_sender.clone()));

        let (queue, receiver) = TaskQueue::bounded(config.tasks.queue_capacity);
        let retry = RetryPolicy::builder()
            .max_retries(config.registration.max_retries)
            .initial_delay(config.registration.initial_backoff())
            .max_delay(config.registration.max_backoff())
            .build();

        let services = Services::new(Dependencies {
            store: Arc::clone(&store),
            cache: Arc::clone(&cache),
            notifications: Arc::new(queue),
            email: Arc::clone(&email),
            clock: Arc::new(SystemClock),
            retry,
        });
        let worker = TaskWorker::new(store, cache, email);

        let metrics_addr = config.metrics_address();
        let metrics_addr: SocketAddr = metrics_addr
            .parse()
            .map_err(|_| AppError::Address(metrics_addr))?;

        tracing::info!("✓ Application initialized");
        Ok(Self {
            config,
            services,
            worker,
            receiver,
            metrics: MetricsServer::new(metrics_addr),
        })
    }

    /// The application services.
    #[must_use]
    pub const fn services(&self) -> &Services {
        &self.services
    }

    /// The HTTP router, without binding a listener.
    #[must_use]
    pub fn router(&self) -> Router {
        build_router(AppState::new(self.services.clone()))
    }

    /// Serve until Ctrl+C.
    ///
    /// Starts the task worker, the announcement interval and the metrics listener, then
    /// serves the API with graceful shutdown. Queued tasks get a short grace period to
    /// drain before returning.
    ///
    /// # Errors
    ///
    /// Returns [`AppError`] if a listener cannot be bound or the metrics recorder cannot
    /// be installed.
    pub async fn run(self) -> Result<(), AppError> {
        let Self {
            config,
            services,
            worker,
            receiver,
            mut metrics,
        } = self;

        metrics.start()?;
        let worker_handle = tokio::spawn(worker.run(receiver));
        let refresher = tokio::spawn(refresh_announcements(
            services.announcements.clone(),
            Duration::from_secs(config.tasks.announcement_refresh_secs.max(1)),
        ));

        let metrics_listener = TcpListener::bind(metrics.addr()).await?;
        let metrics = Arc::new(metrics);
        let metrics_router = Router::new().route(
            "/metrics",
            get(move || {
                let metrics = Arc::clone(&metrics);
                async move { metrics.render().unwrap_or_default() }
            }),
        );
        let metrics_server = tokio::spawn(async move {
            if let Err(err) = axum::serve(metrics_listener, metrics_router).await {
                tracing::error!(error = %err, "Metrics server failed");
            }
        });

        let listener = TcpListener::bind(config.bind_address()).await?;
        tracing::info!(
            addr = %listener.local_addr()?,
            metrics = %config.metrics_address(),
            store = ?config.store.backend,
            cache = ?config.cache.backend,
            "🎤 Conference server is running"
        );

        axum::serve(listener, build_router(AppState::new(services)))
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Shutting down gracefully...");
        refresher.abort();
        metrics_server.abort();
        // The router held the last queue handles; the worker stops once the queue drains.
        if tokio::time::timeout(DRAIN_TIMEOUT, worker_handle).await.is_err() {
            tracing::warn!("Task worker did not drain in time, pending tasks dropped");
        }
        Ok(())
    }
}

async fn connect_store(config: &Config) -> Result<Arc<dyn EntityStore>, AppError> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using the in-memory entity store, data is lost on restart");
            Ok(Arc::new(InMemoryEntityStore::new()))
        }
        StoreBackend::Postgres => {
            tracing::info!("Connecting to PostgreSQL entity store...");
            let store = PostgresEntityStore::connect(
                &config.store.database_url,
                config.store.max_connections,
                Duration::from_secs(config.store.connect_timeout),
            )
            .await?;
            store.migrate().await?;
            tracing::info!("✓ Entity store ready");
            Ok(Arc::new(store))
        }
    }
}

async fn connect_cache(config: &Config) -> Result<Arc<dyn Cache>, AppError> {
    match config.cache.backend {
        CacheBackend::Memory => Ok(Arc::new(InMemoryCache::new())),
        CacheBackend::Redis => {
            tracing::info!("Connecting to Redis cache...");
            let cache = RedisCache::new(&config.cache.redis_url).await?;
            tracing::info!("✓ Cache connected");
            Ok(Arc::new(cache))
        }
    }
}

async fn refresh_announcements(announcements: AnnouncementService, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        if let Err(err) = announcements.refresh().await {
            tracing::warn!(error = %err, "Announcement refresh failed");
        }
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for Ctrl+C");
    }
}

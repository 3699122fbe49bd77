//! Service wiring
//!
//! `AppState` assembles the production service: configuration in, then the
//! notification sink (AMQP or logging fallback), then the engine sharing a
//! metrics collector with the monitoring server.

use crate::amqp::connection::AmqpConnection;
use crate::amqp::publisher::{
    AmqpNotificationSink, LoggingNotificationSink, NotificationSink, PublisherConfig,
};
use crate::config::AppConfig;
use crate::metrics::MetricsCollector;
use crate::queue::engine::{EngineSettings, EngineStats, MatchmakingEngine};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Errors raised while assembling or tearing down the service
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("AMQP connection error: {message}")]
    AmqpConnection { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Everything a running service instance owns
pub struct AppState {
    config: AppConfig,
    engine: MatchmakingEngine,
    /// Shared with the monitoring server
    metrics: Arc<MetricsCollector>,
    /// Present when event publishing is enabled
    amqp_connection: Option<Arc<AmqpConnection>>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Assemble the service from its configuration
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!(
            "Assembling party-finder: {} roles per party, {}s queue expiry",
            config.matchmaking.roles.party_size(),
            config.matchmaking.expiry_seconds
        );

        let metrics = Arc::new(MetricsCollector::new().map_err(|e| {
            ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            }
        })?);

        let (sink, amqp_connection) = Self::build_sink(&config).await?;

        let engine = MatchmakingEngine::with_metrics(
            config.matchmaking.roles.clone(),
            EngineSettings::from(&config.matchmaking),
            sink,
            metrics.clone(),
        );

        Ok(Self {
            config,
            engine,
            metrics,
            amqp_connection,
            is_running: Arc::new(RwLock::new(false)),
        })
    }

    /// Connect the notification sink; without a broker, events are logged
    async fn build_sink(
        config: &AppConfig,
    ) -> Result<(Arc<dyn NotificationSink>, Option<Arc<AmqpConnection>>), ServiceError> {
        if !config.amqp.enabled {
            warn!("AMQP publishing disabled, events will only be logged");
            return Ok((Arc::new(LoggingNotificationSink), None));
        }

        let connection = AmqpConnection::connect(&config.amqp).await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("Failed to connect to AMQP broker: {}", e),
            }
        })?;

        let channel = connection.open_channel().await.map_err(|e| {
            ServiceError::AmqpConnection {
                message: format!("Failed to open AMQP channel: {}", e),
            }
        })?;

        let sink = AmqpNotificationSink::new(channel, PublisherConfig::default())
            .await
            .map_err(|e| ServiceError::AmqpConnection {
                message: format!("Failed to set up AMQP publisher: {}", e),
            })?;

        Ok((Arc::new(sink), Some(Arc::new(connection))))
    }

    /// Mark the service as accepting operations
    pub async fn start(&self) -> Result<(), ServiceError> {
        *self.is_running.write().await = true;
        info!("party-finder service started");
        Ok(())
    }

    /// Graceful teardown: stop accepting work, cancel timers, drop queues
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        *self.is_running.write().await = false;

        if let Err(e) = self.engine.shutdown().await {
            warn!("Engine shutdown reported an error: {}", e);
        }

        match self.engine.stats() {
            Ok(stats) => info!("Final counters: {:?}", stats),
            Err(e) => warn!("Failed to read final stats: {}", e),
        }

        info!("party-finder service stopped");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn engine(&self) -> &MatchmakingEngine {
        &self.engine
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    pub fn amqp_connection(&self) -> Option<Arc<AmqpConnection>> {
        self.amqp_connection.clone()
    }

    /// Counters maintained by the engine
    pub fn engine_stats(&self) -> crate::error::Result<EngineStats> {
        self.engine.stats()
    }
}

//! Health reporting for the matchmaking service
//!
//! Builds the liveness/readiness answers served by the monitoring endpoints
//! from the running-flag, the engine and the notification sink.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        };
        f.write_str(label)
    }
}

/// Full health report, served by the /stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// One component's contribution to the overall status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

/// Engine counters included in health reports
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_queues: usize,
    pub participants_waiting: usize,
    pub parties_formed: u64,
    pub joins_admitted: u64,
    pub uptime_info: String,
}

impl HealthCheck {
    /// Inspect every component and derive the overall status
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let checks = vec![
            running_check(&app_state).await,
            engine_check(&app_state),
            sink_check(&app_state),
        ];

        Ok(HealthCheck {
            status: worst_of(&checks),
            service: app_state.config().service.name.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            stats: gather_stats(&app_state),
            checks,
        })
    }

    /// Liveness: is the service loop still considered running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        Ok(if app_state.is_running().await {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy
        })
    }

    /// Readiness: running and the engine answers
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }
        Ok(engine_check(&app_state).status)
    }

    /// Pretty-printed JSON form of the report
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

/// Most severe status across all component checks
fn worst_of(checks: &[ComponentCheck]) -> HealthStatus {
    if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

fn component(name: &str, status: HealthStatus, message: Option<String>) -> ComponentCheck {
    ComponentCheck {
        name: name.to_string(),
        status,
        message,
    }
}

async fn running_check(app_state: &AppState) -> ComponentCheck {
    if app_state.is_running().await {
        component("service_running", HealthStatus::Healthy, None)
    } else {
        component(
            "service_running",
            HealthStatus::Unhealthy,
            Some("Service is not running".to_string()),
        )
    }
}

fn engine_check(app_state: &AppState) -> ComponentCheck {
    match app_state.engine_stats() {
        Ok(_) => component("matchmaking_engine", HealthStatus::Healthy, None),
        Err(e) => component(
            "matchmaking_engine",
            HealthStatus::Unhealthy,
            Some(format!("Stats check failed: {}", e)),
        ),
    }
}

fn sink_check(app_state: &AppState) -> ComponentCheck {
    // Logging-only mode counts as degraded: matchmaking works but nobody
    // downstream sees the events.
    if !app_state.config().amqp.enabled {
        component(
            "notification_sink",
            HealthStatus::Degraded,
            Some("AMQP publishing disabled".to_string()),
        )
    } else if app_state.amqp_connection().is_some() {
        component("notification_sink", HealthStatus::Healthy, None)
    } else {
        component(
            "notification_sink",
            HealthStatus::Degraded,
            Some("AMQP connection not established".to_string()),
        )
    }
}

fn gather_stats(app_state: &AppState) -> ServiceStats {
    match app_state.engine_stats() {
        Ok(stats) => ServiceStats {
            active_queues: stats.active_queues,
            participants_waiting: stats.participants_waiting,
            parties_formed: stats.parties_formed,
            joins_admitted: stats.joins_admitted,
            uptime_info: format!(
                "Queues created: {}, expired: {}, deleted: {}",
                stats.queues_created, stats.queues_expired, stats.queues_deleted
            ),
        },
        Err(e) => {
            debug!("Engine stats unavailable for health report: {}", e);
            ServiceStats {
                active_queues: 0,
                participants_waiting: 0,
                parties_formed: 0,
                joins_admitted: 0,
                uptime_info: "Service running".to_string(),
            }
        }
    }
}

//! Matchmaking engine for handling multiple role queues
//!
//! This module provides the core MatchmakingEngine that orchestrates queue
//! creation, join/leave handling, party formation and the expiration
//! lifecycle. All mutating operations on one queue name are serialized
//! through that queue's own exclusion; operations on different names run
//! concurrently.

use crate::amqp::publisher::{publish_event, NotificationSink};
use crate::config::app::MatchmakingSettings;
use crate::config::roles::RoleSlotSet;
use crate::error::{PartyFinderError, Result};
use crate::metrics::MetricsCollector;
use crate::queue::state::QueueState;
use crate::types::{
    JoinAck, LeaveAck, PartyFormed, QueueCreated, QueueDeleted, QueueEvent, QueueExpired,
    QueueSnapshot, QueueStateChanged,
};
use crate::utils::{current_timestamp, generate_registration_id};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine-level timing configuration
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// How long an incomplete queue stays alive
    pub expiry: Duration,
    /// Delay before a completed queue is auto-deleted; zero disables it
    pub post_completion_grace: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(3600),
            post_completion_grace: Duration::ZERO,
        }
    }
}

impl From<&MatchmakingSettings> for EngineSettings {
    fn from(settings: &MatchmakingSettings) -> Self {
        Self {
            expiry: Duration::from_secs(settings.expiry_seconds),
            post_completion_grace: Duration::from_secs(settings.post_completion_grace_seconds),
        }
    }
}

/// Statistics about engine operations
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    /// Total number of queues created
    pub queues_created: u64,
    /// Total number of queues discarded by expiration
    pub queues_expired: u64,
    /// Total number of queues removed by deletion
    pub queues_deleted: u64,
    /// Total number of parties formed
    pub parties_formed: u64,
    /// Total number of joins admitted
    pub joins_admitted: u64,
    /// Total number of participants that left a queue
    pub leaves: u64,
    /// Current number of live queues
    pub active_queues: usize,
    /// Current number of participants waiting across all queues
    pub participants_waiting: usize,
}

/// Which deadline a queue timer enforces
#[derive(Debug, Clone, Copy)]
enum TimerKind {
    Expiry,
    Grace,
}

/// One registered queue: its state behind the per-queue exclusion,
/// plus the timer currently armed for it
struct QueueHandle {
    /// Unique per registration; a timer only acts if the registry still
    /// maps the name to the registration it was armed for
    registration: Uuid,
    state: Mutex<QueueState>,
    timer: std::sync::Mutex<Option<JoinHandle<()>>>,
}

/// The main matchmaking engine
#[derive(Clone)]
pub struct MatchmakingEngine {
    /// Map of live queues by name
    registry: Arc<RwLock<HashMap<String, Arc<QueueHandle>>>>,
    /// Party composition shared by every queue
    roles: Arc<RoleSlotSet>,
    /// Timing configuration
    settings: EngineSettings,
    /// Engine statistics
    stats: Arc<RwLock<EngineStats>>,
    /// Metrics collector for recording performance data
    metrics: Arc<MetricsCollector>,
    /// Ordered event channel drained by the dispatcher task
    events_tx: mpsc::UnboundedSender<QueueEvent>,
}

impl MatchmakingEngine {
    /// Create a new engine delivering events to the given sink
    pub fn new(
        roles: RoleSlotSet,
        settings: EngineSettings,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        let metrics = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(roles, settings, sink, metrics)
    }

    /// Create a new engine with an explicit metrics collector
    pub fn with_metrics(
        roles: RoleSlotSet,
        settings: EngineSettings,
        sink: Arc<dyn NotificationSink>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel::<QueueEvent>();

        // Dispatcher: delivers events to the sink in emission order so a
        // slow external render never stalls matchmaking.
        tokio::spawn(async move {
            while let Some(event) = events_rx.recv().await {
                if let Err(e) = publish_event(sink.as_ref(), event).await {
                    warn!("Failed to publish notification: {}", e);
                }
            }
            debug!("Notification dispatcher stopped");
        });

        Self {
            registry: Arc::new(RwLock::new(HashMap::new())),
            roles: Arc::new(roles),
            settings,
            stats: Arc::new(RwLock::new(EngineStats::default())),
            metrics,
            events_tx,
        }
    }

    /// Role composition shared by every queue
    pub fn roles(&self) -> &RoleSlotSet {
        &self.roles
    }

    /// Register a new named queue and arm its expiration timer
    pub async fn create_queue(&self, name: &str) -> Result<QueueSnapshot> {
        let now = current_timestamp();
        let expires_at = chrono::Duration::from_std(self.settings.expiry)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MAX_UTC);

        let handle = Arc::new(QueueHandle {
            registration: generate_registration_id(),
            state: Mutex::new(QueueState::new(name, self.roles.clone(), now, expires_at)),
            timer: std::sync::Mutex::new(None),
        });

        // Hold the queue exclusion across registration so the creation
        // event precedes any state change from a racing join.
        let state = handle.state.lock().await;

        {
            let mut registry = self.write_registry()?;
            if registry.contains_key(name) {
                return Err(PartyFinderError::QueueAlreadyExists {
                    name: name.to_string(),
                }
                .into());
            }
            registry.insert(name.to_string(), handle.clone());
        }

        self.spawn_timer(&handle, name, TimerKind::Expiry, self.settings.expiry);

        {
            let mut stats = self.write_stats()?;
            stats.queues_created += 1;
            stats.active_queues += 1;
        }
        self.metrics.record_queue_created();

        let snapshot = state.snapshot();
        self.emit(QueueEvent::QueueCreated(QueueCreated {
            name: name.to_string(),
            snapshot: snapshot.clone(),
            timestamp: now,
        }));

        info!(
            "Created queue '{}' for {} roles, expires at {}",
            name,
            self.roles.party_size(),
            expires_at
        );
        Ok(snapshot)
    }

    /// Admit a participant into a role of a named queue
    ///
    /// Returns the caller's private acknowledgment; watchers learn about the
    /// change through the broadcast `QueueStateChanged` notification.
    pub async fn join(&self, name: &str, participant: &str, role: &str) -> Result<JoinAck> {
        let started = Instant::now();
        let handle = self.lookup(name)?;
        let mut state = handle.state.lock().await;

        if !state.is_open() {
            self.metrics.record_join(role, "not_found", started.elapsed());
            return Err(PartyFinderError::QueueNotFound {
                name: name.to_string(),
            }
            .into());
        }

        let position = match state.join(participant, role) {
            Ok(position) => position,
            Err(e) => {
                self.metrics.record_join(role, join_outcome(&e), started.elapsed());
                debug!(
                    "Rejected join of '{}' as {} in queue '{}': {}",
                    participant, role, name, e
                );
                return Err(e);
            }
        };

        debug!(
            "Participant '{}' joined queue '{}' as {} (position {})",
            participant, name, role, position
        );

        self.emit(QueueEvent::QueueStateChanged(QueueStateChanged {
            name: name.to_string(),
            snapshot: state.snapshot(),
            timestamp: current_timestamp(),
        }));

        // Completion check runs at the end of every successful join, so
        // formation happens in the same exclusion as the admitting join.
        let mut party_size = 0;
        if state.is_complete() {
            let party = state.form_party();
            party_size = party.size();

            info!(
                "Party formed for queue '{}' with {} members",
                name, party_size
            );

            self.emit(QueueEvent::PartyFormed(PartyFormed {
                name: name.to_string(),
                party,
                timestamp: current_timestamp(),
            }));
            self.emit(QueueEvent::QueueStateChanged(QueueStateChanged {
                name: name.to_string(),
                snapshot: state.snapshot(),
                timestamp: current_timestamp(),
            }));

            if !self.settings.post_completion_grace.is_zero() {
                // The grace timer supersedes the expiry timer.
                self.spawn_timer(
                    &handle,
                    name,
                    TimerKind::Grace,
                    self.settings.post_completion_grace,
                );
            }
        }
        drop(state);

        {
            let mut stats = self.write_stats()?;
            stats.joins_admitted += 1;
            if party_size > 0 {
                stats.parties_formed += 1;
                stats.participants_waiting =
                    (stats.participants_waiting + 1).saturating_sub(party_size);
            } else {
                stats.participants_waiting += 1;
            }
        }
        self.metrics.record_join(role, "admitted", started.elapsed());
        if party_size > 0 {
            self.metrics.record_party_formed(party_size);
        }

        Ok(JoinAck {
            queue: name.to_string(),
            role: role.to_string(),
            position,
            party_formed: party_size > 0,
        })
    }

    /// Remove a participant from a queue
    ///
    /// With a name, the participant must occupy a role in that queue.
    /// Without one, live queues are scanned in unspecified order and the
    /// first match wins; removal from every queue is not guaranteed.
    pub async fn leave(&self, participant: &str, name: Option<&str>) -> Result<LeaveAck> {
        if let Some(name) = name {
            let handle = self.lookup(name)?;
            let mut state = handle.state.lock().await;
            if !state.is_open() {
                return Err(PartyFinderError::QueueNotFound {
                    name: name.to_string(),
                }
                .into());
            }
            let Some(role) = state.remove(participant) else {
                return Err(PartyFinderError::NotQueued {
                    participant: participant.to_string(),
                }
                .into());
            };
            self.finish_leave(&mut state, participant, name, role).await
        } else {
            let handles: Vec<(String, Arc<QueueHandle>)> = {
                let registry = self.read_registry()?;
                registry
                    .iter()
                    .map(|(name, handle)| (name.clone(), handle.clone()))
                    .collect()
            };

            for (queue_name, handle) in handles {
                let mut state = handle.state.lock().await;
                if !state.is_open() {
                    continue;
                }
                if let Some(role) = state.remove(participant) {
                    return self
                        .finish_leave(&mut state, participant, &queue_name, role)
                        .await;
                }
            }

            Err(PartyFinderError::NotQueued {
                participant: participant.to_string(),
            }
            .into())
        }
    }

    async fn finish_leave(
        &self,
        state: &mut QueueState,
        participant: &str,
        name: &str,
        role: String,
    ) -> Result<LeaveAck> {
        self.emit(QueueEvent::QueueStateChanged(QueueStateChanged {
            name: name.to_string(),
            snapshot: state.snapshot(),
            timestamp: current_timestamp(),
        }));

        info!(
            "Participant '{}' left queue '{}' (was {})",
            participant, name, role
        );

        {
            let mut stats = self.write_stats()?;
            stats.leaves += 1;
            stats.participants_waiting = stats.participants_waiting.saturating_sub(1);
        }
        self.metrics.record_leave();

        Ok(LeaveAck {
            queue: name.to_string(),
            role,
        })
    }

    /// Remove a queue by name, cancelling its pending timer
    pub async fn delete_queue(&self, name: &str) -> Result<()> {
        let handle = {
            let mut registry = self.write_registry()?;
            registry.remove(name)
        }
        .ok_or_else(|| PartyFinderError::QueueNotFound {
            name: name.to_string(),
        })?;

        self.abort_timer(&handle);

        // Serializes with any in-flight join still holding the handle;
        // whichever acquires the exclusion later observes the loss.
        let mut state = handle.state.lock().await;
        state.close();
        let waiting = state.waiting();
        self.emit(QueueEvent::QueueDeleted(QueueDeleted {
            name: name.to_string(),
            timestamp: current_timestamp(),
        }));
        drop(state);

        {
            let mut stats = self.write_stats()?;
            stats.queues_deleted += 1;
            stats.active_queues = stats.active_queues.saturating_sub(1);
            stats.participants_waiting = stats.participants_waiting.saturating_sub(waiting);
        }
        self.metrics.record_queue_deleted(waiting);

        info!("Deleted queue '{}' ({} were waiting)", name, waiting);
        Ok(())
    }

    /// Snapshots of every live queue
    pub async fn list_queues(&self) -> Result<Vec<QueueSnapshot>> {
        let handles: Vec<Arc<QueueHandle>> = {
            let registry = self.read_registry()?;
            registry.values().cloned().collect()
        };

        let mut snapshots = Vec::with_capacity(handles.len());
        for handle in handles {
            let state = handle.state.lock().await;
            if state.is_open() {
                snapshots.push(state.snapshot());
            }
        }
        Ok(snapshots)
    }

    /// Get current engine statistics
    pub fn stats(&self) -> Result<EngineStats> {
        let stats = self.read_stats()?;
        Ok(stats.clone())
    }

    /// Cancel every outstanding timer and drop all queues
    pub async fn shutdown(&self) -> Result<()> {
        let handles: Vec<(String, Arc<QueueHandle>)> = {
            let mut registry = self.write_registry()?;
            registry.drain().collect()
        };

        for (name, handle) in &handles {
            self.abort_timer(handle);
            let mut state = handle.state.lock().await;
            state.close();
            debug!("Dropped queue '{}' at shutdown", name);
        }

        {
            let mut stats = self.write_stats()?;
            stats.active_queues = 0;
            stats.participants_waiting = 0;
        }

        info!("Matchmaking engine shut down ({} queues dropped)", handles.len());
        Ok(())
    }

    /// Arm a timer for a queue, superseding whichever was armed before
    fn spawn_timer(&self, handle: &Arc<QueueHandle>, name: &str, kind: TimerKind, delay: Duration) {
        let engine = self.clone();
        let name = name.to_string();
        let registration = handle.registration;

        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            engine.timer_fired(&name, registration, kind).await;
        });

        if let Ok(mut timer) = handle.timer.lock() {
            if let Some(old) = timer.replace(task) {
                old.abort();
            }
        }
    }

    fn abort_timer(&self, handle: &QueueHandle) {
        if let Ok(mut timer) = handle.timer.lock() {
            if let Some(task) = timer.take() {
                task.abort();
            }
        }
    }

    /// Deadline elapsed for a queue; deregister it if it is still the same
    /// registration the timer was armed for. Firing after deregistration is
    /// a no-op, never an error.
    async fn timer_fired(&self, name: &str, registration: Uuid, kind: TimerKind) {
        let removed = {
            let mut registry = match self.registry.write() {
                Ok(registry) => registry,
                Err(_) => {
                    warn!("Registry lock poisoned, dropping timer for '{}'", name);
                    return;
                }
            };
            match registry.get(name) {
                Some(handle) if handle.registration == registration => registry.remove(name),
                _ => None,
            }
        };

        let Some(handle) = removed else {
            debug!(
                "Timer for queue '{}' fired after deregistration, ignoring",
                name
            );
            return;
        };

        let mut state = handle.state.lock().await;
        state.close();
        let waiting = state.waiting();
        let timestamp = current_timestamp();
        // Emit inside the exclusion so the terminal event follows any state
        // change from a join this firing serialized behind.
        match kind {
            TimerKind::Expiry => self.emit(QueueEvent::QueueExpired(QueueExpired {
                name: name.to_string(),
                timestamp,
            })),
            TimerKind::Grace => self.emit(QueueEvent::QueueDeleted(QueueDeleted {
                name: name.to_string(),
                timestamp,
            })),
        }
        drop(state);

        if let Ok(mut stats) = self.stats.write() {
            match kind {
                TimerKind::Expiry => stats.queues_expired += 1,
                TimerKind::Grace => stats.queues_deleted += 1,
            }
            stats.active_queues = stats.active_queues.saturating_sub(1);
            stats.participants_waiting = stats.participants_waiting.saturating_sub(waiting);
        }
        match kind {
            TimerKind::Expiry => {
                self.metrics.record_queue_expired(waiting);
                info!("Queue '{}' expired ({} were waiting)", name, waiting);
            }
            TimerKind::Grace => {
                self.metrics.record_queue_deleted(waiting);
                info!("Queue '{}' removed after completion grace period", name);
            }
        }
    }

    fn emit(&self, event: QueueEvent) {
        if self.events_tx.send(event).is_err() {
            debug!("Notification dispatcher stopped, dropping event");
        }
    }

    fn lookup(&self, name: &str) -> Result<Arc<QueueHandle>> {
        let registry = self.read_registry()?;
        registry.get(name).cloned().ok_or_else(|| {
            PartyFinderError::QueueNotFound {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn read_registry(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<QueueHandle>>>> {
        self.registry.read().map_err(|_| {
            PartyFinderError::InternalError {
                message: "Failed to acquire registry lock".to_string(),
            }
            .into()
        })
    }

    fn write_registry(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<QueueHandle>>>> {
        self.registry.write().map_err(|_| {
            PartyFinderError::InternalError {
                message: "Failed to acquire registry lock".to_string(),
            }
            .into()
        })
    }

    fn read_stats(&self) -> Result<std::sync::RwLockReadGuard<'_, EngineStats>> {
        self.stats.read().map_err(|_| {
            PartyFinderError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            }
            .into()
        })
    }

    fn write_stats(&self) -> Result<std::sync::RwLockWriteGuard<'_, EngineStats>> {
        self.stats.write().map_err(|_| {
            PartyFinderError::InternalError {
                message: "Failed to acquire stats lock".to_string(),
            }
            .into()
        })
    }
}

/// Metric label for a rejected join
fn join_outcome(error: &anyhow::Error) -> &'static str {
    match error.downcast_ref::<PartyFinderError>() {
        Some(PartyFinderError::AlreadyQueued { .. }) => "already_queued",
        Some(PartyFinderError::RoleFull { .. }) => "role_full",
        Some(PartyFinderError::UnknownRole { .. }) => "unknown_role",
        Some(PartyFinderError::QueueNotFound { .. }) => "not_found",
        _ => "error",
    }
}

//! Prometheus counters, gauges and histograms for matchmaking activity

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Queue lifecycle metrics
    queue_metrics: QueueMetrics,

    /// Participant-related metrics
    participant_metrics: ParticipantMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Queue lifecycle metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Current number of live queues
    pub active_queues: IntGauge,

    /// Total queues created
    pub queues_created_total: IntCounter,

    /// Total queues discarded by expiration
    pub queues_expired_total: IntCounter,

    /// Total queues removed by deletion
    pub queues_deleted_total: IntCounter,

    /// Total parties formed
    pub parties_formed_total: IntCounter,
}

/// Participant-related metrics
#[derive(Clone)]
pub struct ParticipantMetrics {
    /// Join attempts by role and outcome
    pub joins_total: IntCounterVec,

    /// Total participants that left a queue
    pub leaves_total: IntCounter,

    /// Participants currently waiting across all queues
    pub participants_waiting: IntGauge,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Join processing time
    pub join_duration: Histogram,
}

impl MetricsCollector {
    /// Collector backed by a fresh registry
    pub fn new() -> Result<Self> {
        Self::with_registry(Arc::new(Registry::new()))
    }

    /// Collector registering its metrics into an existing registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let participant_metrics = ParticipantMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            participant_metrics,
            performance_metrics,
        })
    }

    /// Registry holding every metric this collector registered
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn participant(&self) -> &ParticipantMetrics {
        &self.participant_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a queue being created
    pub fn record_queue_created(&self) {
        self.queue_metrics.queues_created_total.inc();
        self.queue_metrics.active_queues.inc();
    }

    /// Record a queue being discarded by expiration
    pub fn record_queue_expired(&self, waiting: usize) {
        self.queue_metrics.queues_expired_total.inc();
        self.queue_metrics.active_queues.dec();
        self.participant_metrics
            .participants_waiting
            .sub(waiting as i64);
    }

    /// Record a queue being deleted
    pub fn record_queue_deleted(&self, waiting: usize) {
        self.queue_metrics.queues_deleted_total.inc();
        self.queue_metrics.active_queues.dec();
        self.participant_metrics
            .participants_waiting
            .sub(waiting as i64);
    }

    /// Record a join attempt and its outcome
    pub fn record_join(&self, role: &str, outcome: &str, duration: Duration) {
        self.participant_metrics
            .joins_total
            .with_label_values(&[role, outcome])
            .inc();

        if outcome == "admitted" {
            self.participant_metrics.participants_waiting.inc();
        }

        self.performance_metrics
            .join_duration
            .observe(duration.as_secs_f64());
    }

    /// Record a participant leaving a queue
    pub fn record_leave(&self) {
        self.participant_metrics.leaves_total.inc();
        self.participant_metrics.participants_waiting.dec();
    }

    /// Record a party forming, draining its members from the waiting pool
    pub fn record_party_formed(&self, party_size: usize) {
        self.queue_metrics.parties_formed_total.inc();
        self.participant_metrics
            .participants_waiting
            .sub(party_size as i64);
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_queues = IntGauge::new(
            "party_finder_active_queues",
            "Current number of live queues",
        )?;
        registry.register(Box::new(active_queues.clone()))?;

        let queues_created_total = IntCounter::new(
            "party_finder_queues_created_total",
            "Total queues created",
        )?;
        registry.register(Box::new(queues_created_total.clone()))?;

        let queues_expired_total = IntCounter::new(
            "party_finder_queues_expired_total",
            "Total queues discarded by expiration",
        )?;
        registry.register(Box::new(queues_expired_total.clone()))?;

        let queues_deleted_total = IntCounter::new(
            "party_finder_queues_deleted_total",
            "Total queues removed by deletion",
        )?;
        registry.register(Box::new(queues_deleted_total.clone()))?;

        let parties_formed_total = IntCounter::new(
            "party_finder_parties_formed_total",
            "Total parties formed",
        )?;
        registry.register(Box::new(parties_formed_total.clone()))?;

        Ok(Self {
            active_queues,
            queues_created_total,
            queues_expired_total,
            queues_deleted_total,
            parties_formed_total,
        })
    }
}

impl ParticipantMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounterVec::new(
            Opts::new(
                "party_finder_joins_total",
                "Join attempts by role and outcome",
            ),
            &["role", "outcome"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let leaves_total = IntCounter::new(
            "party_finder_leaves_total",
            "Total participants that left a queue",
        )?;
        registry.register(Box::new(leaves_total.clone()))?;

        let participants_waiting = IntGauge::new(
            "party_finder_participants_waiting",
            "Participants currently waiting across all queues",
        )?;
        registry.register(Box::new(participants_waiting.clone()))?;

        Ok(Self {
            joins_total,
            leaves_total,
            participants_waiting,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let join_duration = Histogram::with_opts(HistogramOpts::new(
            "party_finder_join_duration_seconds",
            "Join processing time",
        ))?;
        registry.register(Box::new(join_duration.clone()))?;

        Ok(Self { join_duration })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}

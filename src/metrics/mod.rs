// Private module declaration
mod server;

use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};

use crate::domain::order::OrderStatus;
use crate::utils::CircuitState;

// Re-export for public API
pub use server::start_metrics_server;

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// - Order lifecycle (creations, transitions, rejected operations)
// - Store write latency per backend
// - Ready notifications (sent / skipped / failed) and broker circuit state
// - Terminal polling and reconciliation outcomes
//
// Scraped via /metrics on the metrics server.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Lifecycle
    pub orders_created: IntCounter,
    pub status_transitions: IntCounterVec,
    pub operation_rejections: IntCounterVec,

    // Storage
    pub store_write_duration: HistogramVec,

    // Notifications
    pub notifications: IntCounterVec,
    pub notifier_circuit_state: IntGauge,

    // Terminals
    pub terminal_polls: IntCounterVec,
    pub terminal_cache_size: IntGaugeVec,
    pub reconcile_local_wins: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Orders taken")?;
        registry.register(Box::new(orders_created.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("status_transitions_total", "Committed status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let operation_rejections = IntCounterVec::new(
            Opts::new("order_operation_rejections_total", "Order operations that returned an error"),
            &["operation", "reason"],
        )?;
        registry.register(Box::new(operation_rejections.clone()))?;

        let store_write_duration = HistogramVec::new(
            HistogramOpts::new("store_write_duration_seconds", "Order store write latency")
                .buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0]),
            &["backend", "operation"],
        )?;
        registry.register(Box::new(store_write_duration.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("ready_notifications_total", "Ready notifications by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let notifier_circuit_state = IntGauge::new(
            "notifier_circuit_state",
            "Notification broker circuit (0 closed, 1 half-open, 2 open)",
        )?;
        registry.register(Box::new(notifier_circuit_state.clone()))?;

        let terminal_polls = IntCounterVec::new(
            Opts::new("terminal_polls_total", "Authoritative reads performed by terminals"),
            &["terminal"],
        )?;
        registry.register(Box::new(terminal_polls.clone()))?;

        let terminal_cache_size = IntGaugeVec::new(
            Opts::new("terminal_cache_orders", "Orders held in a terminal's merged view"),
            &["terminal"],
        )?;
        registry.register(Box::new(terminal_cache_size.clone()))?;

        let reconcile_local_wins = IntCounterVec::new(
            Opts::new(
                "reconcile_local_wins_total",
                "Records where the local cache beat the authoritative read",
            ),
            &["terminal"],
        )?;
        registry.register(Box::new(reconcile_local_wins.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            status_transitions,
            operation_rejections,
            store_write_duration,
            notifications,
            notifier_circuit_state,
            terminal_polls,
            terminal_cache_size,
            reconcile_local_wins,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_transition(&self, from: OrderStatus, to: OrderStatus) {
        self.status_transitions
            .with_label_values(&[from.as_str(), to.as_str()])
            .inc();
    }

    pub fn record_rejection(&self, operation: &str, reason: &str) {
        self.operation_rejections
            .with_label_values(&[operation, reason])
            .inc();
    }

    pub fn record_store_write(&self, backend: &str, operation: &str, duration_secs: f64) {
        self.store_write_duration
            .with_label_values(&[backend, operation])
            .observe(duration_secs);
    }

    /// `outcome` is one of `sent`, `skipped`, `failed`.
    pub fn record_notification(&self, outcome: &str) {
        self.notifications.with_label_values(&[outcome]).inc();
    }

    pub fn update_notifier_circuit(&self, state: CircuitState) {
        self.notifier_circuit_state.set(state.as_gauge());
    }

    pub fn record_terminal_poll(&self, terminal: &str, cache_size: usize, local_wins: usize) {
        self.terminal_polls.with_label_values(&[terminal]).inc();
        self.terminal_cache_size
            .with_label_values(&[terminal])
            .set(cache_size as i64);
        if local_wins > 0 {
            self.reconcile_local_wins
                .with_label_values(&[terminal])
                .inc_by(local_wins as u64);
        }
    }
}

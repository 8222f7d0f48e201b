//! Metrics collection for observability
//!
//! This module provides Prometheus metrics for monitoring the ledger.
//!
//! # Metrics
//!
//! - `custody_operations_total{kind}` - Accepted operations by event kind
//! - `custody_rejections_total{code}` - Rejected operations by error code
//! - `custody_event_log_length` - Number of records in the audit log
//! - `custody_held_amount` - Value currently in custody (lossy)

use crate::types::{Amount, EventKind};
use prometheus::{Gauge, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Accepted operations
    pub operations_total: IntCounterVec,

    /// Rejected operations
    pub rejections_total: IntCounterVec,

    /// Audit log length
    pub event_log_length: IntGauge,

    /// Value held in custody
    pub held_amount: Gauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("event_log_length", &self.event_log_length.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector on a private registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let operations_total = IntCounterVec::new(
            Opts::new("custody_operations_total", "Accepted operations by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("custody_rejections_total", "Rejected operations by error code"),
            &["code"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let event_log_length =
            IntGauge::new("custody_event_log_length", "Number of audit log records")?;
        registry.register(Box::new(event_log_length.clone()))?;

        let held_amount = Gauge::new("custody_held_amount", "Value currently held in custody")?;
        registry.register(Box::new(held_amount.clone()))?;

        Ok(Self {
            operations_total,
            rejections_total,
            event_log_length,
            held_amount,
            registry,
        })
    }

    /// Record an accepted operation
    pub fn record_accepted(&self, kind: EventKind, log_length: usize, held: Amount) {
        self.operations_total.with_label_values(&[kind.as_str()]).inc();
        self.event_log_length.set(log_length as i64);
        self.held_amount.set(held.value() as f64);
    }

    /// Record a rejected operation
    pub fn record_rejected(&self, code: &str) {
        self.rejections_total.with_label_values(&[code]).inc();
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation_is_repeatable() {
        let first = Metrics::new().unwrap();
        let second = Metrics::new().unwrap();
        assert_eq!(first.event_log_length.get(), 0);
        assert_eq!(second.event_log_length.get(), 0);
    }

    #[test]
    fn test_record_accepted() {
        let metrics = Metrics::new().unwrap();
        metrics.record_accepted(EventKind::Deposit, 1, Amount::new(100));
        metrics.record_accepted(EventKind::Deposit, 2, Amount::new(150));

        assert_eq!(
            metrics.operations_total.with_label_values(&["deposit"]).get(),
            2
        );
        assert_eq!(metrics.event_log_length.get(), 2);
        assert_eq!(metrics.held_amount.get(), 150.0);
    }

    #[test]
    fn test_record_rejected() {
        let metrics = Metrics::new().unwrap();
        metrics.record_rejected("unauthorized");
        assert_eq!(
            metrics.rejections_total.with_label_values(&["unauthorized"]).get(),
            1
        );
        assert!(metrics
            .registry()
            .gather()
            .iter()
            .any(|family| family.get_name() == "custody_rejections_total"));
    }
}

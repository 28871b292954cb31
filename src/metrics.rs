//! Metrics for observability.
//!
//! Exports Prometheus-compatible metrics for:
//! - Remote calls per instance and operation
//! - Database handle cache misses
//! - Replication lifecycle (started, stopped, rejected)
//! - Running-job reconciliation and drains
//!
//! # Metric Naming Convention
//!
//! All metrics are prefixed with `replication_orchestrator_` and follow Prometheus conventions:
//! - Counters end in `_total`
//! - Gauges represent current state
//! - Histograms track distributions (duration, size)
//!
//! Nothing is recorded unless the embedding process installs a recorder.

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record one remote call and its latency.
///
/// `outcome` is `"success"`, `"conflict"`, `"error"` or `"transport"`.
pub fn record_remote_call(instance: &str, operation: &str, outcome: &str, duration: Duration) {
    counter!(
        "replication_orchestrator_remote_calls_total",
        "instance" => instance.to_string(),
        "operation" => operation.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!(
        "replication_orchestrator_remote_call_duration_seconds",
        "instance" => instance.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a database handle being opened (cache miss).
pub fn record_database_opened(instance: &str) {
    counter!("replication_orchestrator_database_opens_total", "instance" => instance.to_string())
        .increment(1);
}

/// Record a replication link being enabled.
pub fn record_replication_started(instance: &str, continuous: bool) {
    let mode = if continuous { "continuous" } else { "one_shot" };
    counter!(
        "replication_orchestrator_replications_started_total",
        "instance" => instance.to_string(),
        "mode" => mode
    )
    .increment(1);
}

/// Record a stop-replication call.
pub fn record_replication_stopped(instance: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "replication_orchestrator_replications_stopped_total",
        "instance" => instance.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Record a start request refused because source and target are the same server.
pub fn record_self_replication_rejected(instance: &str) {
    counter!(
        "replication_orchestrator_self_replication_rejected_total",
        "instance" => instance.to_string()
    )
    .increment(1);
}

/// Gauge for jobs the scheduler reported as running at the last reconcile.
pub fn set_running_jobs(instance: &str, count: usize) {
    gauge!("replication_orchestrator_running_jobs", "instance" => instance.to_string())
        .set(count as f64);
}

/// Record one finished drain.
pub fn record_drain(instance: &str, rounds: u32, stopped: usize, complete: bool) {
    let status = if complete { "complete" } else { "incomplete" };
    counter!(
        "replication_orchestrator_drains_total",
        "instance" => instance.to_string(),
        "status" => status
    )
    .increment(1);
    histogram!("replication_orchestrator_drain_rounds", "instance" => instance.to_string())
        .record(rounds as f64);
    counter!("replication_orchestrator_drain_stopped_total", "instance" => instance.to_string())
        .increment(stopped as u64);
}

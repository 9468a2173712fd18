//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Event ingress (storage notifications)
//! - Pipeline guard decisions
//! - Training submissions, completions and deployments
//! - Backend calls (pipeline runner, training backend, notifier)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Watcher / Guard
// =============================================================================

/// Storage events total by result.
pub static STORAGE_EVENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trainflow_storage_events_total",
            "Total object-created events received",
        ),
        &["result"], // "dispatched", "ignored", "malformed"
    )
    .unwrap()
});

/// Guard decisions total by action.
pub static GUARD_DECISIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trainflow_guard_decisions_total",
            "Pipeline execution guard decisions",
        ),
        &["action"], // "started", "in_progress", "lease_held", "retry_limit"
    )
    .unwrap()
});

// =============================================================================
// Training lifecycle
// =============================================================================

/// Training submissions total by result.
pub static TRAINING_SUBMISSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trainflow_training_submissions_total",
            "Total training job submissions",
        ),
        &["result"], // "submitted", "duplicate", "rejected", "transient"
    )
    .unwrap()
});

/// Training status events total by reported status.
pub static TRAINING_COMPLETIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trainflow_training_status_events_total",
            "Training status changes reported by the backend",
        ),
        &["status"],
    )
    .unwrap()
});

/// Deployment requests total by result.
pub static DEPLOYMENTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("trainflow_deployments_total", "Total deployment triggers"),
        &["result"], // "requested", "skipped", "failed"
    )
    .unwrap()
});

/// Approval notifications total by result.
pub static APPROVAL_NOTIFICATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trainflow_approval_notifications_total",
            "Production approval notifications",
        ),
        &["result"], // "sent", "failed"
    )
    .unwrap()
});

// =============================================================================
// Backend Metrics
// =============================================================================

/// Backend request duration.
pub static BACKEND_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "trainflow_backend_request_duration_seconds",
            "Duration of backend calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["backend", "operation"],
    )
    .unwrap()
});

/// Backend requests total.
pub static BACKEND_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "trainflow_backend_requests_total",
            "Total backend requests",
        ),
        &["backend", "operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(STORAGE_EVENTS.clone()),
        Box::new(GUARD_DECISIONS.clone()),
        Box::new(TRAINING_SUBMISSIONS.clone()),
        Box::new(TRAINING_COMPLETIONS.clone()),
        Box::new(DEPLOYMENTS.clone()),
        Box::new(APPROVAL_NOTIFICATIONS.clone()),
        Box::new(BACKEND_REQUEST_DURATION.clone()),
        Box::new(BACKEND_REQUESTS.clone()),
    ]
}

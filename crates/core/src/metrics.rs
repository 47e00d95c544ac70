//! Prometheus metrics for the session engine.
//!
//! This module provides metrics for:
//! - Rounds (completed, duration)
//! - Stages (failures by stage and kind)
//! - Retry escapes
//! - Sessions (terminal outcomes)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Round Metrics
// =============================================================================

/// Rounds completed total.
pub static ROUNDS_COMPLETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new("walnut_rounds_completed_total", "Total rounds completed").unwrap()
});

/// Round duration in seconds.
pub static ROUND_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new("walnut_round_duration_seconds", "Duration of one round")
            .buckets(vec![5.0, 10.0, 30.0, 60.0, 120.0, 300.0, 600.0]),
        &["outcome"], // "continue", "limit_reached", "withdraw", "abort"
    )
    .unwrap()
});

// =============================================================================
// Stage Metrics
// =============================================================================

/// Stage failures by stage name and failure kind.
pub static STAGE_FAILURES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("walnut_stage_failures_total", "Total stage failures"),
        &["stage", "kind"],
    )
    .unwrap()
});

/// Escape procedure invocations by result.
pub static ESCAPE_INVOCATIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "walnut_escape_invocations_total",
            "Total escape procedures run between retry attempts",
        ),
        &["result"], // "succeeded", "failed"
    )
    .unwrap()
});

// =============================================================================
// Session Metrics
// =============================================================================

/// Sessions finished by terminal reason.
pub static SESSIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("walnut_sessions_total", "Total sessions by terminal reason"),
        &["terminal"], // "exhausted_limit", "withdrew", "aborted"
    )
    .unwrap()
});

/// Returns all metrics for registration with a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(ROUNDS_COMPLETED.clone()),
        Box::new(ROUND_DURATION.clone()),
        Box::new(STAGE_FAILURES.clone()),
        Box::new(ESCAPE_INVOCATIONS.clone()),
        Box::new(SESSIONS.clone()),
    ]
}

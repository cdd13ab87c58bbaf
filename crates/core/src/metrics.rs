//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Monitor ticks and login attempts
//! - File placement outcomes
//! - Torrent deletion and library refreshes

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts};

// =============================================================================
// Monitor
// =============================================================================

/// Ticks by result.
pub static TICKS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qbsync_ticks_total", "Total reconciliation ticks"),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

/// Tick duration in seconds.
pub static TICK_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "qbsync_tick_duration_seconds",
            "Duration of a reconciliation tick",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 300.0]),
        &["result"],
    )
    .unwrap()
});

/// Login attempts by result.
pub static LOGIN_ATTEMPTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qbsync_login_attempts_total", "Total torrent client logins"),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

/// Current backoff in seconds.
pub static BACKOFF_SECONDS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "qbsync_backoff_seconds",
        "Current retry backoff in seconds",
    )
    .unwrap()
});

// =============================================================================
// Placement
// =============================================================================

/// Files by placement outcome.
pub static FILES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qbsync_files_total", "Files handled by outcome"),
        &["action"], // placement action, or "failed"
    )
    .unwrap()
});

/// Bytes written by copies and covered by hardlinks.
pub static BYTES_PLACED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qbsync_bytes_placed_total", "Bytes materialized"),
        &["action"],
    )
    .unwrap()
});

/// Torrents processed by result.
pub static TORRENTS_PROCESSED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qbsync_torrents_processed_total", "Torrents processed"),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

/// Torrents removed from the client.
pub static TORRENTS_DELETED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "qbsync_torrents_deleted_total",
        "Torrents deleted from the client",
    )
    .unwrap()
});

// =============================================================================
// Library refresh
// =============================================================================

/// Library refreshes by result.
pub static REFRESHES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("qbsync_refreshes_total", "Library refresh requests"),
        &["result"], // "ok", "failed"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Label for a boolean outcome.
pub fn result_label(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "failed"
    }
}

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Monitor
        Box::new(TICKS_TOTAL.clone()),
        Box::new(TICK_DURATION.clone()),
        Box::new(LOGIN_ATTEMPTS.clone()),
        Box::new(BACKOFF_SECONDS.clone()),
        // Placement
        Box::new(FILES_TOTAL.clone()),
        Box::new(BYTES_PLACED.clone()),
        Box::new(TORRENTS_PROCESSED.clone()),
        Box::new(TORRENTS_DELETED.clone()),
        // Refresh
        Box::new(REFRESHES_TOTAL.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::Registry;

    #[test]
    fn test_all_metrics_register() {
        let registry = Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }

        TICKS_TOTAL.with_label_values(&["ok"]).inc();
        let names: Vec<String> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"qbsync_ticks_total".to_string()));
    }

    #[test]
    fn test_result_label() {
        assert_eq!(result_label(true), "ok");
        assert_eq!(result_label(false), "failed");
    }
}

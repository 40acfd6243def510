//! Prometheus metrics collection for production monitoring
//!
//! All metrics are registered against a process-global `Registry` and
//! exposed via the `/playback/stats`-adjacent metrics endpoint for
//! Prometheus scraping.

use prometheus::{
    register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
    register_int_counter_with_registry, register_int_gauge_with_registry, Encoder, HistogramOpts,
    HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

/// Global metrics registry
pub static REGISTRY: std::sync::LazyLock<Registry> = std::sync::LazyLock::new(Registry::new);

/// Transcoding pipeline metrics (C1-C4).
pub mod transcoding {
    use super::{
        register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
        register_int_counter_with_registry, register_int_gauge_with_registry, HistogramOpts,
        HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, REGISTRY,
    };

    /// Number of sessions currently in a non-terminal state.
    pub static SESSIONS_ACTIVE: std::sync::LazyLock<IntGauge> = std::sync::LazyLock::new(|| {
        register_int_gauge_with_registry!(
            "transcode_sessions_active",
            "Number of transcode sessions currently running or starting",
            REGISTRY.clone()
        )
        .expect("failed to register transcode_sessions_active")
    });

    /// Sessions that reached a terminal state, labeled by outcome.
    pub static SESSIONS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new(
                "transcode_sessions_total",
                "Total transcode sessions that reached a terminal state"
            ),
            &["outcome"],
            REGISTRY.clone()
        )
        .expect("failed to register transcode_sessions_total")
    });

    /// Encoder processes that failed to spawn.
    pub static SPAWN_FAILURES_TOTAL: std::sync::LazyLock<IntCounter> =
        std::sync::LazyLock::new(|| {
            register_int_counter_with_registry!(
                "transcode_spawn_failures_total",
                "Total encoder process spawn failures",
                REGISTRY.clone()
            )
            .expect("failed to register transcode_spawn_failures_total")
        });

    /// Process groups that needed SIGKILL after the grace period elapsed.
    pub static FORCED_KILLS_TOTAL: std::sync::LazyLock<IntCounter> = std::sync::LazyLock::new(|| {
        register_int_counter_with_registry!(
            "transcode_forced_kills_total",
            "Total process groups force-killed after exceeding the signal grace period",
            REGISTRY.clone()
        )
        .expect("failed to register transcode_forced_kills_total")
    });

    /// Wall-clock encode duration, labeled by output container.
    pub static ENCODE_DURATION_SECONDS: std::sync::LazyLock<HistogramVec> =
        std::sync::LazyLock::new(|| {
            register_histogram_vec_with_registry!(
                HistogramOpts::new(
                    "transcode_encode_duration_seconds",
                    "Wall-clock duration of completed transcode sessions"
                )
                .buckets(vec![1.0, 5.0, 15.0, 30.0, 60.0, 180.0, 600.0, 1800.0]),
                &["container"],
                REGISTRY.clone()
            )
            .expect("failed to register transcode_encode_duration_seconds")
        });

    /// Manifest-readiness poll attempts consumed before success or timeout.
    pub static MANIFEST_POLL_ATTEMPTS: std::sync::LazyLock<HistogramVec> =
        std::sync::LazyLock::new(|| {
            register_histogram_vec_with_registry!(
                HistogramOpts::new(
                    "transcode_manifest_poll_attempts",
                    "Number of manifest-readiness poll attempts before success or timeout"
                )
                .buckets(vec![1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0]),
                &["outcome"],
                REGISTRY.clone()
            )
            .expect("failed to register transcode_manifest_poll_attempts")
        });
}

/// Provider plugin boundary metrics (C5).
pub mod provider {
    use super::{
        register_histogram_vec_with_registry, register_int_counter_vec_with_registry,
        HistogramOpts, HistogramVec, IntCounterVec, Opts, REGISTRY,
    };

    /// RPC call duration to provider plugins, labeled by method and outcome.
    pub static RPC_DURATION_SECONDS: std::sync::LazyLock<HistogramVec> =
        std::sync::LazyLock::new(|| {
            register_histogram_vec_with_registry!(
                HistogramOpts::new(
                    "provider_rpc_duration_seconds",
                    "Duration of RPC calls to provider plugins"
                )
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
                &["method", "outcome"],
                REGISTRY.clone()
            )
            .expect("failed to register provider_rpc_duration_seconds")
        });

    /// Plugin hot-reload events, labeled by provider id.
    pub static RELOADS_TOTAL: std::sync::LazyLock<IntCounterVec> = std::sync::LazyLock::new(|| {
        register_int_counter_vec_with_registry!(
            Opts::new("provider_reloads_total", "Total provider plugin hot reloads"),
            &["provider_id"],
            REGISTRY.clone()
        )
        .expect("failed to register provider_reloads_total")
    });
}

/// Expose metrics in Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {}
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::from("# Failed to encode metrics\n");
        }
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        tracing::error!("Metrics buffer contains invalid UTF-8: {}", e);
        String::from("# Invalid UTF-8 in metrics\n")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        transcoding::SESSIONS_ACTIVE.set(1);
        transcoding::SESSIONS_TOTAL
            .with_label_values(&["completed"])
            .inc();
        provider::RPC_DURATION_SECONDS
            .with_label_values(&["GetInfo", "ok"])
            .observe(0.01);

        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap();
        let output = String::from_utf8(buffer).unwrap();
        assert!(output.contains("transcode_sessions_active"));
        assert!(output.contains("provider_rpc_duration_seconds"));
    }
}

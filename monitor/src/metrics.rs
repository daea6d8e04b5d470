use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use shared_models::error::{ModelError, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Per-run counters. The job is short-lived, so the registry is dumped to a
/// textfile for a node-exporter style collector instead of being served.
pub struct ScanMetrics {
    pub posts_observed: IntCounter,
    pub alerts_emitted: IntCounterVec,
    pub fetch_failures: IntCounterVec,
    pub scan_duration: Histogram,
    registry: Registry,
}

impl ScanMetrics {
    pub fn new() -> Result<Arc<Self>> {
        let registry = Registry::new();

        let posts_observed = IntCounter::with_opts(Opts::new(
            "posts_observed_total",
            "Posts evaluated by the alert engine",
        ))?;

        let alerts_emitted = IntCounterVec::new(
            Opts::new("alerts_emitted_total", "Alerts emitted per rule"),
            &["alert_type"],
        )?;

        let fetch_failures = IntCounterVec::new(
            Opts::new(
                "fetch_failures_total",
                "Upstream fetches that failed and were skipped",
            ),
            &["kind"],
        )?;

        let scan_duration = Histogram::with_opts(
            HistogramOpts::new("scan_duration_seconds", "Wall time of one scan cycle")
                .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        )?;

        registry.register(Box::new(posts_observed.clone()))?;
        registry.register(Box::new(alerts_emitted.clone()))?;
        registry.register(Box::new(fetch_failures.clone()))?;
        registry.register(Box::new(scan_duration.clone()))?;

        Ok(Arc::new(Self {
            posts_observed,
            alerts_emitted,
            fetch_failures,
            scan_duration,
            registry,
        }))
    }

    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| ModelError::Metrics(e.to_string()))
    }

    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.render()?)?;
        info!(path = %path.display(), "Metrics written");
        Ok(())
    }
}

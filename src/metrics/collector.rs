//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the playmate service: upstream
//! traffic, cache effectiveness, engine operations and API requests.

use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Steam Web API traffic
    upstream_metrics: UpstreamMetrics,

    /// Response cache metrics
    cache_metrics: CacheMetrics,

    /// Matchmaking engine metrics
    engine_metrics: EngineMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,

    /// HTTP API requests by operation and outcome
    pub api_requests_total: IntCounterVec,
}

/// Steam Web API traffic
#[derive(Clone)]
pub struct UpstreamMetrics {
    /// Requests by endpoint and HTTP status (or `network_error`)
    pub requests_total: IntCounterVec,

    /// Retries by endpoint
    pub retries_total: IntCounterVec,

    /// Request duration by endpoint
    pub request_duration: HistogramVec,
}

/// Response cache metrics
#[derive(Clone)]
pub struct CacheMetrics {
    /// Lookups by kind and result (hit/miss)
    pub lookups_total: IntCounterVec,

    /// Entries currently held
    pub entries: IntGauge,
}

/// Matchmaking engine metrics
#[derive(Clone)]
pub struct EngineMetrics {
    /// Operations by name and outcome
    pub operations_total: IntCounterVec,

    /// Operation duration by name
    pub operation_duration: HistogramVec,

    /// Candidates dropped from population scans, by reason
    pub candidates_skipped_total: IntCounterVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let upstream_metrics = UpstreamMetrics::new(&registry)?;
        let cache_metrics = CacheMetrics::new(&registry)?;
        let engine_metrics = EngineMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            upstream_metrics,
            cache_metrics,
            engine_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn upstream(&self) -> &UpstreamMetrics {
        &self.upstream_metrics
    }

    pub fn cache(&self) -> &CacheMetrics {
        &self.cache_metrics
    }

    pub fn engine(&self) -> &EngineMetrics {
        &self.engine_metrics
    }

    /// Record one completed upstream request attempt
    pub fn record_upstream_request(&self, endpoint: &str, status: &str, duration: Duration) {
        self.upstream_metrics
            .requests_total
            .with_label_values(&[endpoint, status])
            .inc();

        self.upstream_metrics
            .request_duration
            .with_label_values(&[endpoint])
            .observe(duration.as_secs_f64());
    }

    /// Record a retry of an upstream request
    pub fn record_upstream_retry(&self, endpoint: &str) {
        self.upstream_metrics
            .retries_total
            .with_label_values(&[endpoint])
            .inc();
    }

    /// Record a cache lookup
    pub fn record_cache_lookup(&self, kind: &str, hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        self.cache_metrics
            .lookups_total
            .with_label_values(&[kind, result])
            .inc();
    }

    pub fn set_cache_entries(&self, entries: usize) {
        self.cache_metrics.entries.set(entries as i64);
    }

    /// Record a finished engine operation
    pub fn record_operation(&self, operation: &str, outcome: &str, duration: Duration) {
        self.engine_metrics
            .operations_total
            .with_label_values(&[operation, outcome])
            .inc();

        self.engine_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Record a candidate dropped from a population scan
    pub fn record_candidate_skipped(&self, reason: &str) {
        self.engine_metrics
            .candidates_skipped_total
            .with_label_values(&[reason])
            .inc();
    }

    /// Record an HTTP API request
    pub fn record_api_request(&self, operation: &str, status: u16) {
        let status = status.to_string();
        self.service_metrics
            .api_requests_total
            .with_label_values(&[operation, &status])
            .inc();
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("playmate_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "playmate_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("playmate_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        let api_requests_total = IntCounterVec::new(
            Opts::new("playmate_api_requests_total", "Total HTTP API requests"),
            &["operation", "status"],
        )?;
        registry.register(Box::new(api_requests_total.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
            api_requests_total,
        })
    }
}

impl UpstreamMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "playmate_upstream_requests_total",
                "Total Steam Web API requests",
            ),
            &["endpoint", "status"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let retries_total = IntCounterVec::new(
            Opts::new(
                "playmate_upstream_retries_total",
                "Total Steam Web API retries",
            ),
            &["endpoint"],
        )?;
        registry.register(Box::new(retries_total.clone()))?;

        let request_duration = HistogramVec::new(
            HistogramOpts::new(
                "playmate_upstream_request_duration_seconds",
                "Steam Web API request duration",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["endpoint"],
        )?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            requests_total,
            retries_total,
            request_duration,
        })
    }
}

impl CacheMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let lookups_total = IntCounterVec::new(
            Opts::new("playmate_cache_lookups_total", "Total cache lookups"),
            &["kind", "result"],
        )?;
        registry.register(Box::new(lookups_total.clone()))?;

        let entries = IntGauge::new("playmate_cache_entries", "Entries held in the cache")?;
        registry.register(Box::new(entries.clone()))?;

        Ok(Self {
            lookups_total,
            entries,
        })
    }
}

impl EngineMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operations_total = IntCounterVec::new(
            Opts::new(
                "playmate_engine_operations_total",
                "Total matchmaking operations",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "playmate_engine_operation_duration_seconds",
                "Matchmaking operation duration",
            )
            .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 30.0]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        let candidates_skipped_total = IntCounterVec::new(
            Opts::new(
                "playmate_candidates_skipped_total",
                "Candidates dropped from population scans",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(candidates_skipped_total.clone()))?;

        Ok(Self {
            operations_total,
            operation_duration,
            candidates_skipped_total,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _upstream = collector.upstream();
        let _cache = collector.cache();
        let _engine = collector.engine();
    }

    #[test]
    fn test_upstream_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_upstream_request("GetOwnedGames", "200", Duration::from_millis(40));
        collector.record_upstream_request("GetOwnedGames", "503", Duration::from_millis(10));
        collector.record_upstream_retry("GetOwnedGames");

        let upstream = collector.upstream();
        assert_eq!(
            upstream
                .requests_total
                .with_label_values(&["GetOwnedGames", "200"])
                .get(),
            1
        );
        assert_eq!(
            upstream
                .retries_total
                .with_label_values(&["GetOwnedGames"])
                .get(),
            1
        );
    }

    #[test]
    fn test_cache_lookup_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_cache_lookup("owned_games", true);
        collector.record_cache_lookup("owned_games", false);
        collector.record_cache_lookup("owned_games", false);
        collector.set_cache_entries(12);

        let cache = collector.cache();
        assert_eq!(
            cache
                .lookups_total
                .with_label_values(&["owned_games", "miss"])
                .get(),
            2
        );
        assert_eq!(cache.entries.get(), 12);
    }

    #[test]
    fn test_engine_recording() {
        let collector = MetricsCollector::new().unwrap();

        collector.record_operation("best_matches", "ok", Duration::from_millis(5));
        collector.record_candidate_skipped("not_registered");
        collector.record_candidate_skipped("not_registered");

        let engine = collector.engine();
        assert_eq!(
            engine
                .operations_total
                .with_label_values(&["best_matches", "ok"])
                .get(),
            1
        );
        assert_eq!(
            engine
                .candidates_skipped_total
                .with_label_values(&["not_registered"])
                .get(),
            2
        );
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().unwrap();

        collector.update_health_status(2);
        collector.update_component_health("database", true);
        collector.update_component_health("cache", false);
        collector.update_uptime(Duration::from_secs(90));

        assert_eq!(collector.service().health_status.get(), 2);
        assert_eq!(collector.service().uptime_seconds.get(), 90);
    }

    #[test]
    fn test_timer() {
        let collector = MetricsCollector::new().unwrap();
        let timer = collector.start_timer();
        std::thread::sleep(Duration::from_millis(5));
        assert!(timer.stop() >= Duration::from_millis(5));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Arc::new(Registry::new());
        let _first = MetricsCollector::with_registry(registry.clone()).unwrap();
        assert!(MetricsCollector::with_registry(registry).is_err());
    }
}

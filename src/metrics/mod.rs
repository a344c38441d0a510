//! Metrics and monitoring for the playmate service
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health probes and metrics.

pub mod collector;
pub mod health;

pub use collector::{
    CacheMetrics, EngineMetrics, MetricsCollector, MetricsTimer, ServiceMetrics, UpstreamMetrics,
};
pub use health::{encode_metrics, HttpServer, HttpServerConfig};

//! Metrics definitions for the data service.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "client.cache.hit",
    metric_type: MetricType::Counter,
    description: "Cache reads served from a fresh entry. Tagged with key.",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "client.cache.miss",
    metric_type: MetricType::Counter,
    description: "Cache reads that fell through to the network. Tagged with key and reason.",
};

pub const REPORT_FAILURES: MetricDef = MetricDef {
    name: "client.report.failures",
    metric_type: MetricType::Counter,
    description: "Report fetches that did not succeed. Tagged with endpoint and handling.",
};

pub const ALL_METRICS: &[MetricDef] = &[CACHE_HIT, CACHE_MISS, REPORT_FAILURES];

use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUESTS: MetricDef = MetricDef {
    name: "proxy.requests",
    metric_type: MetricType::Counter,
    description: "Requests handled by the proxy. Tagged with outcome.",
};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "proxy.request.duration",
    metric_type: MetricType::Histogram,
    description: "Proxy request duration in seconds, including the upstream call. Tagged with status.",
};

pub const UPSTREAM_DURATION: MetricDef = MetricDef {
    name: "proxy.upstream.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent waiting on the analytics API in seconds. Tagged with status.",
};

pub const ALL_METRICS: &[MetricDef] = &[REQUESTS, REQUEST_DURATION, UPSTREAM_DURATION];

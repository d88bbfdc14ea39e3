use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with status, endpoint.",
};

pub const REQUESTS_INFLIGHT: MetricDef = MetricDef {
    name: "requests.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of requests currently being processed",
};

pub const WEBHOOK_RECEIVED: MetricDef = MetricDef {
    name: "webhook.received",
    metric_type: MetricType::Counter,
    description: "Event batches acknowledged and handed to the forwarder",
};

pub const WEBHOOK_REJECTED: MetricDef = MetricDef {
    name: "webhook.rejected",
    metric_type: MetricType::Counter,
    description: "Inbound webhook requests not forwarded. Tagged with reason.",
};

pub const ROUTE_CACHE_HIT: MetricDef = MetricDef {
    name: "route_cache.hit",
    metric_type: MetricType::Counter,
    description: "Destination lookups served from the route cache",
};

pub const ROUTE_CACHE_MISS: MetricDef = MetricDef {
    name: "route_cache.miss",
    metric_type: MetricType::Counter,
    description: "Destination lookups that went to the route store",
};

pub const FORWARD_DELIVERED: MetricDef = MetricDef {
    name: "forward.delivered",
    metric_type: MetricType::Counter,
    description: "Forwards that received any HTTP response from the tenant",
};

pub const FORWARD_FAILED: MetricDef = MetricDef {
    name: "forward.failed",
    metric_type: MetricType::Counter,
    description: "Forwards that timed out or failed at the transport layer",
};

pub const FORWARD_SKIPPED: MetricDef = MetricDef {
    name: "forward.skipped",
    metric_type: MetricType::Counter,
    description: "Entries not forwarded. Tagged with reason.",
};

pub const FORWARD_DURATION: MetricDef = MetricDef {
    name: "forward.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent on a single outbound forward in seconds",
};

pub const DEAD_LETTER_RECORDED: MetricDef = MetricDef {
    name: "dead_letter.recorded",
    metric_type: MetricType::Counter,
    description: "Failed forwards persisted for retry",
};

pub const DEAD_LETTER_PERSIST_FAILED: MetricDef = MetricDef {
    name: "dead_letter.persist_failed",
    metric_type: MetricType::Counter,
    description: "Failed forwards that could not be persisted",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    REQUESTS_INFLIGHT,
    WEBHOOK_RECEIVED,
    WEBHOOK_REJECTED,
    ROUTE_CACHE_HIT,
    ROUTE_CACHE_MISS,
    FORWARD_DELIVERED,
    FORWARD_FAILED,
    FORWARD_SKIPPED,
    FORWARD_DURATION,
    DEAD_LETTER_RECORDED,
    DEAD_LETTER_PERSIST_FAILED,
];

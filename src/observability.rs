use std::net::SocketAddr;

use crate::proto::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total wire requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "freeplay_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "freeplay_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "freeplay_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "freeplay_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "freeplay_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "freeplay_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "freeplay_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a Request variant to a short label for metrics.
pub fn op_label(req: &Request) -> &'static str {
    match req {
        Request::Availability { .. } => "availability",
        Request::Submit { .. } => "submit",
        Request::Cancel { .. } => "cancel",
        Request::Get { .. } => "get",
        Request::Bookings { .. } => "bookings",
        Request::Config => "config",
        Request::Ping => "ping",
        Request::Watch { .. } => "watch",
        Request::Unwatch { .. } => "unwatch",
    }
}

use std::net::SocketAddr;

use crate::protocol::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "bookd_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "bookd_request_duration_seconds";

/// Counter: booking validations. Labels: outcome.
pub const VALIDATIONS_TOTAL: &str = "bookd_validations_total";

/// Counter: committed booking writes. Labels: op (create, update, delete).
pub const BOOKING_WRITES_TOTAL: &str = "bookd_booking_writes_total";

/// Counter: registered reference entities. Labels: kind.
pub const REGISTRATIONS_TOTAL: &str = "bookd_registrations_total";

/// Counter: store lookups that failed and were swallowed. Labels: check.
pub const STORE_FAILURES_TOTAL: &str = "bookd_store_failures_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "bookd_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "bookd_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "bookd_connections_rejected_total";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "bookd_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "bookd_wal_flush_batch_size";

/// Counter: WAL compactions run by the background compactor.
pub const WAL_COMPACTIONS_TOTAL: &str = "bookd_wal_compactions_total";

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
        Request::CreateBooking { .. } => "create_booking",
        Request::UpdateBooking { .. } => "update_booking",
        Request::DeleteBooking { .. } => "delete_booking",
        Request::GetBooking { .. } => "get_booking",
        Request::ListBookings { .. } => "list_bookings",
        Request::CustomerBookings { .. } => "customer_bookings",
        Request::ResourceBookings { .. } => "resource_bookings",
        Request::Register { .. } => "register",
        Request::GetReference { .. } => "get_reference",
        Request::ListReferences { .. } => "list_references",
        Request::DeleteReference { .. } => "delete_reference",
        Request::Validate { .. } => "validate",
    }
}

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::protocol::Request;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "roomslot_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "roomslot_request_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "roomslot_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "roomslot_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "roomslot_connections_rejected_total";

/// Gauge: number of universities with a loaded engine.
pub const TENANTS_ACTIVE: &str = "roomslot_tenants_active";

/// Counter: handshake failures.
pub const AUTH_FAILURES_TOTAL: &str = "roomslot_auth_failures_total";

// ── Domain ──────────────────────────────────────────────────────

/// Counter: booking requests refused because of a clash.
pub const CONFLICTS_DETECTED_TOTAL: &str = "roomslot_conflicts_detected_total";

/// Counter: bookings committed through the creation flow.
pub const BOOKINGS_CREATED_TOTAL: &str = "roomslot_bookings_created_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Request variant to a short label for metrics.
pub fn op_label(req: &Request) -> &'static str {
    match req {
        Request::Hello { .. } => "hello",
        Request::CreateBooking { .. } => "create_booking",
        Request::CheckConflict { .. } => "check_conflict",
        Request::OccurrencesOnDate { .. } => "occurrences_on_date",
        Request::FreeWindows { .. } => "free_windows",
        Request::CancelBooking { .. } => "cancel_booking",
        Request::RejectBooking { .. } => "reject_booking",
        Request::ConfirmBooking { .. } => "confirm_booking",
        Request::GetBooking { .. } => "get_booking",
        Request::ListBookings { .. } => "list_bookings",
        Request::ListRooms => "list_rooms",
        Request::Listen { .. } => "listen",
        Request::Unlisten { .. } => "unlisten",
        Request::UnlistenAll => "unlisten_all",
    }
}

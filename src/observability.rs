use std::net::SocketAddr;

// ── Booking flow ────────────────────────────────────────────────

/// Counter: appointments successfully booked.
pub const BOOKINGS_CREATED_TOTAL: &str = "agenda_bookings_created_total";

/// Counter: bookings rejected because the slot was already taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "agenda_booking_conflicts_total";

/// Gauge: appointments currently in the active set.
pub const APPOINTMENTS_ACTIVE: &str = "agenda_appointments_active";

/// Counter: HTTP requests answered. Labels: route, status.
pub const HTTP_REQUESTS_TOTAL: &str = "agenda_http_requests_total";

// ── Archival ────────────────────────────────────────────────────

/// Counter: appointments moved into history.
pub const APPOINTMENTS_ARCHIVED_TOTAL: &str = "agenda_appointments_archived_total";

/// Counter: per-record archival failures.
pub const ARCHIVE_FAILURES_TOTAL: &str = "agenda_archive_failures_total";

/// Histogram: archive sweep duration in seconds.
pub const ARCHIVE_RUN_DURATION_SECONDS: &str = "agenda_archive_run_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "agenda_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "agenda_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "innkeep_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "innkeep_query_duration_seconds";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: bookings committed.
pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";

/// Counter: bookings refused because the dates were taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "innkeep_booking_conflicts_total";

/// Counter: coupon uses recorded against an offer.
pub const OFFER_REDEMPTIONS_TOTAL: &str = "innkeep_offer_redemptions_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "innkeep_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "innkeep_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "innkeep_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "innkeep_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "innkeep_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "innkeep_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertRoom { .. } => "insert_room",
        Command::DeleteRoom { .. } => "delete_room",
        Command::UpsertRoomRates { .. } => "upsert_room_rates",
        Command::InsertSpecialRates { .. } => "insert_special_rates",
        Command::DeleteSpecialRate { .. } => "delete_special_rate",
        Command::InsertOffer { .. } => "insert_offer",
        Command::DeactivateOffer { .. } => "deactivate_offer",
        Command::InsertBooking { .. } => "insert_booking",
        Command::CancelBooking { .. } => "cancel_booking",
        Command::UpdateBookingStatus { .. } => "update_booking_status",
        Command::SelectAvailability { .. } => "select_availability",
        Command::SelectQuote { .. } => "select_quote",
        Command::SelectCouponCheck { .. } => "select_coupon_check",
        Command::SelectRateCalendar { .. } => "select_rate_calendar",
        Command::SelectRooms => "select_rooms",
        Command::SelectSpecialRates { .. } => "select_special_rates",
        Command::SelectBookings { .. } => "select_bookings",
        Command::SelectOffers { .. } => "select_offers",
    }
}

//! Prometheus metrics recorder and metric names.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

/// Install the Prometheus metrics recorder (global).
///
/// Returns the handle used to render `GET /metrics`. Call once at startup.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

// Metric names. Every metric carries a `domain` label.

/// WebSocket connections opened (counter).
pub const WS_CONNECTIONS_TOTAL: &str = "ws_connections_total";
/// WebSocket disconnections (counter, labels: reason).
pub const WS_DISCONNECTIONS_TOTAL: &str = "ws_disconnections_total";
/// Active WebSocket connections (gauge).
pub const WS_CONNECTIONS_ACTIVE: &str = "ws_connections_active";
/// Connection lifetime in seconds (histogram).
pub const WS_CONNECTION_DURATION_SECONDS: &str = "ws_connection_duration_seconds";
/// Upgrade requests rejected for a missing or invalid credential (counter).
pub const WS_AUTH_FAILURES_TOTAL: &str = "ws_auth_failures_total";
/// Connections replaced by a newer one of the same principal (counter).
pub const HUB_SUPERSEDED_TOTAL: &str = "hub_superseded_total";
/// Local deliveries dropped on a full or closed queue (counter).
pub const HUB_DISPATCH_DROPS_TOTAL: &str = "hub_dispatch_drops_total";
/// Inbound chat frames received (counter).
pub const MESSAGES_RECEIVED_TOTAL: &str = "messages_received_total";
/// Inbound frames that failed to decode (counter).
pub const MESSAGES_MALFORMED_TOTAL: &str = "messages_malformed_total";
/// Messages persisted (counter).
pub const MESSAGES_PERSISTED_TOTAL: &str = "messages_persisted_total";
/// Messages dropped by a pipeline failure (counter, labels: stage).
pub const MESSAGES_FAILED_TOTAL: &str = "messages_failed_total";
/// Push notifications accepted by the provider (counter).
pub const PUSH_SENT_TOTAL: &str = "push_sent_total";
/// Push attempts skipped for lack of a token (counter).
pub const PUSH_SKIPPED_TOTAL: &str = "push_skipped_total";
/// Push attempts that failed (counter).
pub const PUSH_FAILED_TOTAL: &str = "push_failed_total";
/// Push jobs dropped on a full queue (counter).
pub const PUSH_QUEUE_DROPS_TOTAL: &str = "push_queue_drops_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_without_global_install() {
        let handle = PrometheusBuilder::new().build_recorder().handle();
        let output = handle.render();
        assert!(output.is_empty() || output.contains('\n'));
    }

    #[test]
    fn metric_names_are_snake_case() {
        let names = [
            WS_CONNECTIONS_TOTAL,
            WS_DISCONNECTIONS_TOTAL,
            WS_CONNECTIONS_ACTIVE,
            WS_CONNECTION_DURATION_SECONDS,
            WS_AUTH_FAILURES_TOTAL,
            HUB_SUPERSEDED_TOTAL,
            HUB_DISPATCH_DROPS_TOTAL,
            MESSAGES_RECEIVED_TOTAL,
            MESSAGES_MALFORMED_TOTAL,
            MESSAGES_PERSISTED_TOTAL,
            MESSAGES_FAILED_TOTAL,
            PUSH_SENT_TOTAL,
            PUSH_SKIPPED_TOTAL,
            PUSH_FAILED_TOTAL,
            PUSH_QUEUE_DROPS_TOTAL,
        ];
        for name in names {
            assert!(
                name.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "{name}"
            );
        }
    }
}

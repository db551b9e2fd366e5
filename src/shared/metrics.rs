//! Names of the relay's Prometheus series.

/// Admitted WebSocket connections currently open.
pub const CONNECTIONS_ACTIVE: &str = "relaydesk_connections_active";
/// Upgrades refused by the tenant gate, labelled `reason`.
pub const CONNECTIONS_REJECTED: &str = "relaydesk_connections_rejected_total";
/// Messages that made it through persistence, labelled `sender_type`.
pub const MESSAGES_PERSISTED: &str = "relaydesk_messages_total";
/// Client events answered with an `error` event, labelled `kind`.
pub const EVENT_ERRORS: &str = "relaydesk_event_errors_total";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names_share_prefix() {
        for name in [
            CONNECTIONS_ACTIVE,
            CONNECTIONS_REJECTED,
            MESSAGES_PERSISTED,
            EVENT_ERRORS,
        ] {
            assert!(name.starts_with("relaydesk_"), "{}", name);
        }
        assert!(CONNECTIONS_REJECTED.ends_with("_total"));
        assert!(MESSAGES_PERSISTED.ends_with("_total"));
        assert!(EVENT_ERRORS.ends_with("_total"));
    }
}

//! Relay tuning knobs (§6 "Configuration options").

/// Configuration for [`super::core::AuthorizationCore`]. Everything here is
/// a pure admission-decision parameter; socket binding, TLS, and the rest of
/// the transport live outside this crate (§1).
#[derive(Clone, Debug, serde::Deserialize)]
pub struct RelayConfig {
    pub port: u16,
    pub max_event_size: usize,
    pub max_subscriptions: usize,
    pub require_auth: bool,
    pub late_publication_window: u64,
    pub min_previous_refs: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: 7000,
            max_event_size: 65536,
            max_subscriptions: 20,
            require_auth: false,
            late_publication_window: 3600,
            min_previous_refs: 0,
        }
    }
}

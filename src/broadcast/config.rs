//! Broadcast configuration

use std::time::Duration;

/// Configuration for a [`FrameBroadcaster`](super::FrameBroadcaster)
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Skip delivering a newer version whose payload is byte-identical to
    /// the one the subscriber received last
    pub dedup_content: bool,

    /// Liveness fallback for waiting subscribers; a wait that sees no wake
    /// signal within this time returns empty so the caller re-checks
    pub wait_timeout: Duration,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            dedup_content: true,
            wait_timeout: Duration::from_millis(500),
        }
    }
}

impl BroadcastConfig {
    /// Enable or disable payload deduplication at delivery
    pub fn dedup_content(mut self, enabled: bool) -> Self {
        self.dedup_content = enabled;
        self
    }

    /// Set the wait timeout (clamped to at least 1ms)
    pub fn wait_timeout(mut self, timeout: Duration) -> Self {
        self.wait_timeout = timeout.max(Duration::from_millis(1));
        self
    }
}

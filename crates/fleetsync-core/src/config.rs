// ── Runtime engine configuration ──
//
// Knobs the embedder hands to `SyncEngine::new`. Plain data: core never
// reads files or the environment.

use std::time::Duration;

/// Tuning for one [`SyncEngine`](crate::SyncEngine) instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long an awaited operation waits for its response.
    pub request_timeout: Duration,

    /// Keep-alive cadence. `None` disables the ping poll.
    pub ping_interval: Option<Duration>,

    /// Apply updates to the local cache before the service confirms them.
    pub optimistic_updates: bool,

    /// Page size used when a list query does not set one.
    pub default_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            ping_interval: Some(Duration::from_secs(50)),
            optimistic_updates: true,
            default_page_size: 50,
        }
    }
}

use std::time::Duration;

/// Tunable session policy.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long navigation stays locked after a commit. Product variants
    /// have shipped 5 and 20 minute windows; 5 is the default.
    pub lock_window: Duration,

    /// Ticker period for flow progress and heartbeats.
    pub tick_interval: Duration,

    /// Owner of rewards and daily stats rows.
    pub user_id: String,

    /// Buffer size of the view-subscriber event channel.
    pub event_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            lock_window: Duration::from_secs(5 * 60),
            tick_interval: Duration::from_secs(1),
            user_id: "local".to_string(),
            event_capacity: 64,
        }
    }
}

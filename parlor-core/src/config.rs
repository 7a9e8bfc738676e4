use std::time::Duration;

/// The configuration of the chat core
#[derive(Debug, Clone)]
pub struct Config {
    /// How many messages are retained per room, oldest evicted first
    pub history_limit: usize,
    /// How long a presence entry lives without a heartbeat
    pub presence_ttl: Duration,
    /// How often expired presence entries are swept
    pub presence_sweep_interval: Duration,
}

impl Config {
    /// How often a connected session refreshes its presence entry.
    /// A fraction of the TTL, so a healthy session never expires.
    pub fn heartbeat_interval(&self) -> Duration {
        self.presence_ttl / 3
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            history_limit: 50,
            presence_ttl: Duration::from_secs(30),
            presence_sweep_interval: Duration::from_secs(10),
        }
    }
}

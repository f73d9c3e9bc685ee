//! Room configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration shared by every room a registry creates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomConfig {
    /// How long a room with zero attached clients survives before the
    /// registry evicts it. Also used as the TTL on persistence writes,
    /// so abandoned entries age out of the store on their own.
    pub idle_timeout: Duration,

    /// Artificial "thinking" pause before each forced reply is
    /// auto-played.
    pub reply_delay: Duration,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(60 * 60),
            reply_delay: Duration::from_millis(500),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RoomConfig::default();
        assert_eq!(config.idle_timeout, Duration::from_secs(3600));
        assert_eq!(config.reply_delay, Duration::from_millis(500));
    }
}

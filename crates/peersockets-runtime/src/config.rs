//! PeerSockets runtime configuration

use thiserror::Error;

use peersockets_core::NETWORK_SCHEME;

/// Environment variable holding the relay queue capacity (0 = unbounded)
pub const ENV_QUEUE_CAPACITY: &str = "PEERSOCKETS_QUEUE_CAPACITY";

/// Environment variable holding the log filter directive
pub const ENV_LOG: &str = "PEERSOCKETS_LOG";

/// Backpressure policy of a relay queue.
///
/// Network callbacks never block on a slow consumer; the policy decides what
/// happens to envelopes the consumer has not drained yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum QueuePolicy {
    /// Keep everything. Memory grows with consumer lag.
    #[default]
    Unbounded,
    /// Keep at most `capacity` envelopes, evicting the oldest
    DropOldest { capacity: usize },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid queue capacity: {0}")]
    InvalidQueueCapacity(String),
}

/// PeerSockets configuration
#[derive(Clone, Debug)]
pub struct PeerSocketsConfig {
    /// Origin scheme required to join topics
    pub network_scheme: String,
    /// Relay queue policy for every opened stream
    pub queue_policy: QueuePolicy,
    /// Default tracing filter directive
    pub log_filter: String,
}

impl Default for PeerSocketsConfig {
    fn default() -> Self {
        PeerSocketsConfig {
            network_scheme: NETWORK_SCHEME.to_string(),
            queue_policy: QueuePolicy::Unbounded,
            log_filter: "info,peersockets_runtime=debug".to_string(),
        }
    }
}

impl PeerSocketsConfig {
    pub fn with_queue_policy(mut self, policy: QueuePolicy) -> Self {
        self.queue_policy = policy;
        self
    }

    pub fn with_network_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.network_scheme = scheme.into();
        self
    }

    pub fn with_log_filter(mut self, filter: impl Into<String>) -> Self {
        self.log_filter = filter.into();
        self
    }

    /// Defaults overridden by `PEERSOCKETS_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_QUEUE_CAPACITY) {
            let capacity: usize = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidQueueCapacity(raw.clone()))?;
            config.queue_policy = if capacity == 0 {
                QueuePolicy::Unbounded
            } else {
                QueuePolicy::DropOldest { capacity }
            };
        }

        if let Some(filter) = lookup(ENV_LOG) {
            config.log_filter = filter;
        }

        Ok(config)
    }
}

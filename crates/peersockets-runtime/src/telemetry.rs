//! Tracing setup

use tracing_subscriber::EnvFilter;

use crate::PeerSocketsConfig;

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins over the configured filter. Returns false if a global
/// subscriber was already installed, which is not an error.
pub fn init_tracing(config: &PeerSocketsConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}

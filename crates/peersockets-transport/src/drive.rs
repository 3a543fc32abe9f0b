//! Drive resolution

use std::future::Future;
use std::sync::Arc;

use peersockets_core::{DiscoveryKey, ResolveError};

/// A resolved, loaded drive
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Drive {
    /// Canonical drive URL (`hyper://<host>/`)
    pub url: String,
    /// Swarm identity of the drive
    pub discovery_key: DiscoveryKey,
}

impl Drive {
    pub fn new(url: impl Into<String>, discovery_key: DiscoveryKey) -> Self {
        Drive {
            url: url.into(),
            discovery_key,
        }
    }
}

/// Resolves the drive a calling origin is authorized to act on.
///
/// Resolution may suspend on network or disk I/O while the drive loads.
pub trait DriveResolver: Send + Sync {
    fn get_or_load_drive(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Drive, ResolveError>> + Send;
}

impl<T: DriveResolver> DriveResolver for Arc<T> {
    fn get_or_load_drive(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Drive, ResolveError>> + Send {
        (**self).get_or_load_drive(url)
    }
}

/// Host part of a `scheme://host/path` URL
pub fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let host = rest.split(['/', '?', '#']).next()?;
    if host.is_empty() {
        None
    } else {
        Some(host)
    }
}

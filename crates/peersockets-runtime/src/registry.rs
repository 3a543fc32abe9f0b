//! Session registry
//!
//! Tracks every open channel per calling origin. The registry never owns a
//! channel: it keeps weak references so it can report on them (`info`) and
//! tear down an origin's channels when that origin's session ends, or all of
//! them at process shutdown.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::debug;

use peersockets_core::Origin;

use crate::Closeable;

/// Channel identity - unique for the lifetime of a registry
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Channel({})", self.0)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a channel relays
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    /// Topic messages (`join`)
    Topic,
    /// Swarm presence (`watch`)
    Presence,
}

/// One open channel as reported by [`SessionRegistry::info`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub kind: ChannelKind,
    /// Namespaced topic for topic channels, discovery key hex for presence
    pub scope: String,
}

/// Open channels of one origin
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    pub origin: Origin,
    pub channels: Vec<ChannelInfo>,
}

impl SessionInfo {
    pub fn topic_count(&self) -> usize {
        self.channels.iter().filter(|c| c.kind == ChannelKind::Topic).count()
    }

    pub fn presence_count(&self) -> usize {
        self.channels.iter().filter(|c| c.kind == ChannelKind::Presence).count()
    }
}

struct Binding {
    info: ChannelInfo,
    channel: Weak<dyn Closeable>,
}

/// Process-wide table of open channels, keyed by origin
#[derive(Default)]
pub struct SessionRegistry {
    next_id: AtomicU64,
    origins: Mutex<HashMap<Origin, Vec<Binding>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_channel_id(&self) -> ChannelId {
        ChannelId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    pub(crate) fn register(
        &self,
        origin: &Origin,
        id: ChannelId,
        kind: ChannelKind,
        scope: String,
        channel: Weak<dyn Closeable>,
    ) {
        let mut origins = self.origins.lock();
        origins.entry(origin.clone()).or_default().push(Binding {
            info: ChannelInfo { id, kind, scope },
            channel,
        });
    }

    /// Forget a channel. Returns false if it was not registered.
    pub(crate) fn deregister(&self, origin: &Origin, id: ChannelId) -> bool {
        let mut origins = self.origins.lock();
        let Some(bindings) = origins.get_mut(origin) else {
            return false;
        };
        let before = bindings.len();
        bindings.retain(|b| b.info.id != id);
        let removed = bindings.len() != before;
        if bindings.is_empty() {
            origins.remove(origin);
        }
        removed
    }

    /// Open channels of `origin`, in opening order
    pub fn info(&self, origin: &Origin) -> SessionInfo {
        let origins = self.origins.lock();
        let channels = origins
            .get(origin)
            .map(|bs| bs.iter().map(|b| b.info.clone()).collect())
            .unwrap_or_default();
        SessionInfo {
            origin: origin.clone(),
            channels,
        }
    }

    /// Total open channels across all origins
    pub fn active_channels(&self) -> usize {
        self.origins.lock().values().map(Vec::len).sum()
    }

    /// Origins with at least one open channel
    pub fn active_origins(&self) -> Vec<Origin> {
        let mut origins: Vec<Origin> = self.origins.lock().keys().cloned().collect();
        origins.sort();
        origins
    }

    /// Close every channel opened by `origin`. Returns how many were closed.
    pub fn close_origin(&self, origin: &Origin) -> usize {
        let bindings = self.origins.lock().remove(origin).unwrap_or_default();
        let closed = close_all(bindings);
        debug!(%origin, closed, "closed origin channels");
        closed
    }

    /// Close every channel of every origin. Returns how many were closed.
    pub fn shutdown(&self) -> usize {
        let drained: Vec<Binding> = self
            .origins
            .lock()
            .drain()
            .flat_map(|(_, bindings)| bindings)
            .collect();
        let closed = close_all(drained);
        debug!(closed, "session registry shut down");
        closed
    }
}

// Lock must not be held here: closing a channel deregisters it.
fn close_all(bindings: Vec<Binding>) -> usize {
    bindings
        .into_iter()
        .filter_map(|b| b.channel.upgrade())
        .filter(|channel| channel.close())
        .count()
}

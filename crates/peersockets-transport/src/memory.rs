//! In-memory loopback swarm
//!
//! A process-local stand-in for the peer network. Several clients, each with
//! its own local peer id, share one [`MemoryNetwork`]; topic sends and
//! presence changes are delivered synchronously to the listeners registered
//! by the other clients. Used for unit and end-to-end testing only.

use std::collections::HashMap;
use std::future::{ready, Future};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, trace};

use peersockets_core::{
    DiscoveryKey, NamespacedTopic, PeerId, ResolveError, TransportError, NETWORK_SCHEME,
};

use crate::{
    url_host, Drive, DriveResolver, NetworkClient, PresenceListener, PresenceWatch, TopicHandle,
    TopicListener,
};

/// Operation counters of a memory network
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemoryStats {
    pub topic_joins: u64,
    pub topic_closes: u64,
    pub sends: u64,
    pub undelivered_sends: u64,
    pub watches: u64,
    pub stops: u64,
}

struct Member {
    id: u64,
    peer: PeerId,
    listener: Arc<dyn TopicListener>,
}

struct Watcher {
    id: u64,
    peer: PeerId,
    listener: Arc<dyn PresenceListener>,
}

#[derive(Default)]
struct SwarmState {
    next_id: u64,
    topics: HashMap<NamespacedTopic, Vec<Member>>,
    watchers: HashMap<DiscoveryKey, Vec<Watcher>>,
    swarms: HashMap<DiscoveryKey, Vec<PeerId>>,
    stats: MemoryStats,
    failing_teardown: bool,
}

impl SwarmState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn presence_listeners(&self, key: &DiscoveryKey, peer: &PeerId) -> Vec<Arc<dyn PresenceListener>> {
        self.watchers
            .get(key)
            .map(|ws| {
                ws.iter()
                    .filter(|w| w.peer != *peer)
                    .map(|w| Arc::clone(&w.listener))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Shared in-memory swarm
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<SwarmState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client acting as `local` on this network
    pub fn client(&self, local: impl Into<PeerId>) -> MemoryClient {
        MemoryClient {
            local: local.into(),
            network: self.clone(),
        }
    }

    /// Snapshot of operation counters
    pub fn stats(&self) -> MemoryStats {
        self.state.lock().stats.clone()
    }

    /// Make every subsequent close/stop report an I/O error (after releasing)
    pub fn set_failing_teardown(&self, failing: bool) {
        self.state.lock().failing_teardown = failing;
    }

    /// Number of live memberships on a topic
    pub fn topic_members(&self, topic: &NamespacedTopic) -> usize {
        self.state.lock().topics.get(topic).map_or(0, Vec::len)
    }

    /// Number of live presence watches on a swarm
    pub fn watcher_count(&self, key: &DiscoveryKey) -> usize {
        self.state.lock().watchers.get(key).map_or(0, Vec::len)
    }

    /// Deliver a message from a remote `from` peer to every member of `topic`.
    ///
    /// Returns the number of listeners reached.
    pub fn deliver(&self, topic: &NamespacedTopic, from: &PeerId, message: Value) -> usize {
        trace!(%topic, %from, "memory swarm: deliver");
        let listeners: Vec<Arc<dyn TopicListener>> = {
            let state = self.state.lock();
            state
                .topics
                .get(topic)
                .map(|ms| {
                    ms.iter()
                        .filter(|m| m.peer != *from)
                        .map(|m| Arc::clone(&m.listener))
                        .collect()
                })
                .unwrap_or_default()
        };
        for listener in &listeners {
            listener.on_message(from.clone(), message.clone());
        }
        listeners.len()
    }

    /// `peer` joins the swarm of `key`; watchers other than `peer` are notified.
    ///
    /// Returns false if the peer was already present.
    pub fn announce(&self, key: &DiscoveryKey, peer: &PeerId) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            let members = state.swarms.entry(key.clone()).or_default();
            if members.contains(peer) {
                return false;
            }
            members.push(peer.clone());
            state.presence_listeners(key, peer)
        };
        for listener in &listeners {
            listener.on_join(peer);
        }
        true
    }

    /// `peer` leaves the swarm of `key`; watchers other than `peer` are notified.
    ///
    /// Returns false if the peer was not present.
    pub fn depart(&self, key: &DiscoveryKey, peer: &PeerId) -> bool {
        let listeners = {
            let mut state = self.state.lock();
            let Some(members) = state.swarms.get_mut(key) else {
                return false;
            };
            let before = members.len();
            members.retain(|p| p != peer);
            if members.len() == before {
                return false;
            }
            state.presence_listeners(key, peer)
        };
        for listener in &listeners {
            listener.on_leave(peer);
        }
        true
    }

    /// Peers currently present in the swarm of `key`
    pub fn swarm_peers(&self, key: &DiscoveryKey) -> Vec<PeerId> {
        self.state.lock().swarms.get(key).cloned().unwrap_or_default()
    }
}

/// A [`MemoryNetwork`] client bound to a local peer id
#[derive(Clone)]
pub struct MemoryClient {
    local: PeerId,
    network: MemoryNetwork,
}

impl MemoryClient {
    pub fn local_peer(&self) -> &PeerId {
        &self.local
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }
}

impl NetworkClient for MemoryClient {
    fn join_topic(
        &self,
        topic: &NamespacedTopic,
        listener: Arc<dyn TopicListener>,
    ) -> Result<Box<dyn TopicHandle>, TransportError> {
        let mut state = self.network.state.lock();
        let id = state.next_id();
        state.stats.topic_joins += 1;
        state.topics.entry(topic.clone()).or_default().push(Member {
            id,
            peer: self.local.clone(),
            listener,
        });
        Ok(Box::new(MemoryTopicHandle {
            id,
            topic: topic.clone(),
            local: self.local.clone(),
            state: Arc::clone(&self.network.state),
        }))
    }

    fn watch_peers(
        &self,
        key: &DiscoveryKey,
        listener: Arc<dyn PresenceListener>,
    ) -> Result<Box<dyn PresenceWatch>, TransportError> {
        let mut state = self.network.state.lock();
        let id = state.next_id();
        state.stats.watches += 1;
        state.watchers.entry(key.clone()).or_default().push(Watcher {
            id,
            peer: self.local.clone(),
            listener,
        });
        Ok(Box::new(MemoryPresenceWatch {
            id,
            key: key.clone(),
            state: Arc::clone(&self.network.state),
        }))
    }
}

struct MemoryTopicHandle {
    id: u64,
    topic: NamespacedTopic,
    local: PeerId,
    state: Arc<Mutex<SwarmState>>,
}

impl TopicHandle for MemoryTopicHandle {
    fn send(&self, peer: &PeerId, message: Value) -> Result<(), TransportError> {
        let targets: Vec<Arc<dyn TopicListener>> = {
            let mut state = self.state.lock();
            state.stats.sends += 1;
            let members = state.topics.get(&self.topic).map(Vec::as_slice).unwrap_or(&[]);
            if !members.iter().any(|m| m.id == self.id) {
                return Err(TransportError::TopicClosed(self.topic.to_string()));
            }
            let targets: Vec<_> = members
                .iter()
                .filter(|m| m.peer == *peer && m.id != self.id)
                .map(|m| Arc::clone(&m.listener))
                .collect();
            if targets.is_empty() {
                state.stats.undelivered_sends += 1;
                debug!(topic = %self.topic, %peer, "memory swarm: peer not on topic");
                return Err(TransportError::PeerNotConnected(peer.clone()));
            }
            targets
        };
        for listener in &targets {
            listener.on_message(self.local.clone(), message.clone());
        }
        Ok(())
    }

    fn close(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.stats.topic_closes += 1;
        let mut removed = false;
        if let Some(members) = state.topics.get_mut(&self.topic) {
            let before = members.len();
            members.retain(|m| m.id != self.id);
            removed = members.len() != before;
            if members.is_empty() {
                state.topics.remove(&self.topic);
            }
        }
        if !removed {
            return Err(TransportError::TopicClosed(self.topic.to_string()));
        }
        if state.failing_teardown {
            debug!(topic = %self.topic, "memory swarm: injected topic leave failure");
            return Err(TransportError::Io("topic leave failed".to_string()));
        }
        Ok(())
    }
}

struct MemoryPresenceWatch {
    id: u64,
    key: DiscoveryKey,
    state: Arc<Mutex<SwarmState>>,
}

impl PresenceWatch for MemoryPresenceWatch {
    fn stop(&self) -> Result<(), TransportError> {
        let mut state = self.state.lock();
        state.stats.stops += 1;
        let mut removed = false;
        if let Some(watchers) = state.watchers.get_mut(&self.key) {
            let before = watchers.len();
            watchers.retain(|w| w.id != self.id);
            removed = watchers.len() != before;
            if watchers.is_empty() {
                state.watchers.remove(&self.key);
            }
        }
        if !removed {
            return Err(TransportError::AlreadyStopped);
        }
        if state.failing_teardown {
            debug!(key = %self.key, "memory swarm: injected unwatch failure");
            return Err(TransportError::Io("presence unwatch failed".to_string()));
        }
        Ok(())
    }
}

/// Resolver over a fixed table of `hyper://<host>` drives
#[derive(Default)]
pub struct MemoryDriveResolver {
    drives: RwLock<HashMap<String, DiscoveryKey>>,
    resolves: AtomicUsize,
}

impl MemoryDriveResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a drive under `host`; returns the drive as it will resolve
    pub fn insert(&self, host: &str, key: impl Into<DiscoveryKey>) -> Drive {
        let key = key.into();
        self.drives.write().insert(host.to_string(), key.clone());
        Drive::new(format!("{}{}/", NETWORK_SCHEME, host), key)
    }

    /// Number of resolution attempts so far
    pub fn resolve_count(&self) -> usize {
        self.resolves.load(Ordering::Relaxed)
    }

    fn lookup(&self, url: &str) -> Result<Drive, ResolveError> {
        if !url.starts_with(NETWORK_SCHEME) {
            return Err(ResolveError::UnsupportedScheme(url.to_string()));
        }
        let host = url_host(url).ok_or_else(|| ResolveError::NotFound(url.to_string()))?;
        let drives = self.drives.read();
        let key = drives
            .get(host)
            .ok_or_else(|| ResolveError::NotFound(url.to_string()))?;
        Ok(Drive::new(format!("{}{}/", NETWORK_SCHEME, host), key.clone()))
    }
}

impl DriveResolver for MemoryDriveResolver {
    fn get_or_load_drive(
        &self,
        url: &str,
    ) -> impl Future<Output = Result<Drive, ResolveError>> + Send {
        self.resolves.fetch_add(1, Ordering::Relaxed);
        ready(self.lookup(url))
    }
}

//! Network client interfaces
//!
//! The peer network is an external collaborator. PeerSockets only ever talks
//! to it through these traits: join a topic, send to a peer on it, close it;
//! watch a swarm's presence, stop watching. Listener callbacks are invoked
//! from the client's own context and may run concurrently with anything else.

use std::sync::Arc;

use serde_json::Value;

use peersockets_core::{DiscoveryKey, NamespacedTopic, PeerId, TransportError};

/// Receives messages published to a joined topic
pub trait TopicListener: Send + Sync {
    fn on_message(&self, peer: PeerId, message: Value);
}

/// Receives swarm membership changes for a watched drive
pub trait PresenceListener: Send + Sync {
    fn on_join(&self, peer: &PeerId);
    fn on_leave(&self, peer: &PeerId);
}

/// One live topic membership
pub trait TopicHandle: Send + Sync {
    /// Send a message to a single peer on this topic
    fn send(&self, peer: &PeerId, message: Value) -> Result<(), TransportError>;

    /// Leave the topic
    fn close(&self) -> Result<(), TransportError>;
}

/// One live presence subscription
pub trait PresenceWatch: Send + Sync {
    /// Stop receiving presence events
    fn stop(&self) -> Result<(), TransportError>;
}

/// Topic pub/sub and presence operations of the peer network
pub trait NetworkClient: Send + Sync {
    /// Join `topic`, routing every inbound message to `listener`
    fn join_topic(
        &self,
        topic: &NamespacedTopic,
        listener: Arc<dyn TopicListener>,
    ) -> Result<Box<dyn TopicHandle>, TransportError>;

    /// Watch join/leave events of the swarm identified by `key`
    fn watch_peers(
        &self,
        key: &DiscoveryKey,
        listener: Arc<dyn PresenceListener>,
    ) -> Result<Box<dyn PresenceWatch>, TransportError>;
}

impl<T: NetworkClient + ?Sized> NetworkClient for Arc<T> {
    fn join_topic(
        &self,
        topic: &NamespacedTopic,
        listener: Arc<dyn TopicListener>,
    ) -> Result<Box<dyn TopicHandle>, TransportError> {
        (**self).join_topic(topic, listener)
    }

    fn watch_peers(
        &self,
        key: &DiscoveryKey,
        listener: Arc<dyn PresenceListener>,
    ) -> Result<Box<dyn PresenceWatch>, TransportError> {
        (**self).watch_peers(key, listener)
    }
}

//! Peer presence channel
//!
//! Relays join/leave events of a drive's swarm to the application. Events
//! raised before the watch was opened are not replayed.

use std::sync::Arc;

use tracing::{debug, trace};

use peersockets_core::{DiscoveryKey, Origin, PeerId, PeerSocketsResult, PresenceEnvelope};
use peersockets_transport::{NetworkClient, PresenceListener, PresenceWatch};

use crate::channel::ChannelCore;
use crate::{ChannelId, ChannelKind, Closeable, QueuePolicy, RelayQueue, RelayStats, SessionRegistry};

type PresenceCore = ChannelCore<PresenceEnvelope, Box<dyn PresenceWatch>>;

struct PresenceRelay {
    queue: Arc<RelayQueue<PresenceEnvelope>>,
}

impl PresenceRelay {
    fn relay(&self, envelope: PresenceEnvelope) {
        if !self.queue.push(envelope) {
            trace!("presence event arrived after watch stopped");
        }
    }
}

impl PresenceListener for PresenceRelay {
    fn on_join(&self, peer: &PeerId) {
        self.relay(PresenceEnvelope::Join {
            peer_id: peer.clone(),
        });
    }

    fn on_leave(&self, peer: &PeerId) {
        self.relay(PresenceEnvelope::Leave {
            peer_id: peer.clone(),
        });
    }
}

/// Watch the swarm of `key` and bind the watch to `origin`
pub(crate) fn open_presence(
    network: &dyn NetworkClient,
    registry: &Arc<SessionRegistry>,
    origin: Origin,
    key: DiscoveryKey,
    policy: QueuePolicy,
) -> PeerSocketsResult<PresenceStream> {
    debug!(%origin, %key, "Watching peers");

    let queue = Arc::new(RelayQueue::new(policy));
    let listener = Arc::new(PresenceRelay {
        queue: Arc::clone(&queue),
    });
    let watch = network.watch_peers(&key, listener)?;

    let core = ChannelCore::open(
        registry,
        origin,
        ChannelKind::Presence,
        key.to_hex(),
        queue,
        watch,
    );
    Ok(PresenceStream { core, key })
}

/// One-way stream of swarm presence events
pub struct PresenceStream {
    core: Arc<PresenceCore>,
    key: DiscoveryKey,
}

impl PresenceStream {
    pub fn id(&self) -> ChannelId {
        self.core.id
    }

    pub fn discovery_key(&self) -> &DiscoveryKey {
        &self.key
    }

    /// Next presence event; `None` once closed
    pub async fn recv(&mut self) -> Option<PresenceEnvelope> {
        self.core.queue.recv().await
    }

    pub fn try_recv(&mut self) -> Option<PresenceEnvelope> {
        self.core.queue.try_recv()
    }

    /// Close the stream. Returns true for the call that stopped the watch.
    pub fn close(&self) -> bool {
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn stats(&self) -> RelayStats {
        self.core.queue.stats()
    }
}

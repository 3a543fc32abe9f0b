//! Peer messaging channel
//!
//! ```text
//!   swarm ──on_message──► TopicRelay ──► RelayQueue ──recv──► application
//!   swarm ◄──send──────── TopicHandle ◄──write [peerId, msg]── application
//! ```
//!
//! One `join` opens exactly one topic membership; two joins on the same
//! namespaced topic are independent memberships.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use peersockets_core::{
    MessageEnvelope, NamespacedTopic, Origin, OutboundRecord, PeerId, PeerSocketsError,
    PeerSocketsResult,
};
use peersockets_transport::{NetworkClient, TopicHandle, TopicListener};

use crate::channel::ChannelCore;
use crate::{ChannelId, ChannelKind, Closeable, QueuePolicy, RelayQueue, RelayStats, SessionRegistry};

type TopicCore = ChannelCore<MessageEnvelope, Box<dyn TopicHandle>>;

/// Routes inbound topic messages into the stream's queue
struct TopicRelay {
    queue: Arc<RelayQueue<MessageEnvelope>>,
}

impl TopicListener for TopicRelay {
    fn on_message(&self, peer: PeerId, message: Value) {
        if !self.queue.push(MessageEnvelope::message(peer, message)) {
            trace!("message arrived after topic closed");
        }
    }
}

/// Join `topic` on the network and bind the membership to `origin`
pub(crate) fn open_topic(
    network: &dyn NetworkClient,
    registry: &Arc<SessionRegistry>,
    origin: Origin,
    topic: NamespacedTopic,
    policy: QueuePolicy,
) -> PeerSocketsResult<TopicStream> {
    debug!(%origin, %topic, "Joining topic");

    let queue = Arc::new(RelayQueue::new(policy));
    let listener = Arc::new(TopicRelay {
        queue: Arc::clone(&queue),
    });
    let handle = network.join_topic(&topic, listener)?;

    let core = ChannelCore::open(
        registry,
        origin,
        ChannelKind::Topic,
        topic.to_string(),
        queue,
        handle,
    );
    Ok(TopicStream { core, topic })
}

/// Duplex stream over one topic membership
pub struct TopicStream {
    core: Arc<TopicCore>,
    topic: NamespacedTopic,
}

impl TopicStream {
    pub fn id(&self) -> ChannelId {
        self.core.id
    }

    pub fn topic(&self) -> &NamespacedTopic {
        &self.topic
    }

    /// Next message from the swarm; `None` once closed
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        self.core.queue.recv().await
    }

    pub fn try_recv(&mut self) -> Option<MessageEnvelope> {
        self.core.queue.try_recv()
    }

    /// Relay a raw `[peerId, message]` record written by the application.
    ///
    /// Malformed records are logged and dropped; the stream stays open.
    pub fn write(&self, record: Value) {
        write_record(&self.core, record);
    }

    /// Send a validated record.
    ///
    /// Fails with `ChannelClosed` after close, or with the transport error
    /// when the network rejects it. Neither closes the stream.
    pub fn send(&self, record: OutboundRecord) -> PeerSocketsResult<()> {
        send_record(&self.core, record)
    }

    /// Close the stream. Returns true for the call that released the topic.
    pub fn close(&self) -> bool {
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    pub fn stats(&self) -> RelayStats {
        self.core.queue.stats()
    }

    /// Split into independently owned read and write halves.
    ///
    /// Closing either half closes the channel; dropping both releases it.
    pub fn split(self) -> (TopicReceiver, TopicSender) {
        (
            TopicReceiver {
                core: Arc::clone(&self.core),
            },
            TopicSender { core: self.core },
        )
    }
}

/// Read half of a [`TopicStream`]
pub struct TopicReceiver {
    core: Arc<TopicCore>,
}

impl TopicReceiver {
    pub async fn recv(&mut self) -> Option<MessageEnvelope> {
        self.core.queue.recv().await
    }

    pub fn try_recv(&mut self) -> Option<MessageEnvelope> {
        self.core.queue.try_recv()
    }

    pub fn close(&self) -> bool {
        self.core.close()
    }
}

/// Write half of a [`TopicStream`]
#[derive(Clone)]
pub struct TopicSender {
    core: Arc<TopicCore>,
}

impl TopicSender {
    pub fn write(&self, record: Value) {
        write_record(&self.core, record);
    }

    pub fn send(&self, record: OutboundRecord) -> PeerSocketsResult<()> {
        send_record(&self.core, record)
    }

    pub fn close(&self) -> bool {
        self.core.close()
    }

    pub fn is_closed(&self) -> bool {
        self.core.is_closed()
    }
}

fn write_record(core: &TopicCore, record: Value) {
    match OutboundRecord::from_value(record) {
        Ok(record) => {
            let _ = send_record(core, record);
        }
        Err(e) => {
            debug!(channel = %core.id, error = %e, "Incorrectly formed message from peersockets send API");
        }
    }
}

fn send_record(core: &TopicCore, record: OutboundRecord) -> PeerSocketsResult<()> {
    if core.is_closed() {
        debug!(channel = %core.id, peer = %record.peer_id, "send on closed topic ignored");
        return Err(PeerSocketsError::ChannelClosed);
    }
    core.subscription
        .send(&record.peer_id, record.message)
        .map_err(|e| {
            warn!(channel = %core.id, peer = %record.peer_id, error = %e, "peer send failed");
            e.into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use peersockets_core::{namespace, DiscoveryKey, TransportError};
    use peersockets_transport::MemoryNetwork;
    use serde_json::json;

    fn setup() -> (MemoryNetwork, Arc<SessionRegistry>, NamespacedTopic) {
        let key = DiscoveryKey::from([0x5a; 8]);
        (MemoryNetwork::new(), Arc::new(SessionRegistry::new()), namespace("chat", &key))
    }

    fn open(net: &MemoryNetwork, registry: &Arc<SessionRegistry>, topic: &NamespacedTopic) -> TopicStream {
        let client = net.client("local");
        open_topic(
            &client,
            registry,
            Origin::from("hyper://app/"),
            topic.clone(),
            QueuePolicy::Unbounded,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_inbound_relay_order() {
        let (net, registry, topic) = setup();
        let mut stream = open(&net, &registry, &topic);

        net.deliver(&topic, &PeerId::from("p1"), json!({"a": 1}));
        net.deliver(&topic, &PeerId::from("p2"), json!({"b": 2}));

        let first = stream.recv().await.unwrap();
        assert_eq!(
            serde_json::to_value(&first).unwrap(),
            json!({"type": "message", "peerId": "p1", "message": {"a": 1}})
        );
        let second = stream.recv().await.unwrap();
        assert_eq!(second.peer_id(), &PeerId::from("p2"));
        assert_eq!(stream.try_recv(), None);
    }

    #[tokio::test]
    async fn test_malformed_write_is_dropped() {
        let (net, registry, topic) = setup();
        let stream = open(&net, &registry, &topic);
        let _remote = net
            .client("bob")
            .join_topic(&topic, Arc::new(TopicRelay { queue: Arc::new(RelayQueue::new(QueuePolicy::Unbounded)) }))
            .unwrap();

        stream.write(json!("not-an-array"));
        stream.write(json!(["onlyOneElement"]));
        assert_eq!(net.stats().sends, 0);
        assert!(!stream.is_closed());

        stream.write(json!(["bob", "hello"]));
        assert_eq!(net.stats().sends, 1);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_stream_open() {
        let (net, registry, topic) = setup();
        let stream = open(&net, &registry, &topic);

        let err = stream
            .send(OutboundRecord::new(PeerId::from("ghost"), json!(1)))
            .unwrap_err();
        assert!(matches!(
            err,
            PeerSocketsError::Transport(TransportError::PeerNotConnected(_))
        ));
        assert!(!stream.is_closed());
        assert_eq!(net.stats().undelivered_sends, 1);
    }

    #[tokio::test]
    async fn test_close_releases_once() {
        let (net, registry, topic) = setup();
        let mut stream = open(&net, &registry, &topic);
        assert_eq!(net.topic_members(&topic), 1);
        assert_eq!(registry.active_channels(), 1);

        assert!(stream.close());
        assert!(!stream.close());
        assert_eq!(stream.recv().await, None);
        drop(stream);

        assert_eq!(net.stats().topic_closes, 1);
        assert_eq!(net.topic_members(&topic), 0);
        assert_eq!(registry.active_channels(), 0);
    }

    #[tokio::test]
    async fn test_drop_releases() {
        let (net, registry, topic) = setup();
        let stream = open(&net, &registry, &topic);
        drop(stream);
        assert_eq!(net.stats().topic_closes, 1);
        assert_eq!(registry.active_channels(), 0);
    }

    #[tokio::test]
    async fn test_split_halves() {
        let (net, registry, topic) = setup();
        let (mut rx, tx) = open(&net, &registry, &topic).split();

        net.deliver(&topic, &PeerId::from("p1"), json!("x"));
        assert_eq!(rx.recv().await.unwrap().payload(), &json!("x"));

        // Dropping one half keeps the channel alive
        drop(rx);
        assert!(!tx.is_closed());
        assert_eq!(net.stats().topic_closes, 0);

        assert!(tx.close());
        assert!(matches!(
            tx.send(OutboundRecord::new(PeerId::from("p1"), json!(1))),
            Err(PeerSocketsError::ChannelClosed)
        ));
        drop(tx);
        assert_eq!(net.stats().topic_closes, 1);
        assert_eq!(net.stats().sends, 0);
    }

    #[tokio::test]
    async fn test_independent_memberships() {
        let (net, registry, topic) = setup();
        let mut a = open(&net, &registry, &topic);
        let mut b = open(&net, &registry, &topic);
        assert_eq!(net.stats().topic_joins, 2);
        assert_ne!(a.id(), b.id());

        net.deliver(&topic, &PeerId::from("p1"), json!(1));
        assert!(a.try_recv().is_some());
        assert!(b.try_recv().is_some());

        a.close();
        assert_eq!(net.topic_members(&topic), 1);
        net.deliver(&topic, &PeerId::from("p1"), json!(2));
        assert_eq!(b.recv().await.unwrap().payload(), &json!(2));
    }
}

//! End-to-end relay scenarios
//!
//! Several nodes sharing one swarm, covering:
//! - Directed messaging between applications of the same drive
//! - Isolation of drives and topics
//! - Presence ordering under churn
//! - Origin and service teardown

use peersockets_core::{PeerSocketsResult, PresenceEnvelope};

use crate::churn::{ChurnConfig, ChurnGenerator};
use crate::harness::SwarmHarness;

// ============================================================================
// PRESENCE CHURN
// ============================================================================

/// Outcome of a presence churn run
#[derive(Clone, Debug, Default)]
pub struct ChurnReport {
    /// Envelopes implied by the generated churn, in order
    pub expected: Vec<PresenceEnvelope>,
    /// Envelopes the watching application actually received
    pub observed: Vec<PresenceEnvelope>,
}

impl ChurnReport {
    /// Every event was relayed, once, in generation order
    pub fn is_exact(&self) -> bool {
        self.expected == self.observed
    }
}

/// Watch a drive while `events` seeded membership changes hit its swarm
pub async fn run_presence_churn(
    config: ChurnConfig,
    seed: u64,
    events: usize,
) -> PeerSocketsResult<ChurnReport> {
    let harness = SwarmHarness::new();
    let drive = harness.add_drive("app", [0x42u8; 32]);
    let node = harness.spawn_node("watcher");
    let mut stream = node.watch("app").await?;

    let mut churn = ChurnGenerator::with_seed(config, seed);
    let expected = churn
        .drive(harness.network(), &drive.discovery_key, events)
        .iter()
        .map(|e| e.envelope())
        .collect();

    // The memory swarm notifies synchronously, so everything is queued by now
    let mut observed = Vec::with_capacity(events);
    while let Some(envelope) = stream.try_recv() {
        observed.push(envelope);
    }
    stream.close();

    Ok(ChurnReport { expected, observed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::{within, DEFAULT_WAIT};
    use peersockets_core::{MessageEnvelope, OutboundRecord, PeerId};
    use peersockets_runtime::{PeerSocketsConfig, QueuePolicy};
    use serde_json::json;

    // ========================================================================
    // MESSAGING
    // ========================================================================

    #[tokio::test]
    async fn test_two_nodes_exchange_messages() {
        let harness = SwarmHarness::new();
        harness.add_drive("app", [1u8; 32]);
        let alice = harness.spawn_node("alice");
        let bob = harness.spawn_node("bob");

        let mut a = alice.join("app", "chat").await.unwrap();
        let mut b = bob.join("app", "chat").await.unwrap();
        assert_eq!(a.topic(), b.topic());

        a.write(json!(["bob", {"text": "hello"}]));
        let got = within(DEFAULT_WAIT, b.recv()).await.unwrap();
        assert_eq!(
            serde_json::to_value(&got).unwrap(),
            json!({"type": "message", "peerId": "alice", "message": {"text": "hello"}})
        );

        b.send(OutboundRecord::new(PeerId::from("alice"), json!("hi back")))
            .unwrap();
        let reply = within(DEFAULT_WAIT, a.recv()).await.unwrap();
        assert_eq!(reply, MessageEnvelope::message(PeerId::from("bob"), json!("hi back")));
    }

    #[tokio::test]
    async fn test_drives_are_isolated() {
        let harness = SwarmHarness::new();
        harness.add_drive("app", [1u8; 32]);
        harness.add_drive("other", [2u8; 32]);
        let alice = harness.spawn_node("alice");
        let bob = harness.spawn_node("bob");

        let a = alice.join("app", "chat").await.unwrap();
        let mut b = bob.join("other", "chat").await.unwrap();
        assert_ne!(a.topic(), b.topic());

        // Same topic name, different drive: bob is not reachable
        assert!(a.send(OutboundRecord::new(PeerId::from("bob"), json!(1))).is_err());
        assert_eq!(b.try_recv(), None);
        assert_eq!(harness.network().stats().undelivered_sends, 1);
    }

    #[tokio::test]
    async fn test_topics_are_isolated() {
        let harness = SwarmHarness::new();
        harness.add_drive("app", [1u8; 32]);
        let alice = harness.spawn_node("alice");
        let bob = harness.spawn_node("bob");

        let chat = alice.join("app", "chat").await.unwrap();
        let mut news = bob.join("app", "news").await.unwrap();

        harness.network().deliver(chat.topic(), &PeerId::from("carol"), json!("on chat"));
        assert_eq!(news.try_recv(), None);
    }

    #[tokio::test]
    async fn test_split_stream_across_tasks() {
        let harness = SwarmHarness::new();
        harness.add_drive("app", [1u8; 32]);
        let alice = harness.spawn_node("alice");
        let bob = harness.spawn_node("bob");

        let (mut rx, _tx) = alice.join("app", "chat").await.unwrap().split();
        let b = bob.join("app", "chat").await.unwrap();

        let reader = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(envelope) = within(DEFAULT_WAIT, rx.recv()).await {
                seen.push(envelope.payload().clone());
                if seen.len() == 3 {
                    break;
                }
            }
            seen
        });

        for i in 0..3 {
            b.write(json!(["alice", i]));
        }
        assert_eq!(reader.await.unwrap(), vec![json!(0), json!(1), json!(2)]);
    }

    #[test]
    fn test_concurrent_senders_keep_per_peer_order() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let harness = SwarmHarness::new();
        harness.add_drive("app", [1u8; 32]);
        let alice = harness.spawn_node("alice");
        let mut stream = rt.block_on(alice.join("app", "chat")).unwrap();

        let senders: Vec<_> = (0..4)
            .map(|s| {
                let net = harness.network().clone();
                let topic = stream.topic().clone();
                std::thread::spawn(move || {
                    let peer = PeerId::new(format!("sender-{}", s));
                    for seq in 0..100u64 {
                        net.deliver(&topic, &peer, json!(seq));
                    }
                })
            })
            .collect();
        for handle in senders {
            handle.join().unwrap();
        }

        let mut last: std::collections::HashMap<PeerId, u64> = Default::default();
        let mut total = 0;
        while let Some(envelope) = stream.try_recv() {
            let seq = envelope.payload().as_u64().unwrap();
            if let Some(prev) = last.insert(envelope.peer_id().clone(), seq) {
                assert!(seq > prev);
            }
            total += 1;
        }
        assert_eq!(total, 400);
        assert_eq!(stream.stats().dropped, 0);
    }

    // ========================================================================
    // PRESENCE
    // ========================================================================

    #[tokio::test]
    async fn test_presence_between_nodes() {
        let harness = SwarmHarness::new();
        let drive = harness.add_drive("app", [1u8; 32]);
        let alice = harness.spawn_node("alice");
        let bob = harness.spawn_node("bob");

        let mut watch = alice.watch("app").await.unwrap();
        assert!(bob.announce(&drive));
        assert!(alice.announce(&drive));
        assert!(bob.depart(&drive));

        assert_eq!(
            within(DEFAULT_WAIT, watch.recv()).await,
            Some(PresenceEnvelope::Join { peer_id: PeerId::from("bob") })
        );
        assert_eq!(
            within(DEFAULT_WAIT, watch.recv()).await,
            Some(PresenceEnvelope::Leave { peer_id: PeerId::from("bob") })
        );
        assert_eq!(watch.try_recv(), None);
    }

    #[tokio::test]
    async fn test_presence_churn_is_exact() {
        for (config, seed) in [
            (ChurnConfig::steady(), 1),
            (ChurnConfig::flapping(), 2),
            (ChurnConfig::draining(), 3),
        ] {
            let report = run_presence_churn(config, seed, 300).await.unwrap();
            assert_eq!(report.observed.len(), 300);
            assert!(report.is_exact());
        }
    }

    #[tokio::test]
    async fn test_bounded_presence_keeps_newest() {
        let harness = SwarmHarness::with_config(
            PeerSocketsConfig::default().with_queue_policy(QueuePolicy::DropOldest { capacity: 8 }),
        );
        let drive = harness.add_drive("app", [1u8; 32]);
        let node = harness.spawn_node("watcher");
        let mut watch = node.watch("app").await.unwrap();

        let mut churn = ChurnGenerator::with_seed(ChurnConfig::flapping(), 9);
        let events = churn.drive(harness.network(), &drive.discovery_key, 50);

        let mut observed = Vec::new();
        while let Some(envelope) = watch.try_recv() {
            observed.push(envelope);
        }
        let tail: Vec<_> = events[42..].iter().map(|e| e.envelope()).collect();
        assert_eq!(observed, tail);
        assert_eq!(watch.stats().dropped, 42);
    }

    // ========================================================================
    // TEARDOWN
    // ========================================================================

    #[tokio::test]
    async fn test_close_origin_stops_delivery() {
        let harness = SwarmHarness::new();
        let drive = harness.add_drive("app", [1u8; 32]);
        let alice = harness.spawn_node("alice");
        let bob = harness.spawn_node("bob");

        let mut a = alice.join("app", "chat").await.unwrap();
        let mut w = alice.watch("app").await.unwrap();
        let b = bob.join("app", "chat").await.unwrap();
        assert_eq!(alice.info("app").channels.len(), 2);

        let origin = alice.caller("app").origin().clone();
        assert_eq!(alice.service().registry().close_origin(&origin), 2);
        assert!(alice.info("app").channels.is_empty());

        assert!(b.send(OutboundRecord::new(PeerId::from("alice"), json!(1))).is_err());
        bob.announce(&drive);
        assert_eq!(a.recv().await, None);
        assert_eq!(w.recv().await, None);

        let stats = harness.network().stats();
        assert_eq!(stats.topic_closes, 1);
        assert_eq!(stats.stops, 1);
        assert_eq!(harness.network().watcher_count(&drive.discovery_key), 0);
    }

    #[tokio::test]
    async fn test_shutdown_is_per_service() {
        let harness = SwarmHarness::new();
        harness.add_drive("app", [1u8; 32]);
        harness.add_drive("other", [2u8; 32]);
        let alice = harness.spawn_node("alice");
        let bob = harness.spawn_node("bob");

        let a1 = alice.join("app", "chat").await.unwrap();
        let a2 = alice.join("other", "chat").await.unwrap();
        let _w = alice.watch("other").await.unwrap();
        let b = bob.join("app", "chat").await.unwrap();

        assert_eq!(alice.service().registry().active_origins().len(), 2);
        assert_eq!(alice.service().registry().shutdown(), 3);
        assert!(a1.is_closed());
        assert!(a2.is_closed());
        assert!(!b.is_closed());
        assert_eq!(harness.network().topic_members(b.topic()), 1);

        // Second shutdown finds nothing left to release
        assert_eq!(alice.service().registry().shutdown(), 0);
        drop(a1);
        drop(a2);
        assert_eq!(harness.network().stats().topic_closes, 2);
    }

    #[tokio::test]
    async fn test_permission_refusal_leaves_no_trace() {
        let harness = SwarmHarness::new();
        harness.add_drive("app", [1u8; 32]);
        let alice = harness.spawn_node("alice");

        let caller = peersockets_runtime::CallerContext::new("https://app/");
        let err = alice.service().join(&caller, "chat").await.err().unwrap();
        assert!(err.is_permission());
        assert_eq!(harness.resolver().resolve_count(), 0);
        assert_eq!(harness.network().stats().topic_joins, 0);
        assert_eq!(alice.service().registry().active_channels(), 0);
    }
}

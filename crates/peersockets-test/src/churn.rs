//! Swarm churn generation
//!
//! Produces reproducible join/leave sequences for a drive's swarm:
//! - Steady (mostly joins, few departures)
//! - Flapping (peers leave and rejoin constantly)
//! - Draining (mostly departures)

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use peersockets_core::{DiscoveryKey, PeerId, PresenceEnvelope};
use peersockets_transport::MemoryNetwork;

/// Churn configuration
#[derive(Clone, Debug)]
pub struct ChurnConfig {
    /// Number of distinct remote peers that may take part
    pub pool_size: usize,
    /// Probability that the next event is a join (when both are possible)
    pub join_bias: f64,
}

impl Default for ChurnConfig {
    fn default() -> Self {
        ChurnConfig {
            pool_size: 16,
            join_bias: 0.6,
        }
    }
}

impl ChurnConfig {
    /// Swarm that mostly grows
    pub fn steady() -> Self {
        ChurnConfig {
            pool_size: 32,
            join_bias: 0.85,
        }
    }

    /// Small swarm whose peers come and go constantly
    pub fn flapping() -> Self {
        ChurnConfig {
            pool_size: 4,
            join_bias: 0.5,
        }
    }

    /// Swarm that mostly shrinks
    pub fn draining() -> Self {
        ChurnConfig {
            pool_size: 16,
            join_bias: 0.2,
        }
    }
}

/// One swarm membership change
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChurnEvent {
    Join(PeerId),
    Leave(PeerId),
}

impl ChurnEvent {
    /// Envelope a presence stream should report for this event
    pub fn envelope(&self) -> PresenceEnvelope {
        match self {
            ChurnEvent::Join(peer) => PresenceEnvelope::Join {
                peer_id: peer.clone(),
            },
            ChurnEvent::Leave(peer) => PresenceEnvelope::Leave {
                peer_id: peer.clone(),
            },
        }
    }
}

/// Seeded churn generator
pub struct ChurnGenerator {
    config: ChurnConfig,
    rng: StdRng,
    present: Vec<PeerId>,
    absent: Vec<PeerId>,
}

impl ChurnGenerator {
    pub fn new(config: ChurnConfig) -> Self {
        Self::with_seed(config, 42)
    }

    pub fn with_seed(config: ChurnConfig, seed: u64) -> Self {
        let absent = (0..config.pool_size.max(1))
            .map(|i| PeerId::new(format!("remote-{}", i)))
            .collect();
        ChurnGenerator {
            config,
            rng: StdRng::seed_from_u64(seed),
            present: Vec::new(),
            absent,
        }
    }

    /// Next membership change, always consistent with current membership
    pub fn next_event(&mut self) -> ChurnEvent {
        let join = if self.present.is_empty() {
            true
        } else if self.absent.is_empty() {
            false
        } else {
            self.rng.gen_bool(self.join_probability())
        };

        if join {
            let idx = self.rng.gen_range(0..self.absent.len());
            let peer = self.absent.swap_remove(idx);
            self.present.push(peer.clone());
            ChurnEvent::Join(peer)
        } else {
            let idx = self.rng.gen_range(0..self.present.len());
            let peer = self.present.swap_remove(idx);
            self.absent.push(peer.clone());
            ChurnEvent::Leave(peer)
        }
    }

    /// Apply `count` events to the swarm of `key`, returning them in order
    pub fn drive(&mut self, network: &MemoryNetwork, key: &DiscoveryKey, count: usize) -> Vec<ChurnEvent> {
        let mut events = Vec::with_capacity(count);
        for _ in 0..count {
            let event = self.next_event();
            match &event {
                ChurnEvent::Join(peer) => network.announce(key, peer),
                ChurnEvent::Leave(peer) => network.depart(key, peer),
            };
            events.push(event);
        }
        events
    }

    /// Configured join bias, clamped to `[0, 1]`; non-finite values fall back to the default
    fn join_probability(&self) -> f64 {
        let bias = self.config.join_bias;
        if bias.is_finite() {
            bias.clamp(0.0, 1.0)
        } else {
            ChurnConfig::default().join_bias
        }
    }

    pub fn present(&self) -> &[PeerId] {
        &self.present
    }
}

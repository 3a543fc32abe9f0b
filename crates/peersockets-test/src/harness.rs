//! Multi-node swarm harness
//!
//! Every [`TestNode`] runs its own [`PeerSockets`] service with its own
//! session registry, while all nodes share one in-memory network and one
//! drive table.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use peersockets_core::{DiscoveryKey, PeerId, PeerSocketsResult};
use peersockets_runtime::{
    CallerContext, PeerSockets, PeerSocketsConfig, PresenceStream, SessionInfo, SessionRegistry,
    TopicStream,
};
use peersockets_transport::{Drive, MemoryDriveResolver, MemoryNetwork};

/// Default wait for [`within`]
pub const DEFAULT_WAIT: Duration = Duration::from_millis(250);

/// Shared network and drive table for a set of test nodes
pub struct SwarmHarness {
    network: MemoryNetwork,
    resolver: Arc<MemoryDriveResolver>,
    config: PeerSocketsConfig,
}

impl Default for SwarmHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl SwarmHarness {
    pub fn new() -> Self {
        Self::with_config(PeerSocketsConfig::default())
    }

    /// Nodes spawned from this harness use `config`
    pub fn with_config(config: PeerSocketsConfig) -> Self {
        SwarmHarness {
            network: MemoryNetwork::new(),
            resolver: Arc::new(MemoryDriveResolver::new()),
            config,
        }
    }

    /// Publish a drive reachable as `hyper://<host>/`
    pub fn add_drive(&self, host: &str, key: impl Into<DiscoveryKey>) -> Drive {
        self.resolver.insert(host, key)
    }

    /// Start a node acting as `peer` on the shared network
    pub fn spawn_node(&self, peer: impl Into<PeerId>) -> TestNode {
        let peer = peer.into();
        let client = self.network.client(peer.clone());
        let service = PeerSockets::new(
            Arc::clone(&self.resolver),
            Arc::new(client),
            Arc::new(SessionRegistry::new()),
            self.config.clone(),
        );
        TestNode {
            peer,
            service,
            network: self.network.clone(),
        }
    }

    pub fn network(&self) -> &MemoryNetwork {
        &self.network
    }

    pub fn resolver(&self) -> &Arc<MemoryDriveResolver> {
        &self.resolver
    }
}

/// One participant of the swarm
pub struct TestNode {
    peer: PeerId,
    service: PeerSockets<Arc<MemoryDriveResolver>>,
    network: MemoryNetwork,
}

impl TestNode {
    pub fn peer(&self) -> &PeerId {
        &self.peer
    }

    pub fn service(&self) -> &PeerSockets<Arc<MemoryDriveResolver>> {
        &self.service
    }

    /// Caller context of an application loaded from drive `host`
    pub fn caller(&self, host: &str) -> CallerContext {
        CallerContext::new(format!("hyper://{}/index.html", host))
    }

    pub async fn join(&self, host: &str, topic: &str) -> PeerSocketsResult<TopicStream> {
        self.service.join(&self.caller(host), topic).await
    }

    pub async fn watch(&self, host: &str) -> PeerSocketsResult<PresenceStream> {
        self.service.watch(&self.caller(host)).await
    }

    pub fn info(&self, host: &str) -> SessionInfo {
        self.service.info(&self.caller(host))
    }

    /// Enter the swarm of `drive`
    pub fn announce(&self, drive: &Drive) -> bool {
        self.network.announce(&drive.discovery_key, &self.peer)
    }

    /// Leave the swarm of `drive`
    pub fn depart(&self, drive: &Drive) -> bool {
        self.network.depart(&drive.discovery_key, &self.peer)
    }
}

/// Await `fut` for at most `wait`; `None` on timeout
pub async fn within<F, T>(wait: Duration, fut: F) -> Option<T>
where
    F: Future<Output = Option<T>>,
{
    tokio::time::timeout(wait, fut).await.ok().flatten()
}

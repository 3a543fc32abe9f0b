//! PeerSockets service - the API exposed to application code

use std::sync::Arc;

use tracing::debug;

use peersockets_core::{namespace, Origin, PeerSocketsError, PeerSocketsResult};
use peersockets_transport::{Drive, DriveResolver, NetworkClient};

use crate::messaging::open_topic;
use crate::presence::open_presence;
use crate::{PeerSocketsConfig, PresenceStream, SessionInfo, SessionRegistry, TopicStream};

/// The calling application, identified by the URL it was loaded from
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerContext {
    origin: Origin,
}

impl CallerContext {
    pub fn new(url: impl Into<String>) -> Self {
        CallerContext {
            origin: Origin::new(url),
        }
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }
}

impl From<Origin> for CallerContext {
    fn from(origin: Origin) -> Self {
        CallerContext { origin }
    }
}

/// Topic messaging and presence for sandboxed applications.
///
/// Every topic an application names is scoped by the discovery key of the
/// drive its own origin resolves to, so it can only ever reach topics of
/// drives it is authorized to read.
pub struct PeerSockets<R> {
    resolver: R,
    network: Arc<dyn NetworkClient>,
    registry: Arc<SessionRegistry>,
    config: PeerSocketsConfig,
}

impl<R: DriveResolver> PeerSockets<R> {
    pub fn new(
        resolver: R,
        network: Arc<dyn NetworkClient>,
        registry: Arc<SessionRegistry>,
        config: PeerSocketsConfig,
    ) -> Self {
        PeerSockets {
            resolver,
            network,
            registry,
            config,
        }
    }

    /// Join `topic` on the caller's drive.
    ///
    /// Fails with a permission error, before anything is resolved or
    /// subscribed, unless the caller's origin is network-addressable.
    pub async fn join(&self, caller: &CallerContext, topic: &str) -> PeerSocketsResult<TopicStream> {
        let origin = caller.origin();
        if !origin.has_scheme(&self.config.network_scheme) {
            debug!(%origin, "peersockets join refused");
            return Err(PeerSocketsError::Permission(format!(
                "PeerSockets are only available on {} origins",
                self.config.network_scheme
            )));
        }

        let drive = self.sender_drive(origin).await?;
        let topic = namespace(topic, &drive.discovery_key);
        open_topic(
            self.network.as_ref(),
            &self.registry,
            origin.clone(),
            topic,
            self.config.queue_policy,
        )
    }

    /// Watch peers joining and leaving the caller's drive swarm
    pub async fn watch(&self, caller: &CallerContext) -> PeerSocketsResult<PresenceStream> {
        let origin = caller.origin();
        let drive = self.sender_drive(origin).await?;
        open_presence(
            self.network.as_ref(),
            &self.registry,
            origin.clone(),
            drive.discovery_key,
            self.config.queue_policy,
        )
    }

    /// Channels the caller currently has open
    pub fn info(&self, caller: &CallerContext) -> SessionInfo {
        self.registry.info(caller.origin())
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &PeerSocketsConfig {
        &self.config
    }

    async fn sender_drive(&self, origin: &Origin) -> PeerSocketsResult<Drive> {
        let drive = self.resolver.get_or_load_drive(origin.as_str()).await?;
        Ok(drive)
    }
}

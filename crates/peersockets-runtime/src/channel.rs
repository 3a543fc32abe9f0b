//! Channel lifecycle
//!
//! A channel couples one network subscription with the relay queue feeding
//! its stream. It is owned by the stream halves through an `Arc`; the session
//! registry only ever holds a `Weak`. The subscription is released exactly
//! once, by whichever teardown path runs first.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tracing::{debug, warn};

use peersockets_core::{Origin, TransportError};
use peersockets_transport::{PresenceWatch, TopicHandle};

use crate::{ChannelId, ChannelKind, RelayQueue, SessionRegistry};

/// A network subscription that can be released
pub(crate) trait Subscription: Send + Sync {
    fn release(&self) -> Result<(), TransportError>;
}

impl Subscription for Box<dyn TopicHandle> {
    fn release(&self) -> Result<(), TransportError> {
        self.close()
    }
}

impl Subscription for Box<dyn PresenceWatch> {
    fn release(&self) -> Result<(), TransportError> {
        self.stop()
    }
}

/// Anything the registry can tear down
pub trait Closeable: Send + Sync {
    /// Close; returns true only for the call that actually closed
    fn close(&self) -> bool;
}

pub(crate) struct ChannelCore<T, S: Subscription> {
    pub(crate) id: ChannelId,
    pub(crate) origin: Origin,
    pub(crate) kind: ChannelKind,
    pub(crate) scope: String,
    pub(crate) queue: Arc<RelayQueue<T>>,
    pub(crate) subscription: S,
    closed: AtomicBool,
    registry: Arc<SessionRegistry>,
}

impl<T, S> ChannelCore<T, S>
where
    T: Send + 'static,
    S: Subscription + 'static,
{
    /// Wrap an opened subscription and bind it to `origin` in the registry
    pub(crate) fn open(
        registry: &Arc<SessionRegistry>,
        origin: Origin,
        kind: ChannelKind,
        scope: String,
        queue: Arc<RelayQueue<T>>,
        subscription: S,
    ) -> Arc<Self> {
        let core = Arc::new(ChannelCore {
            id: registry.next_channel_id(),
            origin,
            kind,
            scope,
            queue,
            subscription,
            closed: AtomicBool::new(false),
            registry: Arc::clone(registry),
        });
        let weak: Weak<Self> = Arc::downgrade(&core);
        registry.register(&core.origin, core.id, core.kind, core.scope.clone(), weak);
        core
    }
}

impl<T, S: Subscription> ChannelCore<T, S> {
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn shut(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        match self.kind {
            ChannelKind::Topic => debug!(channel = %self.id, topic = %self.scope, "Closing topic"),
            ChannelKind::Presence => debug!(channel = %self.id, key = %self.scope, "Unwatching peers"),
        }

        self.queue.close();
        if let Err(e) = self.subscription.release() {
            warn!(channel = %self.id, scope = %self.scope, error = %e, "subscription release failed");
        }
        self.registry.deregister(&self.origin, self.id);
        true
    }
}

impl<T, S> Closeable for ChannelCore<T, S>
where
    T: Send + 'static,
    S: Subscription + 'static,
{
    fn close(&self) -> bool {
        self.shut()
    }
}

impl<T, S: Subscription> Drop for ChannelCore<T, S> {
    fn drop(&mut self) {
        self.shut();
    }
}

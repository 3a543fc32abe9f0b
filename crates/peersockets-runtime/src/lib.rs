//! PeerSockets Runtime - topic messaging and presence relay
//!
//! This crate implements the two channels exposed to application code:
//! 1. `join(topic)` - duplex relay between the app and a drive-scoped topic
//! 2. `watch()` - one-way relay of the drive swarm's join/leave events
//!
//! Each call resolves the caller's drive, opens exactly one network
//! subscription, and binds it to a stream. Closing or dropping the stream
//! releases the subscription once.

pub mod channel;
pub mod config;
pub mod messaging;
pub mod presence;
pub mod registry;
pub mod relay;
pub mod service;
pub mod telemetry;

pub use channel::Closeable;
pub use config::*;
pub use messaging::{TopicReceiver, TopicSender, TopicStream};
pub use presence::PresenceStream;
pub use registry::*;
pub use relay::*;
pub use service::*;
pub use telemetry::init_tracing;

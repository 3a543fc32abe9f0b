//! PeerSockets Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout PeerSockets:
//! - Identifiers (DiscoveryKey, PeerId, Origin)
//! - Topic namespacing (drive-scoped topic names)
//! - Relay envelopes and outbound record validation
//! - Error types

pub mod id;
pub mod topic;
pub mod envelope;
pub mod error;

pub use id::*;
pub use topic::*;
pub use envelope::*;
pub use error::*;

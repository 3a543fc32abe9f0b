//! Error types for PeerSockets

use thiserror::Error;

use crate::PeerId;

/// Core PeerSockets errors, surfaced to the calling application
#[derive(Error, Debug)]
pub enum PeerSocketsError {
    #[error("Permission denied: {0}")]
    Permission(String),

    #[error(transparent)]
    Resolution(#[from] ResolveError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Drive resolution failures, propagated as-is from the resolver
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Unsupported origin scheme: {0}")]
    UnsupportedScheme(String),

    #[error("Drive not found: {0}")]
    NotFound(String),

    #[error("Drive not loaded: {0}")]
    NotLoaded(String),
}

/// Network client failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Peer not connected: {0}")]
    PeerNotConnected(PeerId),

    #[error("Topic closed: {0}")]
    TopicClosed(String),

    #[error("Presence watch already stopped")]
    AlreadyStopped,

    #[error("Transport I/O error: {0}")]
    Io(String),
}

/// Malformed outbound record (non-fatal, the record is dropped)
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordError {
    #[error("Outbound record is not an array")]
    NotAnArray,

    #[error("Outbound record has {0} elements, expected 2")]
    WrongArity(usize),

    #[error("Outbound record peer id must be a non-empty string")]
    InvalidPeerId,

    #[error("Outbound record has no message")]
    MissingMessage,
}

/// Result type for PeerSockets operations
pub type PeerSocketsResult<T> = Result<T, PeerSocketsError>;

impl PeerSocketsError {
    /// Whether the failure happened at the permission gate
    pub fn is_permission(&self) -> bool {
        matches!(self, PeerSocketsError::Permission(_))
    }
}

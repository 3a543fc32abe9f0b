//! Relay envelopes
//!
//! Inbound envelopes travel from the swarm to the application; outbound
//! records travel from the application to a single peer. JSON shapes:
//!
//! ```text
//! topic    → app : {"type":"message","peerId":P,"message":M}
//! presence → app : {"type":"join"|"leave","peerId":P}
//! app → topic    : [P, M]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{PeerId, RecordError};

/// Envelope delivered on a topic stream
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageEnvelope {
    /// A message a peer published on the topic
    Message {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
        message: Value,
    },
}

impl MessageEnvelope {
    pub fn message(peer_id: PeerId, message: Value) -> Self {
        MessageEnvelope::Message { peer_id, message }
    }

    pub fn peer_id(&self) -> &PeerId {
        match self {
            MessageEnvelope::Message { peer_id, .. } => peer_id,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            MessageEnvelope::Message { message, .. } => message,
        }
    }
}

/// Envelope delivered on a presence stream
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PresenceEnvelope {
    /// Peer joined the drive's swarm
    Join {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
    /// Peer left the drive's swarm
    Leave {
        #[serde(rename = "peerId")]
        peer_id: PeerId,
    },
}

impl PresenceEnvelope {
    pub fn peer_id(&self) -> &PeerId {
        match self {
            PresenceEnvelope::Join { peer_id } | PresenceEnvelope::Leave { peer_id } => peer_id,
        }
    }

    pub fn is_join(&self) -> bool {
        matches!(self, PresenceEnvelope::Join { .. })
    }
}

/// A validated `[peerId, message]` record written by the application
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundRecord {
    pub peer_id: PeerId,
    pub message: Value,
}

impl OutboundRecord {
    pub fn new(peer_id: PeerId, message: Value) -> Self {
        OutboundRecord { peer_id, message }
    }

    /// Validate a raw application write.
    ///
    /// The record must be a two element array whose first element is a
    /// non-empty peer id string and whose second element is present (not null).
    pub fn from_value(value: Value) -> Result<Self, RecordError> {
        let Value::Array(items) = value else {
            return Err(RecordError::NotAnArray);
        };
        if items.len() != 2 {
            return Err(RecordError::WrongArity(items.len()));
        }
        let mut items = items.into_iter();
        let (Some(peer), Some(message)) = (items.next(), items.next()) else {
            return Err(RecordError::WrongArity(0));
        };
        let peer_id = match peer {
            Value::String(id) if !id.is_empty() => PeerId::from(id),
            _ => return Err(RecordError::InvalidPeerId),
        };
        if message.is_null() {
            return Err(RecordError::MissingMessage);
        }
        Ok(OutboundRecord { peer_id, message })
    }
}

impl TryFrom<Value> for OutboundRecord {
    type Error = RecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        OutboundRecord::from_value(value)
    }
}

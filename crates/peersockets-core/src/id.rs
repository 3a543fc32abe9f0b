//! Identity types for PeerSockets
//!
//! Drives are addressed on the network by an opaque discovery key; remote
//! participants by a peer id; calling applications by their origin URL.

use std::fmt;
use std::fmt::Write as _;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// URL scheme an origin must carry to be network-addressable
pub const NETWORK_SCHEME: &str = "hyper://";

/// Discovery key - identifies the swarm replicating a drive
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct DiscoveryKey(Bytes);

impl DiscoveryKey {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        DiscoveryKey(bytes.into())
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lowercase hex rendering, two digits per byte
    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(self.0.len() * 2);
        for byte in self.0.iter() {
            // Writing into a String cannot fail
            let _ = write!(out, "{:02x}", byte);
        }
        out
    }

    /// Parse a hex rendering produced by [`DiscoveryKey::to_hex`].
    ///
    /// Accepts upper or lower case; rejects odd lengths and non-hex digits.
    pub fn from_hex(hex: &str) -> Option<Self> {
        if hex.len() % 2 != 0 {
            return None;
        }
        let digits = hex.as_bytes();
        let mut bytes = Vec::with_capacity(digits.len() / 2);
        for pair in digits.chunks(2) {
            let hi = hex_value(pair[0])?;
            let lo = hex_value(pair[1])?;
            bytes.push((hi << 4) | lo);
        }
        Some(DiscoveryKey(Bytes::from(bytes)))
    }
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

impl From<Vec<u8>> for DiscoveryKey {
    fn from(bytes: Vec<u8>) -> Self {
        DiscoveryKey(Bytes::from(bytes))
    }
}

impl From<&[u8]> for DiscoveryKey {
    fn from(bytes: &[u8]) -> Self {
        DiscoveryKey(Bytes::copy_from_slice(bytes))
    }
}

impl<const N: usize> From<[u8; N]> for DiscoveryKey {
    fn from(bytes: [u8; N]) -> Self {
        DiscoveryKey(Bytes::copy_from_slice(&bytes))
    }
}

impl fmt::Debug for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiscoveryKey({})", self.to_hex())
    }
}

impl fmt::Display for DiscoveryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Peer identity - a remote participant in a drive's swarm
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    pub fn new(id: impl Into<String>) -> Self {
        PeerId(id.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PeerId {
    fn from(id: &str) -> Self {
        PeerId(id.to_string())
    }
}

impl From<String> for PeerId {
    fn from(id: String) -> Self {
        PeerId(id)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Origin of a calling application (the URL it was loaded from)
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Origin(String);

impl Origin {
    pub fn new(url: impl Into<String>) -> Self {
        Origin(url.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this origin lives under the given scheme prefix (e.g. `hyper://`)
    #[inline]
    pub fn has_scheme(&self, scheme: &str) -> bool {
        self.0.starts_with(scheme)
    }

    /// Whether this origin is reachable on the peer network
    #[inline]
    pub fn is_network_addressable(&self) -> bool {
        self.has_scheme(NETWORK_SCHEME)
    }
}

impl From<&str> for Origin {
    fn from(url: &str) -> Self {
        Origin(url.to_string())
    }
}

impl fmt::Debug for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Origin({})", self.0)
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

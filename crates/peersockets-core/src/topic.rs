//! Topic namespacing
//!
//! Application topics are scoped per drive before they reach the network:
//!
//! ```text
//! webapp/<hex(discovery key)>/<topic>
//! ```
//!
//! Hex digits never contain `/`, so the separator after the key segment is
//! unambiguous and the mapping is injective over `(key, topic)`. Identical
//! inputs always yield the identical string, which is what lets independent
//! joiners rendezvous on the same channel.

use std::fmt;

use crate::DiscoveryKey;

/// Leading segment shared by every application topic
pub const TOPIC_NAMESPACE: &str = "webapp";

/// A topic name scoped to one drive's swarm
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespacedTopic(String);

impl NamespacedTopic {
    /// Scope `topic` under the drive identified by `key`
    pub fn new(topic: &str, key: &DiscoveryKey) -> Self {
        let hex = key.to_hex();
        let mut name = String::with_capacity(TOPIC_NAMESPACE.len() + hex.len() + topic.len() + 2);
        name.push_str(TOPIC_NAMESPACE);
        name.push('/');
        name.push_str(&hex);
        name.push('/');
        name.push_str(topic);
        NamespacedTopic(name)
    }

    /// Recover `(key, topic)` from a namespaced topic string
    pub fn parse(name: &str) -> Option<(DiscoveryKey, String)> {
        let rest = name.strip_prefix(TOPIC_NAMESPACE)?.strip_prefix('/')?;
        let (hex, topic) = rest.split_once('/')?;
        if hex.bytes().any(|b| b.is_ascii_uppercase()) {
            return None;
        }
        let key = DiscoveryKey::from_hex(hex)?;
        Some((key, topic.to_string()))
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Application-visible part of the name
    pub fn topic(&self) -> &str {
        let rest = &self.0[TOPIC_NAMESPACE.len() + 1..];
        match rest.split_once('/') {
            Some((_, topic)) => topic,
            None => "",
        }
    }
}

/// Map an application topic to its drive-scoped network name
#[inline]
pub fn namespace(topic: &str, key: &DiscoveryKey) -> NamespacedTopic {
    NamespacedTopic::new(topic, key)
}

impl fmt::Debug for NamespacedTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Topic({})", self.0)
    }
}

impl fmt::Display for NamespacedTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for NamespacedTopic {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

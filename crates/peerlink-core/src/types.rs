//! Core types for PeerLink
//!
//! Newtype identifiers and the immutable identity of a participant.

use core::fmt;
use core::hash::{Hash, Hasher};
use core::ops::Deref;
use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::errors::PeerLinkError;

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Unique identifier for a peer (8 bytes, rendered as 16 hex characters)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId([u8; 8]);

impl PeerId {
    /// Create a new PeerId from 8 bytes
    pub fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Create PeerId from the first 8 bytes of a longer identifier
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut id = [0u8; 8];
        let len = core::cmp::min(bytes.len(), 8);
        id[..len].copy_from_slice(&bytes[..len]);
        Self(id)
    }

    /// Generate a fresh random identifier
    pub fn random() -> Self {
        Self::from_bytes(uuid::Uuid::new_v4().as_bytes())
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for PeerId {
    type Err = PeerLinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let clean_str = s.strip_prefix("0x").unwrap_or(s);

        let bytes = hex::decode(clean_str)
            .map_err(|_| PeerLinkError::config("peer id must be hex encoded"))?;

        if bytes.len() != 8 {
            return Err(PeerLinkError::config(format!(
                "peer id must be exactly 8 bytes, got {}",
                bytes.len()
            )));
        }

        Ok(Self::from_bytes(&bytes))
    }
}

impl Deref for PeerId {
    type Target = [u8; 8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ----------------------------------------------------------------------------
// Peer Identity
// ----------------------------------------------------------------------------

/// Stable identifier plus human-readable name for a participant.
///
/// Equality and hashing only consider [`PeerId`]: two participants may share a
/// display name, and a renamed participant is still the same peer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerIdentity {
    id: PeerId,
    display_name: String,
}

impl PeerIdentity {
    pub fn new(id: PeerId, display_name: impl Into<String>) -> Self {
        Self {
            id,
            display_name: display_name.into(),
        }
    }

    pub fn id(&self) -> PeerId {
        self.id
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

impl PartialEq for PeerIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerIdentity {}

impl Hash for PeerIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.id)
    }
}

// ----------------------------------------------------------------------------
// Session Handles
// ----------------------------------------------------------------------------

/// Opaque token for the logical session this process holds with one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle(uuid::Uuid);

impl SessionHandle {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transport-issued token identifying a single inbound invitation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvitationContext {
    pub invitation_id: u64,
    /// Optional opaque bytes the inviter attached
    pub context: Option<Vec<u8>>,
}

impl InvitationContext {
    pub fn new(invitation_id: u64) -> Self {
        Self {
            invitation_id,
            context: None,
        }
    }

    pub fn with_context(mut self, context: Vec<u8>) -> Self {
        self.context = Some(context);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_peer_id_hex_roundtrip() {
        let id = PeerId::new([0xde, 0xad, 0xbe, 0xef, 0, 1, 2, 3]);
        assert_eq!(id.to_string(), "deadbeef00010203");
        assert_eq!("0xdeadbeef00010203".parse::<PeerId>().unwrap(), id);
    }

    #[test]
    fn test_peer_id_rejects_wrong_length() {
        assert!("deadbeef".parse::<PeerId>().is_err());
        assert!("not hex at all!!".parse::<PeerId>().is_err());
    }

    #[test]
    fn test_identity_equality_ignores_display_name() {
        let id = PeerId::new([7; 8]);
        let a = PeerIdentity::new(id, "Alice's phone");
        let b = PeerIdentity::new(id, "renamed");
        let c = PeerIdentity::new(PeerId::new([8; 8]), "Alice's phone");

        assert_eq!(a, b);
        assert_ne!(a, c);

        let set: HashSet<_> = [a, b, c].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_random_peer_ids_differ() {
        assert_ne!(PeerId::random(), PeerId::random());
    }
}

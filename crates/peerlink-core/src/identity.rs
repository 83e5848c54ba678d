//! Local identity providers
//!
//! The node needs one stable [`PeerIdentity`] for its lifetime. Where that
//! identity comes from (generated, configured, restored from storage) is up to
//! the host.

use crate::types::{PeerId, PeerIdentity};

/// Supplies the local participant's identity
pub trait IdentityProvider: Send + Sync {
    fn local_identity(&self) -> PeerIdentity;
}

/// Identity generated once at construction and kept for the provider's lifetime
#[derive(Debug, Clone)]
pub struct EphemeralIdentity {
    identity: PeerIdentity,
}

impl EphemeralIdentity {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            identity: PeerIdentity::new(PeerId::random(), display_name),
        }
    }
}

impl IdentityProvider for EphemeralIdentity {
    fn local_identity(&self) -> PeerIdentity {
        self.identity.clone()
    }
}

/// Fixed identity, e.g. restored by the host or taken from configuration
#[derive(Debug, Clone)]
pub struct StaticIdentity(PeerIdentity);

impl StaticIdentity {
    pub fn new(identity: PeerIdentity) -> Self {
        Self(identity)
    }
}

impl IdentityProvider for StaticIdentity {
    fn local_identity(&self) -> PeerIdentity {
        self.0.clone()
    }
}

//! Transport abstraction
//!
//! The local-network link layer (advertising, browsing, invitations, byte
//! delivery) lives outside this crate. Implementations expose it through
//! [`Transport`] and report what happens on the network as [`TransportEvent`]s.

use core::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::device::ConnectionState;
use crate::errors::TransportError;
use crate::types::{InvitationContext, PeerIdentity, SessionHandle};

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Capability interface the session layer drives
#[async_trait]
pub trait Transport: Send + Sync {
    /// Start announcing `local` to browsers of `service_type`
    async fn advertise(&self, local: &PeerIdentity, service_type: &str)
        -> Result<(), TransportError>;

    /// Stop announcing the local peer
    async fn stop_advertising(&self) -> Result<(), TransportError>;

    /// Start looking, as `local`, for peers advertising `service_type`
    async fn browse(&self, local: &PeerIdentity, service_type: &str) -> Result<(), TransportError>;

    /// Stop looking for other peers
    async fn stop_browsing(&self) -> Result<(), TransportError>;

    /// Invite `peer` into `session`. Resolves once the invitation has been
    /// delivered; the outcome arrives later as `SessionStateChanged`.
    async fn invite(
        &self,
        peer: &PeerIdentity,
        session: SessionHandle,
        timeout: Duration,
    ) -> Result<(), TransportError>;

    /// Accept an inbound invitation into `session`
    async fn accept(
        &self,
        invitation: InvitationContext,
        session: SessionHandle,
    ) -> Result<(), TransportError>;

    /// Decline an inbound invitation
    async fn decline(&self, _invitation: InvitationContext) -> Result<(), TransportError> {
        Ok(())
    }

    /// Deliver `payload` to `peer` in reliable mode
    async fn send_reliable(&self, payload: &[u8], peer: &PeerIdentity)
        -> Result<(), TransportError>;

    /// Tear down `session` with `peer`
    async fn disconnect(
        &self,
        peer: &PeerIdentity,
        session: SessionHandle,
    ) -> Result<(), TransportError>;

    /// Hand over the stream of network events. Returns `None` once taken.
    fn take_event_receiver(&self) -> Option<TransportEventReceiver>;
}

// ----------------------------------------------------------------------------
// Transport Events
// ----------------------------------------------------------------------------

/// Link state as reported by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkState {
    NotConnected,
    Connecting,
    /// Handshake or encryption negotiation in progress
    Negotiating,
    Connected,
    Failed { reason: String },
}

impl LinkState {
    /// Collapse the transport's view onto the three-state session model
    pub fn to_connection_state(&self) -> ConnectionState {
        match self {
            LinkState::Connected => ConnectionState::Connected,
            LinkState::Connecting | LinkState::Negotiating => ConnectionState::Connecting,
            LinkState::NotConnected | LinkState::Failed { .. } => ConnectionState::NotConnected,
        }
    }
}

/// Things the transport observed on the network
#[derive(Debug, Clone)]
pub enum TransportEvent {
    PeerFound(PeerIdentity),
    PeerLost(PeerIdentity),
    InvitationReceived {
        from: PeerIdentity,
        invitation: InvitationContext,
    },
    SessionStateChanged {
        peer: PeerIdentity,
        state: LinkState,
    },
    DataReceived {
        from: PeerIdentity,
        payload: Vec<u8>,
    },
}

impl TransportEvent {
    /// The peer this event concerns
    pub fn peer(&self) -> &PeerIdentity {
        match self {
            TransportEvent::PeerFound(peer) | TransportEvent::PeerLost(peer) => peer,
            TransportEvent::InvitationReceived { from, .. } => from,
            TransportEvent::SessionStateChanged { peer, .. } => peer,
            TransportEvent::DataReceived { from, .. } => from,
        }
    }
}

pub type TransportEventSender = mpsc::UnboundedSender<TransportEvent>;
pub type TransportEventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Create the event channel a transport implementation reports through
pub fn transport_event_channel() -> (TransportEventSender, TransportEventReceiver) {
    mpsc::unbounded_channel()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_state_mapping() {
        assert_eq!(
            LinkState::Connected.to_connection_state(),
            ConnectionState::Connected
        );
        assert_eq!(
            LinkState::Negotiating.to_connection_state(),
            ConnectionState::Connecting
        );
        assert_eq!(
            LinkState::Connecting.to_connection_state(),
            ConnectionState::Connecting
        );
        assert_eq!(
            LinkState::Failed {
                reason: "radio off".into()
            }
            .to_connection_state(),
            ConnectionState::NotConnected
        );
        assert_eq!(
            LinkState::NotConnected.to_connection_state(),
            ConnectionState::NotConnected
        );
    }
}

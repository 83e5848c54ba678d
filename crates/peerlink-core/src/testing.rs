//! Test doubles
//!
//! [`RecordingTransport`] records every call the session layer makes and lets
//! tests script failures and inject network events.

use core::time::Duration;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::transport::{
    transport_event_channel, Transport, TransportEvent, TransportEventReceiver,
    TransportEventSender,
};
use crate::types::{InvitationContext, PeerId, PeerIdentity, SessionHandle};

/// A call made against the transport
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Advertise {
        local: PeerId,
        service_type: String,
    },
    StopAdvertising,
    Browse {
        local: PeerId,
        service_type: String,
    },
    StopBrowsing,
    Invite {
        peer: PeerId,
        session: SessionHandle,
        timeout: Duration,
    },
    Accept {
        invitation: InvitationContext,
        session: SessionHandle,
    },
    Decline {
        invitation: InvitationContext,
    },
    SendReliable {
        peer: PeerId,
        payload: Vec<u8>,
    },
    Disconnect {
        peer: PeerId,
        session: SessionHandle,
    },
}

/// How `send_reliable` should fail, if at all
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendFailure {
    LinkLost,
    BufferFull,
}

#[derive(Debug, Default)]
struct Script {
    reject_invites: bool,
    fail_accepts: bool,
    send_failure: Option<SendFailure>,
}

pub struct RecordingTransport {
    calls: Mutex<Vec<TransportCall>>,
    script: Mutex<Script>,
    events_tx: TransportEventSender,
    events_rx: Mutex<Option<TransportEventReceiver>>,
}

impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

fn guard<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl RecordingTransport {
    pub fn new() -> Self {
        let (events_tx, events_rx) = transport_event_channel();
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(Script::default()),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    /// Make every subsequent `invite` fail with `InvitationRejected`
    pub fn reject_invites(&self, reject: bool) {
        guard(&self.script).reject_invites = reject;
    }

    /// Make every subsequent `accept` fail
    pub fn fail_accepts(&self, fail: bool) {
        guard(&self.script).fail_accepts = fail;
    }

    /// Make `send_reliable` fail in the given way (`None` restores success)
    pub fn fail_sends(&self, failure: Option<SendFailure>) {
        guard(&self.script).send_failure = failure;
    }

    /// Push an event as if it came from the network
    pub fn emit(&self, event: TransportEvent) {
        let _ = self.events_tx.send(event);
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        guard(&self.calls).clone()
    }

    pub fn invites(&self) -> Vec<PeerId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Invite { peer, .. } => Some(peer),
                _ => None,
            })
            .collect()
    }

    pub fn sends(&self) -> Vec<(PeerId, Vec<u8>)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::SendReliable { peer, payload } => Some((peer, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn disconnects(&self) -> Vec<PeerId> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Disconnect { peer, .. } => Some(peer),
                _ => None,
            })
            .collect()
    }

    pub fn accepts(&self) -> Vec<InvitationContext> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                TransportCall::Accept { invitation, .. } => Some(invitation),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: TransportCall) {
        guard(&self.calls).push(call);
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn advertise(
        &self,
        local: &PeerIdentity,
        service_type: &str,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Advertise {
            local: local.id(),
            service_type: service_type.to_string(),
        });
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        self.record(TransportCall::StopAdvertising);
        Ok(())
    }

    async fn browse(&self, local: &PeerIdentity, service_type: &str) -> Result<(), TransportError> {
        self.record(TransportCall::Browse {
            local: local.id(),
            service_type: service_type.to_string(),
        });
        Ok(())
    }

    async fn stop_browsing(&self) -> Result<(), TransportError> {
        self.record(TransportCall::StopBrowsing);
        Ok(())
    }

    async fn invite(
        &self,
        peer: &PeerIdentity,
        session: SessionHandle,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Invite {
            peer: peer.id(),
            session,
            timeout,
        });
        if guard(&self.script).reject_invites {
            return Err(TransportError::InvitationRejected { peer_id: peer.id() });
        }
        Ok(())
    }

    async fn accept(
        &self,
        invitation: InvitationContext,
        session: SessionHandle,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Accept {
            invitation,
            session,
        });
        if guard(&self.script).fail_accepts {
            return Err(TransportError::Unavailable {
                reason: "scripted accept failure".into(),
            });
        }
        Ok(())
    }

    async fn decline(&self, invitation: InvitationContext) -> Result<(), TransportError> {
        self.record(TransportCall::Decline { invitation });
        Ok(())
    }

    async fn send_reliable(
        &self,
        payload: &[u8],
        peer: &PeerIdentity,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::SendReliable {
            peer: peer.id(),
            payload: payload.to_vec(),
        });
        let failure = guard(&self.script).send_failure;
        match failure {
            None => Ok(()),
            Some(SendFailure::LinkLost) => Err(TransportError::LinkLost { peer_id: peer.id() }),
            Some(SendFailure::BufferFull) => Err(TransportError::SendFailed {
                peer_id: peer.id(),
                reason: "send buffer full".into(),
            }),
        }
    }

    async fn disconnect(
        &self,
        peer: &PeerIdentity,
        session: SessionHandle,
    ) -> Result<(), TransportError> {
        self.record(TransportCall::Disconnect {
            peer: peer.id(),
            session,
        });
        Ok(())
    }

    fn take_event_receiver(&self) -> Option<TransportEventReceiver> {
        guard(&self.events_rx).take()
    }
}

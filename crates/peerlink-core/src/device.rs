//! Per-peer device records and connection state

use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use crate::codec::Message;
use crate::session::InvitationSlot;
use crate::types::{PeerId, PeerIdentity, SessionHandle};

// ----------------------------------------------------------------------------
// Connection State
// ----------------------------------------------------------------------------

/// Connection state of a remote peer as seen by this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    NotConnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::NotConnected => "not-connected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        }
    }
}

impl core::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.pad(self.as_str())
    }
}

// ----------------------------------------------------------------------------
// Device
// ----------------------------------------------------------------------------

/// Mutable part of a device, guarded by the device lock
#[derive(Debug, Default)]
pub(crate) struct DeviceState {
    pub(crate) connection_state: ConnectionState,
    pub(crate) last_message: Option<Message>,
    /// Session object shared with the transport; created lazily, dropped on disconnect
    pub(crate) session: Option<SessionHandle>,
    /// Number of the most recent connection attempt; stale timers compare against it
    pub(crate) attempt: u64,
    /// Held while an outbound invitation counts against the pending cap
    pub(crate) invitation_slot: Option<InvitationSlot>,
}

impl DeviceState {
    /// Move to `state`, returning the previous state. Leaving `Connecting`
    /// releases any invitation slot.
    pub(crate) fn set_connection_state(&mut self, state: ConnectionState) -> ConnectionState {
        if state != ConnectionState::Connecting {
            self.invitation_slot = None;
        }
        core::mem::replace(&mut self.connection_state, state)
    }

    /// Start a new connection attempt and return its number
    pub(crate) fn begin_attempt(&mut self) -> u64 {
        self.set_connection_state(ConnectionState::Connecting);
        self.attempt += 1;
        self.attempt
    }

    /// Return the current session, creating one if none exists
    pub(crate) fn ensure_session(&mut self) -> SessionHandle {
        *self.session.get_or_insert_with(SessionHandle::new)
    }
}

/// One remote peer known to this process.
///
/// Instances are owned by the [`DeviceRegistry`](crate::DeviceRegistry) and
/// handed out as `Arc<Device>`; the same identity always resolves to the same
/// instance. Only the session manager mutates a device.
#[derive(Debug)]
pub struct Device {
    identity: PeerIdentity,
    state: Mutex<DeviceState>,
}

impl Device {
    pub(crate) fn new(identity: PeerIdentity) -> Self {
        Self {
            identity,
            state: Mutex::new(DeviceState::default()),
        }
    }

    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn peer_id(&self) -> PeerId {
        self.identity.id()
    }

    pub fn display_name(&self) -> &str {
        self.identity.display_name()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.lock().connection_state
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Most recent message decoded from this peer
    pub fn last_message(&self) -> Option<Message> {
        self.lock().last_message.clone()
    }

    /// Current session handle, if a session is open
    pub fn session(&self) -> Option<SessionHandle> {
        self.lock().session
    }

    /// Take the device lock. A poisoned lock still holds a consistent state
    /// because every critical section only assigns plain fields.
    pub(crate) fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

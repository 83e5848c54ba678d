//! Session management
//!
//! The [`SessionManager`] owns the per-device connection state machine and is
//! the only component that asks the transport to invite, accept or tear down a
//! session.
//!
//! ```text
//!   NotConnected --connect / invitation--> Connecting --link up--> Connected
//!        ^                                     |                       |
//!        +------ timeout / failure ------------+                       |
//!        +------ disconnect / background / link loss ------------------+
//! ```
//!
//! Device state changes happen inside short critical sections on the device
//! lock; notifications for a device are published under the same lock so
//! observers see them in the order they were applied. Transport calls are
//! never made while a lock is held.
//!
//! Operations that start background work (`connect`, `accept_invitation`)
//! spawn onto the current tokio runtime and must be called from within one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::codec::{self, Message};
use crate::config::SessionConfig;
use crate::device::{ConnectionState, Device, DeviceState};
use crate::errors::{PeerLinkError, PeerLinkResult, TransportError};
use crate::notifier::{EventNotifier, EventSubscription, PeerEvent};
use crate::registry::DeviceRegistry;
use crate::stats::{SessionStats, SessionStatsSnapshot};
use crate::transport::{LinkState, Transport};
use crate::types::{InvitationContext, PeerIdentity, SessionHandle};

// ----------------------------------------------------------------------------
// Outcomes
// ----------------------------------------------------------------------------

/// What a call to [`SessionManager::connect`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectOutcome {
    /// A new invitation was issued
    Initiated,
    /// An attempt is already in flight; nothing was sent
    AlreadyConnecting,
    /// The peer is already connected; nothing was sent
    AlreadyConnected,
    /// The pending-invitation cap is reached; retried on the next discovery
    Throttled,
}

/// Counts an outbound invitation against `max_pending_invitations` until dropped
#[derive(Debug)]
pub(crate) struct InvitationSlot {
    pending: Arc<AtomicUsize>,
}

impl Drop for InvitationSlot {
    fn drop(&mut self) {
        self.pending.fetch_sub(1, Ordering::SeqCst);
    }
}

// ----------------------------------------------------------------------------
// Session Manager
// ----------------------------------------------------------------------------

pub struct SessionManager {
    transport: Arc<dyn Transport>,
    registry: Arc<DeviceRegistry>,
    notifier: Arc<EventNotifier>,
    config: SessionConfig,
    stats: SessionStats,
    pending_invitations: Arc<AtomicUsize>,
}

impl SessionManager {
    pub fn new(transport: Arc<dyn Transport>, config: SessionConfig) -> Arc<Self> {
        Self::with_parts(
            transport,
            config,
            Arc::new(DeviceRegistry::new()),
            Arc::new(EventNotifier::new()),
        )
    }

    /// Build a manager around an existing registry and notifier
    pub fn with_parts(
        transport: Arc<dyn Transport>,
        config: SessionConfig,
        registry: Arc<DeviceRegistry>,
        notifier: Arc<EventNotifier>,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            registry,
            notifier,
            config,
            stats: SessionStats::default(),
            pending_invitations: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn notifier(&self) -> &Arc<EventNotifier> {
        &self.notifier
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> EventSubscription {
        self.notifier.subscribe()
    }

    pub fn stats(&self) -> SessionStatsSnapshot {
        self.stats.snapshot()
    }

    /// Outbound invitations currently awaiting an answer
    pub fn pending_invitations(&self) -> usize {
        self.pending_invitations.load(Ordering::SeqCst)
    }

    // ------------------------------------------------------------------------
    // Outbound connection
    // ------------------------------------------------------------------------

    /// Invite `device` unless an attempt is in flight or it is already connected.
    ///
    /// Returns immediately; the outcome is observed through
    /// `DeviceStateChanged`. If the peer does not reach `Connected` within
    /// `connect_timeout` the device falls back to `NotConnected`.
    pub fn connect(self: &Arc<Self>, device: &Arc<Device>) -> ConnectOutcome {
        let (session, attempt) = {
            let mut state = device.lock();
            match state.connection_state {
                ConnectionState::Connected => return ConnectOutcome::AlreadyConnected,
                ConnectionState::Connecting => return ConnectOutcome::AlreadyConnecting,
                ConnectionState::NotConnected => {}
            }

            let Some(slot) = self.reserve_invitation_slot() else {
                debug!(
                    "Invitation cap reached, deferring connection to {}",
                    device.identity()
                );
                return ConnectOutcome::Throttled;
            };

            let attempt = state.begin_attempt();
            state.invitation_slot = Some(slot);
            (state.ensure_session(), attempt)
        };

        self.stats.record_invitation_sent();
        info!(
            "Inviting {} into session {} (attempt {})",
            device.identity(),
            session,
            attempt
        );

        let manager = self.clone();
        let device = device.clone();
        tokio::spawn(async move {
            manager.run_invitation(device, session, attempt).await;
        });

        ConnectOutcome::Initiated
    }

    async fn run_invitation(self: Arc<Self>, device: Arc<Device>, session: SessionHandle, attempt: u64) {
        let timeout = self.config.connect_timeout;
        let deadline = Instant::now() + timeout;

        let invite = self.transport.invite(device.identity(), session, timeout);
        match time::timeout_at(deadline, invite).await {
            Ok(Ok(())) => {
                debug!("Invitation delivered to {}", device.identity());
                time::sleep_until(deadline).await;
            }
            Ok(Err(err)) => {
                self.fail_attempt(&device, attempt, &err);
                return;
            }
            Err(_) => {}
        }

        self.expire_attempt(&device, attempt);
    }

    fn reserve_invitation_slot(&self) -> Option<InvitationSlot> {
        let limit = self.config.max_pending_invitations;
        self.pending_invitations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| match limit {
                Some(max) if pending >= max => None,
                _ => Some(pending + 1),
            })
            .ok()
            .map(|_| InvitationSlot {
                pending: self.pending_invitations.clone(),
            })
    }

    /// Attempt `attempt` got no `Connected` report before the deadline
    fn expire_attempt(&self, device: &Arc<Device>, attempt: u64) {
        let mut state = device.lock();
        if !Self::attempt_is_current(&state, attempt) {
            return;
        }
        state.set_connection_state(ConnectionState::NotConnected);
        self.stats.record_connect_timeout();
        warn!(
            "{}",
            PeerLinkError::ConnectTimeout {
                peer_id: device.peer_id()
            }
        );
        self.publish_state(device, &state);
    }

    /// The transport refused to carry attempt `attempt`
    fn fail_attempt(&self, device: &Arc<Device>, attempt: u64, err: &TransportError) {
        let mut state = device.lock();
        if !Self::attempt_is_current(&state, attempt) {
            return;
        }
        state.set_connection_state(ConnectionState::NotConnected);
        self.stats.record_connect_failure();
        warn!("Connection attempt to {} failed: {}", device.identity(), err);
        self.publish_state(device, &state);
    }

    /// Expire attempt `attempt` at `deadline` unless it resolved first
    fn expire_at(self: &Arc<Self>, device: &Arc<Device>, attempt: u64, deadline: Instant) {
        let manager = self.clone();
        let device = device.clone();
        tokio::spawn(async move {
            time::sleep_until(deadline).await;
            manager.expire_attempt(&device, attempt);
        });
    }

    fn attempt_is_current(state: &DeviceState, attempt: u64) -> bool {
        state.connection_state == ConnectionState::Connecting && state.attempt == attempt
    }

    // ------------------------------------------------------------------------
    // Inbound invitations
    // ------------------------------------------------------------------------

    /// Handle an invitation from `identity`.
    ///
    /// With `auto_accept_invitations` every invitation is accepted and the
    /// device moves to `Connecting` (a `Connected` device stays connected).
    /// Otherwise the invitation is declined and the device is left untouched.
    pub fn accept_invitation(
        self: &Arc<Self>,
        identity: &PeerIdentity,
        invitation: InvitationContext,
    ) -> Arc<Device> {
        let device = self.registry.get_or_create(identity);

        if !self.config.auto_accept_invitations {
            self.stats.record_invitation_declined();
            info!("Declining invitation {} from {}", invitation.invitation_id, identity);
            let transport = self.transport.clone();
            let peer = identity.clone();
            tokio::spawn(async move {
                if let Err(err) = transport.decline(invitation).await {
                    warn!("Failed to decline invitation from {}: {}", peer, err);
                }
            });
            return device;
        }

        let (session, attempt) = {
            let mut state = device.lock();
            let attempt = match state.connection_state {
                ConnectionState::NotConnected => Some(state.begin_attempt()),
                ConnectionState::Connecting | ConnectionState::Connected => None,
            };
            (state.ensure_session(), attempt)
        };

        self.stats.record_invitation_accepted();
        info!(
            "Accepting invitation {} from {} into session {}",
            invitation.invitation_id, identity, session
        );

        let manager = self.clone();
        let accepted = device.clone();
        tokio::spawn(async move {
            let deadline = Instant::now() + manager.config.connect_timeout;
            if let Err(err) = manager.transport.accept(invitation, session).await {
                if let Some(attempt) = attempt {
                    manager.fail_attempt(&accepted, attempt, &err);
                } else {
                    warn!("Failed to accept invitation from {}: {}", accepted.identity(), err);
                }
                return;
            }
            if let Some(attempt) = attempt {
                time::sleep_until(deadline).await;
                manager.expire_attempt(&accepted, attempt);
            }
        });

        device
    }

    // ------------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------------

    /// Move `device` to `NotConnected` and release its transport session.
    ///
    /// Never fails: transport errors during teardown are logged and the
    /// device is `NotConnected` afterwards regardless.
    pub async fn disconnect(&self, device: &Arc<Device>) {
        let session = {
            let mut state = device.lock();
            let previous = state.set_connection_state(ConnectionState::NotConnected);
            if previous != ConnectionState::NotConnected {
                self.publish_state(device, &state);
            }
            state.session.take()
        };

        let Some(session) = session else {
            debug!("No session to tear down for {}", device.identity());
            return;
        };

        info!("Disconnecting from {} (session {})", device.identity(), session);
        if let Err(err) = self.transport.disconnect(device.identity(), session).await {
            warn!("Transport teardown for {} failed: {}", device.identity(), err);
        }
    }

    /// Disconnect every known device
    pub async fn disconnect_all(&self) {
        let devices = self.registry.all();
        info!("Disconnecting all {} devices", devices.len());
        for device in devices {
            self.disconnect(&device).await;
        }
    }

    // ------------------------------------------------------------------------
    // Transport events
    // ------------------------------------------------------------------------

    /// A peer showed up in discovery: register it and invite it
    pub fn on_peer_found(self: &Arc<Self>, identity: &PeerIdentity) -> ConnectOutcome {
        let device = self.registry.get_or_create(identity);
        debug!("Found peer {}", identity);
        self.connect(&device)
    }

    /// A peer stopped advertising. Connection state is left alone: a peer can
    /// vanish from discovery while its session is still up.
    pub fn on_peer_lost(&self, identity: &PeerIdentity) {
        debug!("Lost sight of peer {}", identity);
    }

    /// Apply a link state reported by the transport.
    ///
    /// Always publishes `DeviceStateChanged`, even when the mapped state is
    /// unchanged, so observers converge on the transport's view. A report that
    /// moves the device into `Connecting` starts an attempt bounded by
    /// `connect_timeout`, like a locally initiated one.
    pub fn on_transport_state_changed(
        self: &Arc<Self>,
        identity: &PeerIdentity,
        link_state: &LinkState,
    ) -> Arc<Device> {
        let device = self.registry.get_or_create(identity);
        let new_state = link_state.to_connection_state();

        let mut state = device.lock();
        let previous = state.connection_state;
        if new_state == ConnectionState::Connecting && previous != ConnectionState::Connecting {
            let attempt = state.begin_attempt();
            self.expire_at(&device, attempt, Instant::now() + self.config.connect_timeout);
        } else {
            state.set_connection_state(new_state);
        }
        match link_state {
            LinkState::Failed { reason } => {
                warn!("Link to {} failed: {}", identity, reason);
                if previous == ConnectionState::Connecting {
                    self.stats.record_connect_failure();
                }
            }
            _ if previous != new_state => {
                info!("{} is now {} (was {})", identity, new_state, previous);
            }
            _ => {}
        }
        self.publish_state(&device, &state);
        drop(state);

        device
    }

    /// Decode bytes from `identity` and announce the message.
    ///
    /// Malformed payloads are dropped; they are counted and logged but never
    /// reach subscribers or `last_message`.
    pub fn on_data_received(&self, identity: &PeerIdentity, payload: &[u8]) -> Option<Message> {
        let device = self.registry.get_or_create(identity);

        let message = match codec::decode(payload) {
            Ok(message) => message,
            Err(err) => {
                self.stats.record_decode_failure();
                warn!(
                    "Dropping {} byte payload from {}: {}",
                    payload.len(),
                    identity,
                    err
                );
                return None;
            }
        };

        let mut state = device.lock();
        state.last_message = Some(message.clone());
        self.stats.record_message_received();
        self.notifier.publish(PeerEvent::MessageReceived {
            message: message.clone(),
            from: device.clone(),
        });
        drop(state);

        Some(message)
    }

    // ------------------------------------------------------------------------
    // Messaging
    // ------------------------------------------------------------------------

    /// Send `text` to a connected device in reliable mode.
    ///
    /// Fails with `NotConnected` (without touching the transport) unless the
    /// device is `Connected`. A transport error signalling link loss also
    /// moves the device to `NotConnected`. No retries are attempted.
    pub async fn send(&self, device: &Arc<Device>, text: impl Into<String>) -> PeerLinkResult<()> {
        if device.connection_state() != ConnectionState::Connected {
            return Err(PeerLinkError::NotConnected {
                peer_id: device.peer_id(),
            });
        }

        let payload = codec::encode(&Message::new(text))?;

        match self.transport.send_reliable(&payload, device.identity()).await {
            Ok(()) => {
                self.stats.record_message_sent();
                debug!("Sent {} bytes to {}", payload.len(), device.identity());
                Ok(())
            }
            Err(err) => {
                if err.is_link_loss() {
                    self.mark_link_lost(device);
                }
                Err(err.into())
            }
        }
    }

    fn mark_link_lost(&self, device: &Arc<Device>) {
        let mut state = device.lock();
        let previous = state.set_connection_state(ConnectionState::NotConnected);
        if previous != ConnectionState::NotConnected {
            warn!("Link to {} lost while sending", device.identity());
            self.publish_state(device, &state);
        }
    }

    /// Must be called with the device lock held so per-device order is kept
    fn publish_state(&self, device: &Arc<Device>, state: &DeviceState) {
        self.notifier.publish(PeerEvent::DeviceStateChanged {
            device: device.clone(),
            state: state.connection_state,
        });
    }
}

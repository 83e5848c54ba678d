//! In-memory local network
//!
//! A [`LocalMesh`] stands in for the radio layer: every node gets a
//! [`MeshEndpoint`] implementing [`Transport`], and endpoints see each other
//! through advertise/browse, invitations and reliable byte delivery exactly as
//! a session layer would over a real link. An endpoint joins the mesh under
//! the identity and service type it first advertises or browses with. Events
//! for an endpoint arrive in the order the mesh produced them.

use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use peerlink_core::{
    transport_event_channel, InvitationContext, LinkState, PeerId, PeerIdentity, SessionHandle,
    Transport, TransportError, TransportEvent, TransportEventReceiver, TransportEventSender,
};
use tracing::{debug, info};

// ----------------------------------------------------------------------------
// Mesh Configuration
// ----------------------------------------------------------------------------

/// Network conditions simulated by the mesh
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Probability that an invitation silently never arrives (0.0 = never)
    pub invitation_loss_rate: f64,
    /// Seed for the loss generator; `None` picks a random seed
    pub seed: Option<u64>,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            invitation_loss_rate: 0.0,
            seed: None,
        }
    }
}

impl MeshConfig {
    /// Lossless mesh
    pub fn ideal() -> Self {
        Self::default()
    }

    /// Mesh that drops a share of invitations, deterministically for `seed`
    pub fn lossy(invitation_loss_rate: f64, seed: u64) -> Self {
        Self {
            invitation_loss_rate: invitation_loss_rate.clamp(0.0, 1.0),
            seed: Some(seed),
        }
    }
}

// ----------------------------------------------------------------------------
// Mesh State
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct PendingInvitation {
    from: PeerId,
    session: SessionHandle,
}

struct Station {
    identity: PeerIdentity,
    service_type: String,
    /// Serial of the endpoint that owns this station
    endpoint: u64,
    events: TransportEventSender,
    advertising: bool,
    browsing: bool,
    /// Open links keyed by remote peer, with this side's session
    links: HashMap<PeerId, SessionHandle>,
    /// Invitations delivered to this station and not yet answered
    invitations: HashMap<u64, PendingInvitation>,
}

impl Station {
    /// Stations only see each other within one service type
    fn shares_service(&self, other: &Station) -> bool {
        self.service_type == other.service_type
    }

    fn notify(&self, event: TransportEvent) {
        if self.events.send(event).is_err() {
            debug!("Mesh endpoint {} is no longer listening", self.identity);
        }
    }
}

struct Network {
    stations: HashMap<PeerId, Station>,
    /// Endpoints removed with [`LocalMesh::detach`]; they cannot rejoin
    detached: HashSet<u64>,
    rng: fastrand::Rng,
}

impl Network {
    fn station(&self, id: &PeerId, endpoint: u64) -> Option<&Station> {
        self.stations.get(id).filter(|station| station.endpoint == endpoint)
    }

    fn station_mut(&mut self, id: &PeerId, endpoint: u64) -> Option<&mut Station> {
        self.stations
            .get_mut(id)
            .filter(|station| station.endpoint == endpoint)
    }
}

struct MeshInner {
    config: MeshConfig,
    network: Mutex<Network>,
    next_invitation: AtomicU64,
    next_endpoint: AtomicU64,
}

impl MeshInner {
    fn network(&self) -> MutexGuard<'_, Network> {
        self.network
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared in-memory network
#[derive(Clone)]
pub struct LocalMesh {
    inner: Arc<MeshInner>,
}

impl Default for LocalMesh {
    fn default() -> Self {
        Self::new(MeshConfig::default())
    }
}

impl LocalMesh {
    pub fn new(config: MeshConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        Self {
            inner: Arc::new(MeshInner {
                config,
                network: Mutex::new(Network {
                    stations: HashMap::new(),
                    detached: HashSet::new(),
                    rng,
                }),
                next_invitation: AtomicU64::new(1),
                next_endpoint: AtomicU64::new(1),
            }),
        }
    }

    /// Create an endpoint. It stays off the air until it advertises or browses.
    pub fn endpoint(&self) -> Arc<MeshEndpoint> {
        let (events_tx, receiver) = transport_event_channel();
        Arc::new(MeshEndpoint {
            serial: self.inner.next_endpoint.fetch_add(1, Ordering::Relaxed),
            mesh: self.inner.clone(),
            local: Mutex::new(None),
            events_tx,
            events: Mutex::new(Some(receiver)),
        })
    }

    /// Number of peers that have joined the mesh
    pub fn len(&self) -> usize {
        self.inner.network().stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `a` and `b` both hold a link to each other
    pub fn is_linked(&self, a: &PeerId, b: &PeerId) -> bool {
        let network = self.inner.network();
        let forward = network
            .stations
            .get(a)
            .map_or(false, |station| station.links.contains_key(b));
        let backward = network
            .stations
            .get(b)
            .map_or(false, |station| station.links.contains_key(a));
        forward && backward
    }

    /// Service type `peer` joined under, if it is on the mesh
    pub fn service_of(&self, peer: &PeerId) -> Option<String> {
        self.inner
            .network()
            .stations
            .get(peer)
            .map(|station| station.service_type.clone())
    }

    /// Cut the link between `a` and `b` as if they moved out of range. Both
    /// sides see `NotConnected`.
    pub fn sever(&self, a: &PeerId, b: &PeerId) {
        let mut network = self.inner.network();
        let (Some(a_identity), Some(b_identity)) =
            (network_identity(&network, a), network_identity(&network, b))
        else {
            return;
        };

        for (here, remote) in [(a, &b_identity), (b, &a_identity)] {
            if let Some(station) = network.stations.get_mut(here) {
                if station.links.remove(&remote.id()).is_some() {
                    station.notify(TransportEvent::SessionStateChanged {
                        peer: remote.clone(),
                        state: LinkState::NotConnected,
                    });
                }
            }
        }
        info!("Severed link between {} and {}", a, b);
    }

    /// Detach `peer` entirely: browsers lose sight of it and linked peers
    /// see the link drop. Its endpoint cannot rejoin.
    pub fn detach(&self, peer: &PeerId) {
        let mut network = self.inner.network();
        let Some(station) = network.stations.remove(peer) else {
            return;
        };
        network.detached.insert(station.endpoint);
        for other in network.stations.values_mut() {
            if station.advertising && other.browsing && other.shares_service(&station) {
                other.notify(TransportEvent::PeerLost(station.identity.clone()));
            }
            if other.links.remove(peer).is_some() {
                other.notify(TransportEvent::SessionStateChanged {
                    peer: station.identity.clone(),
                    state: LinkState::NotConnected,
                });
            }
        }
        info!("Detached {} from the mesh", station.identity);
    }
}

fn network_identity(network: &Network, peer: &PeerId) -> Option<PeerIdentity> {
    network
        .stations
        .get(peer)
        .map(|station| station.identity.clone())
}

// ----------------------------------------------------------------------------
// Mesh Endpoint
// ----------------------------------------------------------------------------

/// One node's view of the mesh
pub struct MeshEndpoint {
    serial: u64,
    mesh: Arc<MeshInner>,
    /// Identity the endpoint joined under
    local: Mutex<Option<PeerIdentity>>,
    events_tx: TransportEventSender,
    events: Mutex<Option<TransportEventReceiver>>,
}

impl MeshEndpoint {
    /// Identity this endpoint joined the mesh under, if it has joined
    pub fn identity(&self) -> Option<PeerIdentity> {
        self.local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn joined(&self) -> Result<PeerIdentity, TransportError> {
        self.identity().ok_or_else(|| {
            debug!("Mesh endpoint {} has not joined yet", self.serial);
            TransportError::NotStarted
        })
    }

    /// Put `local` on the air under `service_type`, or check that this
    /// endpoint is already there with the same identity and service.
    fn join(
        &self,
        network: &mut Network,
        local: &PeerIdentity,
        service_type: &str,
    ) -> Result<(), TransportError> {
        if network.detached.contains(&self.serial) {
            return Err(TransportError::NotStarted);
        }

        let mut bound = self
            .local
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(current) = bound.as_ref().filter(|current| current.id() != local.id()) {
            return Err(TransportError::Unavailable {
                reason: format!("endpoint already joined as {}", current),
            });
        }

        if let Some(station) = network.station(&local.id(), self.serial) {
            if station.service_type != service_type {
                return Err(TransportError::Unavailable {
                    reason: format!(
                        "{} already joined service '{}'",
                        local, station.service_type
                    ),
                });
            }
            return Ok(());
        }

        let station = Station {
            identity: local.clone(),
            service_type: service_type.to_string(),
            endpoint: self.serial,
            events: self.events_tx.clone(),
            advertising: false,
            browsing: false,
            links: HashMap::new(),
            invitations: HashMap::new(),
        };
        network.stations.insert(local.id(), station);
        *bound = Some(local.clone());
        debug!("{} joined the mesh under '{}'", local, service_type);
        Ok(())
    }

    /// Drop the link to `peer` on this side and tell the remote side
    fn unlink(network: &mut Network, here: &PeerIdentity, endpoint: u64, peer: &PeerId) {
        if let Some(station) = network.station_mut(&here.id(), endpoint) {
            station.links.remove(peer);
        }
        if let Some(remote) = network.stations.get_mut(peer) {
            if remote.links.remove(&here.id()).is_some() {
                remote.notify(TransportEvent::SessionStateChanged {
                    peer: here.clone(),
                    state: LinkState::NotConnected,
                });
            }
        }
    }
}

#[async_trait]
impl Transport for MeshEndpoint {
    async fn advertise(
        &self,
        local: &PeerIdentity,
        service_type: &str,
    ) -> Result<(), TransportError> {
        let mut network = self.mesh.network();
        self.join(&mut network, local, service_type)?;
        let id = local.id();
        let station = network
            .station_mut(&id, self.serial)
            .ok_or(TransportError::NotStarted)?;
        if station.advertising {
            return Ok(());
        }
        station.advertising = true;

        let network = &*network;
        if let Some(station) = network.stations.get(&id) {
            for (peer, other) in network.stations.iter() {
                if *peer != id && other.browsing && other.shares_service(station) {
                    other.notify(TransportEvent::PeerFound(local.clone()));
                }
            }
        }
        debug!("{} is advertising", local);
        Ok(())
    }

    async fn stop_advertising(&self) -> Result<(), TransportError> {
        let local = self.joined()?;
        let mut network = self.mesh.network();
        let id = local.id();
        let station = network
            .station_mut(&id, self.serial)
            .ok_or(TransportError::NotStarted)?;
        if !station.advertising {
            return Ok(());
        }
        station.advertising = false;

        let network = &*network;
        if let Some(station) = network.stations.get(&id) {
            for (peer, other) in network.stations.iter() {
                if *peer != id && other.browsing && other.shares_service(station) {
                    other.notify(TransportEvent::PeerLost(local.clone()));
                }
            }
        }
        debug!("{} stopped advertising", local);
        Ok(())
    }

    async fn browse(&self, local: &PeerIdentity, service_type: &str) -> Result<(), TransportError> {
        let mut network = self.mesh.network();
        self.join(&mut network, local, service_type)?;
        let id = local.id();
        let station = network
            .station_mut(&id, self.serial)
            .ok_or(TransportError::NotStarted)?;
        if station.browsing {
            return Ok(());
        }
        station.browsing = true;

        let network = &*network;
        if let Some(station) = network.stations.get(&id) {
            for (peer, other) in network.stations.iter() {
                if *peer != id && other.advertising && other.shares_service(station) {
                    station.notify(TransportEvent::PeerFound(other.identity.clone()));
                }
            }
        }
        debug!("{} is browsing", local);
        Ok(())
    }

    async fn stop_browsing(&self) -> Result<(), TransportError> {
        let local = self.joined()?;
        let mut network = self.mesh.network();
        let station = network
            .station_mut(&local.id(), self.serial)
            .ok_or(TransportError::NotStarted)?;
        station.browsing = false;
        Ok(())
    }

    async fn invite(
        &self,
        peer: &PeerIdentity,
        session: SessionHandle,
        timeout: Duration,
    ) -> Result<(), TransportError> {
        let local = self.joined()?;
        let mut network = self.mesh.network();
        let service_type = network
            .station(&local.id(), self.serial)
            .map(|station| station.service_type.clone())
            .ok_or(TransportError::NotStarted)?;

        let lost = self.mesh.config.invitation_loss_rate > 0.0
            && network.rng.f64() < self.mesh.config.invitation_loss_rate;

        let target = network
            .stations
            .get_mut(&peer.id())
            .filter(|station| station.advertising && station.service_type == service_type)
            .ok_or_else(|| TransportError::Unavailable {
                reason: format!("{} is not advertising '{}'", peer, service_type),
            })?;

        if lost {
            debug!("Invitation from {} to {} lost in transit", local, peer);
            return Ok(());
        }

        let invitation_id = self.mesh.next_invitation.fetch_add(1, Ordering::Relaxed);
        target.invitations.insert(
            invitation_id,
            PendingInvitation {
                from: local.id(),
                session,
            },
        );
        target.notify(TransportEvent::InvitationReceived {
            from: local.clone(),
            invitation: InvitationContext::new(invitation_id)
                .with_context(session.as_uuid().as_bytes().to_vec()),
        });
        debug!(
            "{} invited {} (invitation {}, {:?} to answer)",
            local, peer, invitation_id, timeout
        );
        Ok(())
    }

    async fn accept(
        &self,
        invitation: InvitationContext,
        session: SessionHandle,
    ) -> Result<(), TransportError> {
        let local = self.joined()?;
        let mut network = self.mesh.network();
        let id = local.id();
        let pending = network
            .station_mut(&id, self.serial)
            .ok_or(TransportError::NotStarted)?
            .invitations
            .remove(&invitation.invitation_id)
            .ok_or_else(|| TransportError::Unavailable {
                reason: format!("unknown invitation {}", invitation.invitation_id),
            })?;

        let Some(inviter) = network.stations.get_mut(&pending.from) else {
            return Err(TransportError::Unavailable {
                reason: "inviting peer left the mesh".into(),
            });
        };
        inviter.links.insert(id, pending.session);
        let inviter_identity = inviter.identity.clone();
        for state in [LinkState::Connecting, LinkState::Connected] {
            inviter.notify(TransportEvent::SessionStateChanged {
                peer: local.clone(),
                state,
            });
        }

        if let Some(station) = network.station_mut(&id, self.serial) {
            station.links.insert(pending.from, session);
            for state in [LinkState::Connecting, LinkState::Connected] {
                station.notify(TransportEvent::SessionStateChanged {
                    peer: inviter_identity.clone(),
                    state,
                });
            }
        }

        info!("{} linked with {}", local, inviter_identity);
        Ok(())
    }

    async fn decline(&self, invitation: InvitationContext) -> Result<(), TransportError> {
        let local = self.joined()?;
        let mut network = self.mesh.network();
        let pending = network
            .station_mut(&local.id(), self.serial)
            .ok_or(TransportError::NotStarted)?
            .invitations
            .remove(&invitation.invitation_id);

        if let Some(inviter) = pending.and_then(|pending| network.stations.get(&pending.from)) {
            inviter.notify(TransportEvent::SessionStateChanged {
                peer: local.clone(),
                state: LinkState::NotConnected,
            });
        }
        Ok(())
    }

    async fn send_reliable(
        &self,
        payload: &[u8],
        peer: &PeerIdentity,
    ) -> Result<(), TransportError> {
        let local = self.joined()?;
        let network = self.mesh.network();
        let id = local.id();
        let station = network
            .station(&id, self.serial)
            .ok_or(TransportError::NotStarted)?;

        let remote = network
            .stations
            .get(&peer.id())
            .filter(|remote| station.links.contains_key(&peer.id()) && remote.links.contains_key(&id))
            .ok_or(TransportError::LinkLost { peer_id: peer.id() })?;

        remote.notify(TransportEvent::DataReceived {
            from: local.clone(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn disconnect(
        &self,
        peer: &PeerIdentity,
        session: SessionHandle,
    ) -> Result<(), TransportError> {
        let local = self.joined()?;
        let mut network = self.mesh.network();
        Self::unlink(&mut network, &local, self.serial, &peer.id());
        debug!("{} left session {} with {}", local, session, peer);
        Ok(())
    }

    fn take_event_receiver(&self) -> Option<TransportEventReceiver> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(byte: u8) -> PeerIdentity {
        PeerIdentity::new(PeerId::new([byte; 8]), format!("node-{}", byte))
    }

    fn drain(receiver: &mut TransportEventReceiver) -> Vec<TransportEvent> {
        let mut events = Vec::new();
        while let Ok(event) = receiver.try_recv() {
            events.push(event);
        }
        events
    }

    fn link_states(events: &[TransportEvent]) -> Vec<LinkState> {
        events
            .iter()
            .filter_map(|event| match event {
                TransportEvent::SessionStateChanged { state, .. } => Some(state.clone()),
                _ => None,
            })
            .collect()
    }

    /// Endpoint advertising `identity(byte)` under "chat", with its events
    async fn advertiser(mesh: &LocalMesh, byte: u8) -> (Arc<MeshEndpoint>, TransportEventReceiver) {
        let endpoint = mesh.endpoint();
        let events = endpoint.take_event_receiver().unwrap();
        endpoint.advertise(&identity(byte), "chat").await.unwrap();
        (endpoint, events)
    }

    #[tokio::test]
    async fn test_browsers_find_advertisers_in_either_order() {
        let mesh = LocalMesh::default();
        let a = mesh.endpoint();
        let b = mesh.endpoint();
        let mut a_events = a.take_event_receiver().unwrap();
        let mut b_events = b.take_event_receiver().unwrap();

        a.advertise(&identity(1), "chat").await.unwrap();
        b.browse(&identity(2), "chat").await.unwrap();
        b.advertise(&identity(2), "chat").await.unwrap();
        a.browse(&identity(1), "chat").await.unwrap();

        assert!(matches!(drain(&mut b_events).as_slice(), [TransportEvent::PeerFound(p)] if *p == identity(1)));
        assert!(matches!(drain(&mut a_events).as_slice(), [TransportEvent::PeerFound(p)] if *p == identity(2)));
        assert!(a.take_event_receiver().is_none());
        assert_eq!(mesh.len(), 2);
    }

    #[tokio::test]
    async fn test_endpoint_joins_under_first_identity_and_service() {
        let mesh = LocalMesh::default();
        let a = mesh.endpoint();
        assert!(mesh.is_empty());
        assert_eq!(a.identity(), None);
        assert!(matches!(a.stop_browsing().await, Err(TransportError::NotStarted)));

        a.advertise(&identity(1), "chat").await.unwrap();
        assert_eq!(a.identity(), Some(identity(1)));
        assert_eq!(mesh.service_of(&identity(1).id()), Some("chat".to_string()));

        assert!(a.browse(&identity(1), "chat").await.is_ok());
        assert!(matches!(
            a.browse(&identity(1), "files").await,
            Err(TransportError::Unavailable { .. })
        ));
        assert!(matches!(
            a.advertise(&identity(2), "chat").await,
            Err(TransportError::Unavailable { .. })
        ));
        assert_eq!(mesh.len(), 1);
    }

    #[tokio::test]
    async fn test_accepted_invitation_links_both_sides() {
        let mesh = LocalMesh::default();
        let (a, mut a_events) = advertiser(&mesh, 1).await;
        let (b, mut b_events) = advertiser(&mesh, 2).await;

        let session = SessionHandle::new();
        a.invite(&identity(2), session, Duration::from_secs(10))
            .await
            .unwrap();
        let invitation = match drain(&mut b_events).pop() {
            Some(TransportEvent::InvitationReceived { from, invitation }) => {
                assert_eq!(from, identity(1));
                assert_eq!(
                    invitation.context.as_deref(),
                    Some(&session.as_uuid().as_bytes()[..])
                );
                invitation
            }
            other => panic!("expected invitation, got {:?}", other),
        };

        b.accept(invitation, SessionHandle::new()).await.unwrap();

        let expected = vec![LinkState::Connecting, LinkState::Connected];
        assert_eq!(link_states(&drain(&mut a_events)), expected);
        assert_eq!(link_states(&drain(&mut b_events)), expected);
        assert!(mesh.is_linked(&identity(1).id(), &identity(2).id()));

        a.send_reliable(b"ping", &identity(2)).await.unwrap();
        match drain(&mut b_events).as_slice() {
            [TransportEvent::DataReceived { from, payload }] => {
                assert_eq!(*from, identity(1));
                assert_eq!(payload, b"ping");
            }
            other => panic!("unexpected events {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_service_types_are_isolated() {
        let mesh = LocalMesh::default();
        let a = mesh.endpoint();
        let b = mesh.endpoint();
        let mut b_events = b.take_event_receiver().unwrap();

        a.advertise(&identity(1), "chat").await.unwrap();
        b.browse(&identity(2), "files").await.unwrap();
        b.advertise(&identity(2), "files").await.unwrap();

        assert!(drain(&mut b_events).is_empty());
        assert!(a
            .invite(&identity(2), SessionHandle::new(), Duration::from_secs(1))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_invite_requires_advertising_peer() {
        let mesh = LocalMesh::default();
        let a = mesh.endpoint();
        let b = mesh.endpoint();
        a.browse(&identity(1), "chat").await.unwrap();
        b.browse(&identity(2), "chat").await.unwrap();

        let err = a
            .invite(&identity(2), SessionHandle::new(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn test_send_without_link_is_link_loss() {
        let mesh = LocalMesh::default();
        let (a, _a_events) = advertiser(&mesh, 1).await;
        let (_b, _b_events) = advertiser(&mesh, 2).await;

        let err = a.send_reliable(b"x", &identity(2)).await.unwrap_err();
        assert!(err.is_link_loss());
    }

    #[tokio::test]
    async fn test_decline_tells_inviter() {
        let mesh = LocalMesh::default();
        let (a, mut a_events) = advertiser(&mesh, 1).await;
        let (b, mut b_events) = advertiser(&mesh, 2).await;

        a.invite(&identity(2), SessionHandle::new(), Duration::from_secs(1))
            .await
            .unwrap();
        let Some(TransportEvent::InvitationReceived { invitation, .. }) = drain(&mut b_events).pop() else {
            panic!("expected invitation");
        };
        b.decline(invitation.clone()).await.unwrap();

        assert_eq!(link_states(&drain(&mut a_events)), vec![LinkState::NotConnected]);
        assert!(b.accept(invitation, SessionHandle::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_sever_and_detach_drop_links() {
        let mesh = LocalMesh::default();
        let (a, mut a_events) = advertiser(&mesh, 1).await;
        let (b, mut b_events) = advertiser(&mesh, 2).await;
        a.browse(&identity(1), "chat").await.unwrap();

        b.invite(&identity(1), SessionHandle::new(), Duration::from_secs(1))
            .await
            .unwrap();
        let invitation = drain(&mut a_events)
            .into_iter()
            .find_map(|event| match event {
                TransportEvent::InvitationReceived { invitation, .. } => Some(invitation),
                _ => None,
            })
            .unwrap();
        a.accept(invitation, SessionHandle::new()).await.unwrap();
        drain(&mut a_events);
        drain(&mut b_events);

        mesh.sever(&identity(1).id(), &identity(2).id());
        assert!(!mesh.is_linked(&identity(1).id(), &identity(2).id()));
        assert_eq!(link_states(&drain(&mut a_events)), vec![LinkState::NotConnected]);
        assert_eq!(link_states(&drain(&mut b_events)), vec![LinkState::NotConnected]);

        mesh.detach(&identity(2).id());
        assert!(matches!(drain(&mut a_events).as_slice(), [TransportEvent::PeerLost(p)] if *p == identity(2)));
        assert_eq!(mesh.len(), 1);
        assert!(matches!(
            b.advertise(&identity(2), "chat").await,
            Err(TransportError::NotStarted)
        ));
        assert!(matches!(b.stop_advertising().await, Err(TransportError::NotStarted)));
    }

    #[tokio::test]
    async fn test_total_invitation_loss_delivers_nothing() {
        let mesh = LocalMesh::new(MeshConfig::lossy(1.0, 7));
        let (a, _a_events) = advertiser(&mesh, 1).await;
        let (_b, mut b_events) = advertiser(&mesh, 2).await;

        a.invite(&identity(2), SessionHandle::new(), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(drain(&mut b_events).is_empty());
    }
}

//! Peer node
//!
//! [`PeerNode`] is what an application holds: it wires a transport to a
//! session manager, runs the event pump, and exposes discovery, connection
//! and messaging as plain method calls. There is no global instance; build as
//! many nodes as needed, each with its own transport.

use std::sync::Arc;

use peerlink_core::{
    ConnectOutcome, Device, EphemeralIdentity, EventSubscription, IdentityProvider, PeerId,
    PeerIdentity, PeerLinkError, PeerLinkResult, SessionManager, SessionStatsSnapshot, Transport,
    TransportError, TransportEventReceiver,
};
use tracing::{debug, info, warn};

use crate::config::NodeConfig;
use crate::pump::EventPump;

// ----------------------------------------------------------------------------
// Node Builder
// ----------------------------------------------------------------------------

/// Builder for a [`PeerNode`]
pub struct PeerNodeBuilder {
    transport: Arc<dyn Transport>,
    config: NodeConfig,
    identity: Option<Box<dyn IdentityProvider>>,
}

impl PeerNodeBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: NodeConfig::default(),
            identity: None,
        }
    }

    pub fn with_config(mut self, config: NodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Use `provider` for the local identity instead of a fresh ephemeral one
    pub fn with_identity_provider(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.identity = Some(Box::new(provider));
        self
    }

    /// Validate the configuration and assemble the node. The node is idle
    /// until [`PeerNode::start`].
    pub fn build(self) -> PeerLinkResult<PeerNode> {
        self.config.validate()?;

        let events = self
            .transport
            .take_event_receiver()
            .ok_or_else(|| TransportError::Unavailable {
                reason: "transport events are already consumed by another node".into(),
            })?;

        let identity = match self.identity {
            Some(provider) => provider.local_identity(),
            None => EphemeralIdentity::new(self.config.display_name.clone()).local_identity(),
        };

        let sessions = SessionManager::new(self.transport.clone(), self.config.session.clone());
        info!(
            "Built node {} for service '{}'",
            identity, self.config.service_type
        );

        Ok(PeerNode {
            identity,
            config: self.config,
            transport: self.transport,
            sessions,
            events: Some(events),
            pump: None,
            lifecycle: Lifecycle::Stopped,
        })
    }
}

// ----------------------------------------------------------------------------
// Peer Node
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Stopped,
    Foreground,
    Background,
}

pub struct PeerNode {
    identity: PeerIdentity,
    config: NodeConfig,
    transport: Arc<dyn Transport>,
    sessions: Arc<SessionManager>,
    /// Parked here while the pump is not running
    events: Option<TransportEventReceiver>,
    pump: Option<EventPump>,
    lifecycle: Lifecycle,
}

impl PeerNode {
    pub fn builder(transport: Arc<dyn Transport>) -> PeerNodeBuilder {
        PeerNodeBuilder::new(transport)
    }

    // ------------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------------

    /// Start the event pump, then advertise and browse
    pub async fn start(&mut self) -> PeerLinkResult<()> {
        if self.lifecycle != Lifecycle::Stopped {
            return Err(PeerLinkError::AlreadyRunning);
        }
        let events = self.events.take().ok_or_else(|| TransportError::Unavailable {
            reason: "transport event receiver was lost".into(),
        })?;

        self.pump = Some(EventPump::spawn(self.sessions.clone(), events));
        self.lifecycle = Lifecycle::Foreground;

        if let Err(e) = self.begin_discovery().await {
            self.halt_pump().await;
            self.lifecycle = Lifecycle::Stopped;
            return Err(e);
        }

        info!("Node {} started", self.identity);
        Ok(())
    }

    /// Disconnect everyone, stop discovery and park the event pump
    pub async fn stop(&mut self) -> PeerLinkResult<()> {
        if self.lifecycle == Lifecycle::Stopped {
            return Err(PeerLinkError::NotRunning);
        }

        self.sessions.disconnect_all().await;
        self.end_discovery().await;
        self.halt_pump().await;
        self.lifecycle = Lifecycle::Stopped;

        info!("Node {} stopped", self.identity);
        Ok(())
    }

    /// The host app moved to the background: every session is torn down and
    /// discovery paused until [`enter_foreground`](Self::enter_foreground).
    pub async fn enter_background(&mut self) -> PeerLinkResult<()> {
        match self.lifecycle {
            Lifecycle::Stopped => return Err(PeerLinkError::NotRunning),
            Lifecycle::Background => return Ok(()),
            Lifecycle::Foreground => {}
        }

        info!("Node {} entering background", self.identity);
        self.sessions.disconnect_all().await;
        self.end_discovery().await;
        self.lifecycle = Lifecycle::Background;
        Ok(())
    }

    /// The host app is active again: resume advertising and browsing so peers
    /// are rediscovered and reconnected.
    pub async fn enter_foreground(&mut self) -> PeerLinkResult<()> {
        match self.lifecycle {
            Lifecycle::Stopped => return Err(PeerLinkError::NotRunning),
            Lifecycle::Foreground => return Ok(()),
            Lifecycle::Background => {}
        }

        info!("Node {} entering foreground", self.identity);
        self.begin_discovery().await?;
        self.lifecycle = Lifecycle::Foreground;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle != Lifecycle::Stopped
            && self.pump.as_ref().is_some_and(|pump| !pump.is_finished())
    }

    pub fn is_backgrounded(&self) -> bool {
        self.lifecycle == Lifecycle::Background
    }

    async fn begin_discovery(&self) -> PeerLinkResult<()> {
        let service_type = self.config.service_type.as_str();
        self.transport.advertise(&self.identity, service_type).await?;
        self.transport.browse(&self.identity, service_type).await?;
        debug!("Discovery active for {}", self.identity);
        Ok(())
    }

    async fn end_discovery(&self) {
        if let Err(e) = self.transport.stop_browsing().await {
            warn!("Failed to stop browsing: {}", e);
        }
        if let Err(e) = self.transport.stop_advertising().await {
            warn!("Failed to stop advertising: {}", e);
        }
    }

    async fn halt_pump(&mut self) {
        if let Some(pump) = self.pump.take() {
            self.events = pump.stop().await;
        }
    }

    // ------------------------------------------------------------------------
    // Connections and messaging
    // ------------------------------------------------------------------------

    /// Invite `peer` explicitly. Discovery already invites every peer it
    /// finds, so this is only needed for peers learned some other way.
    pub fn connect(&self, peer: &PeerIdentity) -> PeerLinkResult<ConnectOutcome> {
        self.ensure_running()?;
        let device = self.sessions.registry().get_or_create(peer);
        Ok(self.sessions.connect(&device))
    }

    /// Disconnect from `peer_id`. Unknown peers are ignored.
    pub async fn disconnect(&self, peer_id: &PeerId) {
        match self.sessions.registry().get(peer_id) {
            Some(device) => self.sessions.disconnect(&device).await,
            None => debug!("Ignoring disconnect for unknown peer {}", peer_id),
        }
    }

    /// Send `text` to a connected peer
    pub async fn send(&self, peer_id: &PeerId, text: impl Into<String>) -> PeerLinkResult<()> {
        let device = self
            .sessions
            .registry()
            .get(peer_id)
            .ok_or(PeerLinkError::NotConnected { peer_id: *peer_id })?;
        self.sessions.send(&device, text).await
    }

    // ------------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------------

    pub fn subscribe(&self) -> EventSubscription {
        self.sessions.subscribe()
    }

    pub fn devices(&self) -> Vec<Arc<Device>> {
        self.sessions.registry().all()
    }

    pub fn connected_devices(&self) -> Vec<Arc<Device>> {
        self.sessions.registry().connected()
    }

    pub fn device(&self, peer_id: &PeerId) -> Option<Arc<Device>> {
        self.sessions.registry().get(peer_id)
    }

    pub fn local_identity(&self) -> &PeerIdentity {
        &self.identity
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn stats(&self) -> SessionStatsSnapshot {
        self.sessions.stats()
    }

    pub fn session_manager(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    fn ensure_running(&self) -> PeerLinkResult<()> {
        if self.lifecycle == Lifecycle::Stopped {
            return Err(PeerLinkError::NotRunning);
        }
        Ok(())
    }
}

impl Drop for PeerNode {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_core::testing::{RecordingTransport, TransportCall};
    use peerlink_core::{
        codec, ConnectionState, LinkState, Message, PeerEvent, SessionConfig, StaticIdentity,
        TransportEvent,
    };
    use std::time::Duration;

    fn remote(byte: u8) -> PeerIdentity {
        PeerIdentity::new(PeerId::new([byte; 8]), format!("remote-{}", byte))
    }

    fn node() -> (Arc<RecordingTransport>, PeerNode) {
        let transport = Arc::new(RecordingTransport::new());
        let node = PeerNode::builder(transport.clone())
            .with_config(NodeConfig::new("local"))
            .with_identity_provider(StaticIdentity::new(PeerIdentity::new(
                PeerId::new([0xaa; 8]),
                "local",
            )))
            .build()
            .unwrap();
        (transport, node)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn test_build_rejects_invalid_config() {
        let transport = Arc::new(RecordingTransport::new());
        let result = PeerNode::builder(transport)
            .with_config(NodeConfig::new("local").with_service_type("Not Valid"))
            .build();
        assert!(matches!(result, Err(PeerLinkError::Config { .. })));
    }

    #[tokio::test]
    async fn test_transport_cannot_back_two_nodes() {
        let transport = Arc::new(RecordingTransport::new());
        assert!(PeerNode::builder(transport.clone()).build().is_ok());
        assert!(PeerNode::builder(transport).build().is_err());
    }

    #[tokio::test]
    async fn test_lifecycle_drives_discovery() {
        let (transport, mut node) = node();
        assert_eq!(node.local_identity().id(), PeerId::new([0xaa; 8]));
        assert!(matches!(node.stop().await, Err(PeerLinkError::NotRunning)));

        node.start().await.unwrap();
        assert!(node.is_running());
        assert!(matches!(node.start().await, Err(PeerLinkError::AlreadyRunning)));

        node.stop().await.unwrap();
        assert!(!node.is_running());

        // restart reuses the parked event receiver
        node.start().await.unwrap();
        assert!(node.is_running());

        let advertise = TransportCall::Advertise {
            local: PeerId::new([0xaa; 8]),
            service_type: "peerlink".into(),
        };
        let browse = TransportCall::Browse {
            local: PeerId::new([0xaa; 8]),
            service_type: "peerlink".into(),
        };
        assert_eq!(
            transport.calls(),
            vec![
                advertise.clone(),
                browse.clone(),
                TransportCall::StopBrowsing,
                TransportCall::StopAdvertising,
                advertise,
                browse,
            ]
        );
    }

    #[tokio::test]
    async fn test_pump_applies_transport_events() {
        let (transport, mut node) = node();
        let mut events = node.subscribe();
        node.start().await.unwrap();

        transport.emit(TransportEvent::PeerFound(remote(1)));
        settle().await;
        assert_eq!(transport.invites(), vec![remote(1).id()]);

        transport.emit(TransportEvent::SessionStateChanged {
            peer: remote(1),
            state: LinkState::Connected,
        });
        transport.emit(TransportEvent::DataReceived {
            from: remote(1),
            payload: codec::encode(&Message::new("yo")).unwrap(),
        });
        settle().await;

        let device = node.device(&remote(1).id()).unwrap();
        assert!(device.is_connected());
        assert_eq!(device.last_message(), Some(Message::new("yo")));
        assert_eq!(node.connected_devices().len(), 1);

        let received: Vec<_> = events
            .drain()
            .into_iter()
            .filter_map(|event| match event {
                PeerEvent::MessageReceived { message, .. } => Some(message.into_body()),
                _ => None,
            })
            .collect();
        assert_eq!(received, vec!["yo".to_string()]);
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_is_not_connected() {
        let (transport, mut node) = node();
        node.start().await.unwrap();

        let err = node.send(&remote(9).id(), "hello").await.unwrap_err();
        assert!(matches!(err, PeerLinkError::NotConnected { .. }));
        assert!(transport.sends().is_empty());

        // unknown peers are ignored
        node.disconnect(&remote(9).id()).await;
        assert!(transport.disconnects().is_empty());
    }

    #[tokio::test]
    async fn test_background_disconnects_and_foreground_rediscovers() {
        let (transport, mut node) = node();
        node.start().await.unwrap();
        transport.emit(TransportEvent::PeerFound(remote(1)));
        transport.emit(TransportEvent::SessionStateChanged {
            peer: remote(1),
            state: LinkState::Connected,
        });
        settle().await;

        node.enter_background().await.unwrap();
        assert!(node.is_backgrounded());
        assert_eq!(
            node.device(&remote(1).id()).unwrap().connection_state(),
            ConnectionState::NotConnected
        );
        assert_eq!(transport.disconnects(), vec![remote(1).id()]);
        assert!(matches!(node.send(&remote(1).id(), "hi").await, Err(PeerLinkError::NotConnected { .. })));

        node.enter_foreground().await.unwrap();
        assert!(!node.is_backgrounded());
        let advertises = transport
            .calls()
            .into_iter()
            .filter(|call| matches!(call, TransportCall::Advertise { .. }))
            .count();
        assert_eq!(advertises, 2);
    }

    #[tokio::test]
    async fn test_discovery_uses_configured_service_and_identity() {
        let transport = Arc::new(RecordingTransport::new());
        let mut node = PeerNode::builder(transport.clone())
            .with_config(NodeConfig::new("desk").with_service_type("chat"))
            .build()
            .unwrap();
        node.start().await.unwrap();

        let local = node.local_identity().id();
        assert_eq!(node.local_identity().display_name(), "desk");
        assert_eq!(
            transport.calls(),
            vec![
                TransportCall::Advertise {
                    local,
                    service_type: "chat".into(),
                },
                TransportCall::Browse {
                    local,
                    service_type: "chat".into(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_connect_requires_running_node() {
        let (_transport, node) = node();
        assert!(matches!(
            node.connect(&remote(1)),
            Err(PeerLinkError::NotRunning)
        ));
    }

    #[tokio::test]
    async fn test_session_config_reaches_manager() {
        let transport = Arc::new(RecordingTransport::new());
        let config = NodeConfig::new("local").with_session(
            SessionConfig::default().with_connect_timeout(Duration::from_secs(3)),
        );
        let node = PeerNode::builder(transport).with_config(config).build().unwrap();
        assert_eq!(
            node.session_manager().config().connect_timeout,
            Duration::from_secs(3)
        );
    }
}

//! Multi-node scenarios over the in-memory mesh

use std::sync::Arc;
use std::time::Duration;

use peerlink_core::{EventSubscription, StaticIdentity};
use peerlink_harness::{LocalMesh, MeshConfig};
use peerlink_runtime::{
    ConnectionState, NodeConfig, PeerEvent, PeerId, PeerIdentity, PeerNode, SessionConfig,
};

fn identity(byte: u8, name: &str) -> PeerIdentity {
    PeerIdentity::new(PeerId::new([byte; 8]), name)
}

fn node_on(mesh: &LocalMesh, identity: PeerIdentity, config: NodeConfig) -> PeerNode {
    PeerNode::builder(mesh.endpoint())
        .with_config(config)
        .with_identity_provider(StaticIdentity::new(identity))
        .build()
        .unwrap()
}

async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {}", what);
}

async fn next_message(events: &mut EventSubscription) -> (String, PeerId) {
    let received = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Some(PeerEvent::MessageReceived { message, from }) => {
                    return (message.into_body(), from.peer_id())
                }
                Some(_) => continue,
                None => panic!("notifier closed"),
            }
        }
    })
    .await;
    received.expect("no message arrived")
}

fn state_of(node: &PeerNode, peer: &PeerIdentity) -> ConnectionState {
    node.device(&peer.id())
        .map(|device| device.connection_state())
        .unwrap_or_default()
}

#[tokio::test]
async fn test_discover_connect_chat_and_background() {
    let mesh = LocalMesh::default();
    let alice_id = identity(1, "alice");
    let bob_id = identity(2, "bob");
    let mut alice = node_on(&mesh, alice_id.clone(), NodeConfig::new("alice"));
    let mut bob = node_on(&mesh, bob_id.clone(), NodeConfig::new("bob"));
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    alice.start().await.unwrap();
    bob.start().await.unwrap();

    wait_until("both sides connected", || {
        state_of(&alice, &bob_id) == ConnectionState::Connected
            && state_of(&bob, &alice_id) == ConnectionState::Connected
    })
    .await;
    assert!(mesh.is_linked(&alice_id.id(), &bob_id.id()));

    alice.send(&bob_id.id(), "hi").await.unwrap();
    assert_eq!(next_message(&mut bob_events).await, ("hi".to_string(), alice_id.id()));

    bob.send(&alice_id.id(), "yo").await.unwrap();
    assert_eq!(next_message(&mut alice_events).await, ("yo".to_string(), bob_id.id()));
    assert_eq!(
        alice.device(&bob_id.id()).unwrap().last_message().map(|m| m.into_body()),
        Some("yo".to_string())
    );

    alice.enter_background().await.unwrap();
    assert_eq!(state_of(&alice, &bob_id), ConnectionState::NotConnected);
    wait_until("bob to notice alice leaving", || {
        state_of(&bob, &alice_id) == ConnectionState::NotConnected
    })
    .await;
    assert!(alice.send(&bob_id.id(), "still there?").await.is_err());

    alice.enter_foreground().await.unwrap();
    wait_until("reconnection after foreground", || {
        state_of(&alice, &bob_id) == ConnectionState::Connected
            && state_of(&bob, &alice_id) == ConnectionState::Connected
    })
    .await;

    alice.stop().await.unwrap();
    bob.stop().await.unwrap();
}

#[tokio::test]
async fn test_registry_holds_one_device_per_peer() {
    let mesh = LocalMesh::default();
    let ids: Vec<_> = (1..=4).map(|i| identity(i, "same-name")).collect();
    let mut nodes: Vec<_> = ids
        .iter()
        .map(|id| node_on(&mesh, id.clone(), NodeConfig::new("same-name")))
        .collect();

    for node in nodes.iter_mut() {
        node.start().await.unwrap();
    }

    wait_until("full mesh", || {
        nodes.iter().all(|node| node.connected_devices().len() == ids.len() - 1)
    })
    .await;

    for node in &nodes {
        assert_eq!(node.devices().len(), ids.len() - 1);
        assert!(node.device(&node.local_identity().id()).is_none());
    }
}

#[tokio::test]
async fn test_service_types_do_not_mix() {
    let mesh = LocalMesh::default();
    let alice_id = identity(1, "alice");
    let bob_id = identity(2, "bob");
    let mut alice = node_on(&mesh, alice_id, NodeConfig::new("alice").with_service_type("chat"));
    let mut bob = node_on(&mesh, bob_id, NodeConfig::new("bob").with_service_type("files"));

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(alice.devices().is_empty());
    assert!(bob.devices().is_empty());
    assert_eq!(mesh.service_of(&identity(1, "alice").id()), Some("chat".to_string()));
    assert_eq!(mesh.service_of(&identity(2, "bob").id()), Some("files".to_string()));
}

#[tokio::test]
async fn test_peers_see_the_identity_the_node_reports() {
    let mesh = LocalMesh::default();
    let mut alice = PeerNode::builder(mesh.endpoint())
        .with_config(NodeConfig::new("alice"))
        .build()
        .unwrap();
    let bob_id = identity(2, "bob");
    let mut bob = node_on(&mesh, bob_id.clone(), NodeConfig::new("bob"));

    alice.start().await.unwrap();
    bob.start().await.unwrap();

    let alice_id = alice.local_identity().clone();
    wait_until("bob to connect to alice", || {
        state_of(&bob, &alice_id) == ConnectionState::Connected
    })
    .await;
    assert_eq!(bob.device(&alice_id.id()).unwrap().display_name(), "alice");
    assert_eq!(mesh.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_lost_invitations_time_out() {
    let mesh = LocalMesh::new(MeshConfig::lossy(1.0, 42));
    let alice_id = identity(1, "alice");
    let bob_id = identity(2, "bob");
    let session = SessionConfig::default().with_connect_timeout(Duration::from_secs(10));
    let mut alice = node_on(&mesh, alice_id.clone(), NodeConfig::new("alice").with_session(session.clone()));
    let mut bob = node_on(&mesh, bob_id.clone(), NodeConfig::new("bob").with_session(session));
    let mut alice_events = alice.subscribe();

    alice.start().await.unwrap();
    bob.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(state_of(&alice, &bob_id), ConnectionState::Connecting);

    tokio::time::sleep(Duration::from_secs(11)).await;

    assert_eq!(state_of(&alice, &bob_id), ConnectionState::NotConnected);
    assert_eq!(state_of(&bob, &alice_id), ConnectionState::NotConnected);
    assert_eq!(alice.stats().connect_timeouts, 1);

    let changes: Vec<_> = alice_events
        .drain()
        .into_iter()
        .filter_map(|event| match event {
            PeerEvent::DeviceStateChanged { state, .. } => Some(state),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![ConnectionState::NotConnected]);
}

#[tokio::test]
async fn test_nodes_share_nothing_but_the_mesh() {
    let mesh = LocalMesh::default();
    let alice = node_on(&mesh, identity(1, "alice"), NodeConfig::new("alice"));
    let bob = node_on(&mesh, identity(2, "bob"), NodeConfig::new("bob"));

    assert!(!Arc::ptr_eq(alice.session_manager(), bob.session_manager()));
    assert!(mesh.is_empty());
}

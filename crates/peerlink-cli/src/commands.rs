//! Command handlers for the PeerLink CLI

use std::time::Duration;

use peerlink_core::{EventSubscription, StaticIdentity};
use peerlink_harness::LocalMesh;
use peerlink_runtime::{PeerEvent, PeerId, PeerIdentity, PeerNode};
use tokio::time::{sleep, Instant};
use tracing::{info, warn};

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::{CliError, Result};

/// How often the simulation checks whether the mesh has settled
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Grace period for in-flight messages before reading subscriptions
const DELIVERY_GRACE: Duration = Duration::from_millis(200);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        match cli.command {
            Commands::Simulate {
                peers,
                rounds,
                duration_secs,
            } => {
                Self::handle_simulate_command(&config, peers, rounds, Duration::from_secs(duration_secs))
                    .await
            }
            Commands::Config => Self::handle_config_command(&config),
        }
    }

    /// Print the effective configuration
    fn handle_config_command(config: &AppConfig) -> Result<()> {
        print!("{}", config.to_toml_string()?);
        Ok(())
    }

    /// Run `peers` nodes on an in-memory mesh, let them connect, exchange
    /// greetings, then send every node to the background.
    async fn handle_simulate_command(
        config: &AppConfig,
        peers: usize,
        rounds: usize,
        settle_limit: Duration,
    ) -> Result<()> {
        if peers < 2 {
            return Err(CliError::Config(
                "a simulation needs at least two peers".to_string(),
            ));
        }

        let mesh = LocalMesh::new(config.mesh_config());
        let mut nodes = Vec::with_capacity(peers);
        let mut subscriptions = Vec::with_capacity(peers);

        for index in 0..peers {
            let node = Self::build_node(&mesh, config, index)?;
            subscriptions.push(node.subscribe());
            nodes.push(node);
        }
        for node in nodes.iter_mut() {
            node.start().await?;
        }
        println!("Started {} nodes on service '{}'", peers, config.node.service_type);

        let deadline = Instant::now() + settle_limit;
        while Instant::now() < deadline
            && !nodes
                .iter()
                .all(|node| node.connected_devices().len() == peers - 1)
        {
            sleep(POLL_INTERVAL).await;
        }
        let links: usize = nodes.iter().map(|node| node.connected_devices().len()).sum();
        if links < peers * (peers - 1) {
            warn!(
                "Mesh did not fully connect within {:?} ({} of {} links)",
                settle_limit,
                links,
                peers * (peers - 1)
            );
        }

        for round in 1..=rounds {
            for node in &nodes {
                for device in node.connected_devices() {
                    let text = format!(
                        "hello #{} from {}",
                        round,
                        node.local_identity().display_name()
                    );
                    if let Err(e) = node.send(&device.peer_id(), text).await {
                        warn!("{} could not greet {}: {}", node.local_identity(), device.identity(), e);
                    }
                }
            }
        }
        sleep(DELIVERY_GRACE).await;

        for (node, events) in nodes.iter().zip(subscriptions.iter_mut()) {
            Self::print_messages(node, events);
        }
        for node in &nodes {
            Self::print_device_table(node);
            println!("  stats: {}", serde_json::to_string(&node.stats())?);
        }

        for node in nodes.iter_mut() {
            node.enter_background().await?;
        }
        let still_connected: usize = nodes.iter().map(|node| node.connected_devices().len()).sum();
        println!(
            "All nodes backgrounded; {} connections remain",
            still_connected
        );

        for node in nodes.iter_mut() {
            node.stop().await?;
        }
        info!("Simulation finished");
        Ok(())
    }

    fn build_node(mesh: &LocalMesh, config: &AppConfig, index: usize) -> Result<PeerNode> {
        let name = format!("{}-{}", config.node.display_name, index + 1);
        let peer_id = match config.peer_id()? {
            Some(peer_id) if index == 0 => peer_id,
            _ => PeerId::random(),
        };
        let identity = PeerIdentity::new(peer_id, name.clone());

        let mut node_config = config.node_config();
        node_config.display_name = name;

        let node = PeerNode::builder(mesh.endpoint())
            .with_config(node_config)
            .with_identity_provider(StaticIdentity::new(identity))
            .build()?;
        Ok(node)
    }

    fn print_messages(node: &PeerNode, events: &mut EventSubscription) {
        for event in events.drain() {
            if let PeerEvent::MessageReceived { message, from } = event {
                println!(
                    "[{}] {}: {}",
                    node.local_identity().display_name(),
                    from.display_name(),
                    message.body()
                );
            }
        }
    }

    fn print_device_table(node: &PeerNode) {
        println!("{}", node.local_identity());
        let mut devices = node.devices();
        devices.sort_by_key(|device| device.display_name().to_string());
        if devices.is_empty() {
            println!("  no devices discovered");
        }
        for device in devices {
            println!(
                "  {:<16} {:<16} {:<14} {}",
                device.display_name(),
                device.peer_id(),
                device.connection_state(),
                device
                    .last_message()
                    .map(|message| message.into_body())
                    .unwrap_or_else(|| "-".to_string())
            );
        }
    }
}

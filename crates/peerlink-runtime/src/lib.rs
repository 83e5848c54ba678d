//! PeerLink Runtime
//!
//! Turns the pieces in `peerlink-core` into a running node:
//! - `PeerNode`: lifecycle (start/stop, background/foreground) and the
//!   application-facing connect/send/subscribe API
//! - the transport event pump feeding the session manager
//! - `NodeConfig`: display name, discovery service type and session policy

mod pump;

pub mod config;
pub mod node;

pub use config::{NodeConfig, DEFAULT_DISPLAY_NAME, DEFAULT_SERVICE_TYPE};
pub use node::{PeerNode, PeerNodeBuilder};

// Re-export core types for convenience
pub use peerlink_core::{
    ConnectOutcome, ConnectionState, Device, EventSubscription, Message, PeerEvent, PeerId,
    PeerIdentity, PeerLinkError, PeerLinkResult, SessionConfig, SessionStatsSnapshot, Transport,
};

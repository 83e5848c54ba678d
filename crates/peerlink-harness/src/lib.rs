//! PeerLink Harness
//!
//! An in-memory local network for running several PeerLink nodes in one
//! process, without radios.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use peerlink_harness::LocalMesh;
//! use peerlink_core::{PeerId, PeerIdentity, Transport};
//!
//! let mesh = LocalMesh::default();
//! let alice = mesh.endpoint();
//! let bob = mesh.endpoint();
//!
//! alice.advertise(&PeerIdentity::new(PeerId::random(), "alice"), "chat").await?;
//! // bob's event receiver now yields PeerFound(alice)
//! bob.browse(&PeerIdentity::new(PeerId::random(), "bob"), "chat").await?;
//! ```

pub mod mesh;

pub use mesh::{LocalMesh, MeshConfig, MeshEndpoint};

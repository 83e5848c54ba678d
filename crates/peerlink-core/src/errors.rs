//! Error types for PeerLink
//!
//! Transport failures, codec failures and the unified [`PeerLinkError`]
//! returned by the application-facing operations.

use thiserror::Error;

use crate::types::PeerId;

// ----------------------------------------------------------------------------
// Specific Error Types
// ----------------------------------------------------------------------------

/// Failures reported by a transport implementation
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Transport is not available: {reason}")]
    Unavailable { reason: String },
    #[error("Transport has not been started")]
    NotStarted,
    #[error("Invitation to peer {peer_id} was rejected")]
    InvitationRejected { peer_id: PeerId },
    #[error("Link to peer {peer_id} lost")]
    LinkLost { peer_id: PeerId },
    #[error("Send to peer {peer_id} failed: {reason}")]
    SendFailed { peer_id: PeerId, reason: String },
    #[error("Network I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether this failure means the session with the peer is gone
    pub fn is_link_loss(&self) -> bool {
        matches!(self, TransportError::LinkLost { .. })
    }
}

/// Failures encoding or decoding a message payload
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Failed to encode message: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("Malformed message payload: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("Message payload too large: {size} bytes (max: {max_size})")]
    TooLarge { size: usize, max_size: usize },
}

// ----------------------------------------------------------------------------
// Main Error Type
// ----------------------------------------------------------------------------

/// Unified error type for PeerLink operations
#[derive(Debug, Error)]
pub enum PeerLinkError {
    #[error("Peer {peer_id} is not connected")]
    NotConnected { peer_id: PeerId },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Connection to peer {peer_id} timed out")]
    ConnectTimeout { peer_id: PeerId },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Node is already running")]
    AlreadyRunning,

    #[error("Node is not running")]
    NotRunning,
}

impl PeerLinkError {
    /// Create a configuration error
    pub fn config<T: Into<String>>(reason: T) -> Self {
        PeerLinkError::Config {
            reason: reason.into(),
        }
    }
}

/// Result type for PeerLink operations
pub type PeerLinkResult<T> = core::result::Result<T, PeerLinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_loss_classification() {
        let peer_id = PeerId::new([1; 8]);
        assert!(TransportError::LinkLost { peer_id }.is_link_loss());
        assert!(!TransportError::SendFailed {
            peer_id,
            reason: "buffer full".into()
        }
        .is_link_loss());
    }

    #[test]
    fn test_error_messages_name_the_peer() {
        let peer_id = PeerId::new([0xab; 8]);
        let err = PeerLinkError::NotConnected { peer_id };
        assert_eq!(err.to_string(), "Peer abababababababab is not connected");

        let err: PeerLinkError = TransportError::NotStarted.into();
        assert!(matches!(err, PeerLinkError::Transport(_)));
    }
}

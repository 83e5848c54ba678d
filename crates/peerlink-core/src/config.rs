//! Session configuration

use core::time::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::{PeerLinkError, PeerLinkResult};

/// Default bound on how long an outbound invitation may stay unanswered
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ----------------------------------------------------------------------------
// Session Configuration
// ----------------------------------------------------------------------------

/// Policy knobs for the session manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum time an outbound invitation may take to reach `Connected`
    pub connect_timeout: Duration,
    /// Accept every inbound invitation without consulting the application
    pub auto_accept_invitations: bool,
    /// Cap on simultaneously outstanding outbound invitations (`None` = unlimited)
    pub max_pending_invitations: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auto_accept_invitations: true,
            max_pending_invitations: None,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable automatic acceptance of inbound invitations
    pub fn with_auto_accept_invitations(mut self, enabled: bool) -> Self {
        self.auto_accept_invitations = enabled;
        self
    }

    /// Limit the number of outbound invitations in flight
    pub fn with_max_pending_invitations(mut self, limit: Option<usize>) -> Self {
        self.max_pending_invitations = limit;
        self
    }

    /// Reject settings the session manager cannot honour
    pub fn validate(&self) -> PeerLinkResult<()> {
        if self.connect_timeout.is_zero() {
            return Err(PeerLinkError::config("connect_timeout must be non-zero"));
        }
        if self.max_pending_invitations == Some(0) {
            return Err(PeerLinkError::config(
                "max_pending_invitations must be at least 1 when set",
            ));
        }
        Ok(())
    }
}

//! Node configuration

use peerlink_core::{PeerLinkError, PeerLinkResult, SessionConfig};
use serde::{Deserialize, Serialize};

/// Service type advertised when none is configured
pub const DEFAULT_SERVICE_TYPE: &str = "peerlink";

/// Display name used when none is configured
pub const DEFAULT_DISPLAY_NAME: &str = "PeerLink";

/// Longest service type accepted by local-network discovery
pub const MAX_SERVICE_TYPE_LEN: usize = 15;

/// Longest display name, in UTF-8 bytes
pub const MAX_DISPLAY_NAME_LEN: usize = 63;

/// Configuration for a [`PeerNode`](crate::PeerNode)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Name shown to other peers
    pub display_name: String,
    /// Discovery namespace; only nodes sharing it see each other
    pub service_type: String,
    pub session: SessionConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
            session: SessionConfig::default(),
        }
    }
}

impl NodeConfig {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Self::default()
        }
    }

    pub fn with_service_type(mut self, service_type: impl Into<String>) -> Self {
        self.service_type = service_type.into();
        self
    }

    pub fn with_session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    pub fn validate(&self) -> PeerLinkResult<()> {
        if self.display_name.trim().is_empty() {
            return Err(PeerLinkError::config("display name must not be empty"));
        }
        if self.display_name.len() > MAX_DISPLAY_NAME_LEN {
            return Err(PeerLinkError::config(format!(
                "display name is {} bytes, limit is {}",
                self.display_name.len(),
                MAX_DISPLAY_NAME_LEN
            )));
        }
        validate_service_type(&self.service_type)?;
        self.session.validate()
    }
}

/// 1-15 characters of lowercase ASCII letters, digits and hyphens
pub fn validate_service_type(service_type: &str) -> PeerLinkResult<()> {
    if service_type.is_empty() || service_type.len() > MAX_SERVICE_TYPE_LEN {
        return Err(PeerLinkError::config(format!(
            "service type '{}' must be 1-{} characters",
            service_type, MAX_SERVICE_TYPE_LEN
        )));
    }
    let valid = service_type
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !valid {
        return Err(PeerLinkError::config(format!(
            "service type '{}' may only contain lowercase letters, digits and '-'",
            service_type
        )));
    }
    Ok(())
}

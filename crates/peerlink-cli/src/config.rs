//! PeerLink CLI Configuration
//!
//! Configuration is read from a TOML file when `--config` is given and falls
//! back to defaults otherwise. Every section and field is optional:
//!
//! ```toml
//! [node]
//! display_name = "desk"
//! service_type = "peerlink"
//!
//! [session]
//! connect_timeout_secs = 10
//! auto_accept_invitations = true
//! max_pending_invitations = 4
//!
//! [identity]
//! peer_id = "0102030405060708"
//!
//! [simulation]
//! invitation_loss_rate = 0.0
//! seed = 7
//! ```

use std::path::Path;
use std::time::Duration;

use peerlink_core::{PeerId, SessionConfig, DEFAULT_CONNECT_TIMEOUT};
use peerlink_harness::MeshConfig;
use peerlink_runtime::{NodeConfig, DEFAULT_DISPLAY_NAME, DEFAULT_SERVICE_TYPE};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the PeerLink CLI
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub node: NodeSection,
    pub session: SessionSection,
    pub identity: IdentitySection,
    pub simulation: SimulationSection,
}

/// How this node presents itself
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub display_name: String,
    pub service_type: String,
}

/// Session manager policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub connect_timeout_secs: u64,
    pub auto_accept_invitations: bool,
    pub max_pending_invitations: Option<usize>,
}

/// Fixed identity for the first node (hex peer id, 16 characters)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySection {
    pub peer_id: Option<String>,
}

/// Conditions of the simulated network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub invitation_loss_rate: f64,
    pub seed: Option<u64>,
}

// ----------------------------------------------------------------------------
// Default Implementations
// ----------------------------------------------------------------------------

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            service_type: DEFAULT_SERVICE_TYPE.to_string(),
        }
    }
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT.as_secs(),
            auto_accept_invitations: true,
            max_pending_invitations: None,
        }
    }
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            invitation_loss_rate: 0.0,
            seed: None,
        }
    }
}

// ----------------------------------------------------------------------------
// Loading and Conversion
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load and validate configuration from a TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.peer_id()?;

        let rate = self.simulation.invitation_loss_rate;
        if !(0.0..=1.0).contains(&rate) {
            return Err(CliError::Config(format!(
                "invitation_loss_rate must be between 0 and 1, got {}",
                rate
            )));
        }

        self.node_config().validate()?;
        Ok(())
    }

    /// Configured peer id, if any
    pub fn peer_id(&self) -> Result<Option<PeerId>> {
        self.identity
            .peer_id
            .as_deref()
            .map(|peer_id| peer_id.parse::<PeerId>())
            .transpose()
            .map_err(CliError::from)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig::default()
            .with_connect_timeout(Duration::from_secs(self.session.connect_timeout_secs))
            .with_auto_accept_invitations(self.session.auto_accept_invitations)
            .with_max_pending_invitations(self.session.max_pending_invitations)
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig::new(self.node.display_name.clone())
            .with_service_type(self.node.service_type.clone())
            .with_session(self.session_config())
    }

    pub fn mesh_config(&self) -> MeshConfig {
        MeshConfig {
            invitation_loss_rate: self.simulation.invitation_loss_rate,
            seed: self.simulation.seed,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

//! Device registry
//!
//! The canonical, deduplicated set of known peers. Records are never removed
//! while the node lives: disconnecting only changes state, so history such as
//! the last message survives and a returning peer maps to its old record.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::device::{ConnectionState, Device};
use crate::types::{PeerId, PeerIdentity};

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: DashMap<PeerId, Arc<Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the device for `identity`, creating it in `NotConnected` if unknown.
    ///
    /// Concurrent calls for the same identity resolve to a single instance.
    pub fn get_or_create(&self, identity: &PeerIdentity) -> Arc<Device> {
        self.devices
            .entry(identity.id())
            .or_insert_with(|| {
                debug!("Registering new device {}", identity);
                Arc::new(Device::new(identity.clone()))
            })
            .value()
            .clone()
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<Arc<Device>> {
        self.devices.get(peer_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every known device
    pub fn all(&self) -> Vec<Arc<Device>> {
        self.devices
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Snapshot of the devices currently `Connected`
    pub fn connected(&self) -> Vec<Arc<Device>> {
        self.devices
            .iter()
            .filter(|entry| entry.value().connection_state() == ConnectionState::Connected)
            .map(|entry| entry.value().clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

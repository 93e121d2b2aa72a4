// # Memory Port Store
//
// In-memory implementation of PortStore, backed by a `PortSnapshot`.
//
// The snapshot type is shared with the file-backed store, which reads the
// same shape from disk.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::Error;
use crate::config::AgentConfig;
use crate::model::{BindingLevel, Network, Port, PortFilter, Segment};
use crate::traits::{PortStore, PortStoreFactory};

/// A consistent view of the network plane's records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSnapshot {
    #[serde(default)]
    pub networks: Vec<Network>,
    #[serde(default)]
    pub ports: Vec<Port>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub binding_levels: Vec<BindingLevel>,
}

impl PortSnapshot {
    pub fn ports(&self, filter: &PortFilter) -> Vec<Port> {
        self.ports
            .iter()
            .filter(|port| filter.matches(port))
            .cloned()
            .collect()
    }

    pub fn network(&self, network_id: &str) -> Option<Network> {
        self.networks.iter().find(|n| n.id == network_id).cloned()
    }

    pub fn binding_levels(&self, port_id: &str, host: &str) -> Vec<BindingLevel> {
        let mut levels: Vec<BindingLevel> = self
            .binding_levels
            .iter()
            .filter(|b| b.port_id == port_id && b.host == host)
            .cloned()
            .collect();
        levels.sort_by_key(|b| b.level);
        levels
    }

    pub fn segment(&self, segment_id: &str) -> Option<Segment> {
        self.segments.iter().find(|s| s.id == segment_id).cloned()
    }
}

/// In-memory port store
///
/// Clones share the same records, so tests can mutate the store while an
/// agent is reading from it.
#[derive(Debug, Clone, Default)]
pub struct MemoryPortStore {
    snapshot: Arc<RwLock<PortSnapshot>>,
}

impl MemoryPortStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: PortSnapshot) -> Self {
        Self {
            snapshot: Arc::new(RwLock::new(snapshot)),
        }
    }

    /// Insert or replace a network
    pub async fn add_network(&self, network: Network) {
        let mut guard = self.snapshot.write().await;
        guard.networks.retain(|n| n.id != network.id);
        guard.networks.push(network);
    }

    /// Insert or replace a port
    pub async fn add_port(&self, port: Port) {
        let mut guard = self.snapshot.write().await;
        guard.ports.retain(|p| p.id != port.id);
        guard.ports.push(port);
    }

    /// Insert or replace a segment
    pub async fn add_segment(&self, segment: Segment) {
        let mut guard = self.snapshot.write().await;
        guard.segments.retain(|s| s.id != segment.id);
        guard.segments.push(segment);
    }

    pub async fn add_binding_level(&self, level: BindingLevel) {
        self.snapshot.write().await.binding_levels.push(level);
    }

    /// Remove a port and its binding levels
    pub async fn remove_port(&self, port_id: &str) {
        let mut guard = self.snapshot.write().await;
        guard.ports.retain(|p| p.id != port_id);
        guard.binding_levels.retain(|b| b.port_id != port_id);
    }

    /// Change the segmentation id of a segment
    pub async fn set_segmentation_id(&self, segment_id: &str, segmentation_id: u32) -> bool {
        let mut guard = self.snapshot.write().await;
        match guard.segments.iter_mut().find(|s| s.id == segment_id) {
            Some(segment) => {
                segment.segmentation_id = Some(segmentation_id);
                true
            }
            None => false,
        }
    }

    pub async fn snapshot(&self) -> PortSnapshot {
        self.snapshot.read().await.clone()
    }
}

#[async_trait]
impl PortStore for MemoryPortStore {
    async fn list_ports(&self, filter: &PortFilter) -> Result<Vec<Port>, Error> {
        Ok(self.snapshot.read().await.ports(filter))
    }

    async fn get_network(&self, network_id: &str) -> Result<Option<Network>, Error> {
        Ok(self.snapshot.read().await.network(network_id))
    }

    async fn get_binding_levels(
        &self,
        port_id: &str,
        host: &str,
    ) -> Result<Vec<BindingLevel>, Error> {
        Ok(self.snapshot.read().await.binding_levels(port_id, host))
    }

    async fn get_segment_by_id(&self, segment_id: &str) -> Result<Option<Segment>, Error> {
        Ok(self.snapshot.read().await.segment(segment_id))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for the in-memory port store
pub struct MemoryPortStoreFactory;

impl PortStoreFactory for MemoryPortStoreFactory {
    fn create(&self, _config: &AgentConfig) -> Result<Box<dyn PortStore>, Error> {
        Ok(Box::new(MemoryPortStore::new()))
    }
}

// # Memory Device Gateway
//
// In-memory implementation of DeviceGateway.
//
// Nothing reaches a real appliance. Useful for embedding the agent, for
// dry runs against a port store, and for tests.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::Error;
use crate::config::AgentConfig;
use crate::model::DeviceVlan;
use crate::traits::{DeviceGateway, DeviceGatewayFactory};

/// In-memory appliance
///
/// VLANs are keyed by `(folder, name)`. Clones share the same appliance.
///
/// # Example
///
/// ```rust,no_run
/// use f5_agent_core::MemoryDeviceGateway;
/// use f5_agent_core::DeviceGateway;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let gateway = MemoryDeviceGateway::new();
///     gateway.insert_vlan("Project_t1", "vlan-n1", 7).await;
///
///     gateway.update_vlan_tag("vlan-n1", "Project_t1", 42).await?;
///     assert_eq!(gateway.load_vlan("vlan-n1", "Project_t1").await?.tag, 42);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryDeviceGateway {
    vlans: Arc<RwLock<BTreeMap<(String, String), DeviceVlan>>>,
    mutations: Arc<AtomicUsize>,
}

impl MemoryDeviceGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a VLAN without counting it as a mutation
    pub async fn insert_vlan(&self, folder: &str, name: &str, tag: u16) {
        self.vlans.write().await.insert(
            (folder.to_string(), name.to_string()),
            DeviceVlan {
                name: name.to_string(),
                folder: folder.to_string(),
                tag,
            },
        );
    }

    /// Number of create/update calls that changed the appliance
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// All VLANs, ordered by folder then name
    pub async fn vlans(&self) -> Vec<DeviceVlan> {
        self.vlans.read().await.values().cloned().collect()
    }
}

#[async_trait]
impl DeviceGateway for MemoryDeviceGateway {
    async fn list_vlans(&self, folder: &str) -> Result<Vec<DeviceVlan>, Error> {
        let guard = self.vlans.read().await;
        Ok(guard
            .values()
            .filter(|vlan| vlan.folder == folder)
            .cloned()
            .collect())
    }

    async fn vlan_exists(&self, name: &str, folder: &str) -> Result<bool, Error> {
        let guard = self.vlans.read().await;
        Ok(guard.contains_key(&(folder.to_string(), name.to_string())))
    }

    async fn load_vlan(&self, name: &str, folder: &str) -> Result<DeviceVlan, Error> {
        let guard = self.vlans.read().await;
        guard
            .get(&(folder.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("VLAN /{folder}/{name}")))
    }

    async fn update_vlan_tag(&self, name: &str, folder: &str, tag: u16) -> Result<(), Error> {
        let mut guard = self.vlans.write().await;
        let vlan = guard
            .get_mut(&(folder.to_string(), name.to_string()))
            .ok_or_else(|| Error::not_found(format!("VLAN /{folder}/{name}")))?;
        vlan.tag = tag;
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_vlan(&self, name: &str, folder: &str, tag: u16) -> Result<(), Error> {
        let mut guard = self.vlans.write().await;
        let key = (folder.to_string(), name.to_string());
        if guard.contains_key(&key) {
            return Err(Error::invalid_input(format!("VLAN /{folder}/{name} already exists")));
        }
        guard.insert(
            key,
            DeviceVlan {
                name: name.to_string(),
                folder: folder.to_string(),
                tag,
            },
        );
        self.mutations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for the in-memory device gateway
pub struct MemoryDeviceGatewayFactory;

impl DeviceGatewayFactory for MemoryDeviceGatewayFactory {
    fn create(&self, _config: &AgentConfig) -> Result<Box<dyn DeviceGateway>, Error> {
        Ok(Box::new(MemoryDeviceGateway::new()))
    }
}

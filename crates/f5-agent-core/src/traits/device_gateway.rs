// # Device Gateway Trait
//
// Defines the interface to the physical load-balancer appliance.
//
// ## Implementations
//
// - iControl REST: `f5-device-icontrol` crate
// - In-memory: `MemoryDeviceGateway` (embedding, tests)
//
// ## Usage
//
// ```rust,ignore
// use f5_agent_core::DeviceGateway;
//
// let gateway = /* DeviceGateway implementation */;
// let vlan = gateway.load_vlan("vlan-4a1b2c3d-5", "Project_t1").await?;
// if vlan.tag != 100 {
//     gateway.update_vlan_tag("vlan-4a1b2c3d-5", "Project_t1", 100).await?;
// }
// ```

use async_trait::async_trait;

use crate::model::DeviceVlan;

/// Trait for device gateway implementations
///
/// VLAN objects are keyed by `(name, folder)`. Implementations must be
/// thread-safe and usable across async tasks.
///
/// ## Allowed
/// - ✅ Talk to the appliance management API
/// - ✅ Map device responses to [`crate::Error`]
///
/// ## Forbidden
/// - ❌ Retry or back off (owned by the `Reconciler`)
/// - ❌ Decide whether a mutation is needed (owned by the `Reconciler`)
/// - ❌ Cache VLAN state between calls
/// - ❌ Spawn tasks
///
/// A gateway that retries internally makes the configured API retry count
/// meaningless and can stall shutdown; return the error instead.
#[async_trait]
pub trait DeviceGateway: Send + Sync {
    /// List the VLANs configured in a folder
    async fn list_vlans(&self, folder: &str) -> Result<Vec<DeviceVlan>, crate::Error>;

    /// Check whether a VLAN exists
    ///
    /// # Returns
    ///
    /// - `Ok(true)` / `Ok(false)`: the appliance answered
    /// - `Err(Error)`: the appliance could not be asked
    async fn vlan_exists(&self, name: &str, folder: &str) -> Result<bool, crate::Error>;

    /// Read a VLAN, including its observed tag
    ///
    /// Returns `Error::NotFound` if the VLAN does not exist.
    async fn load_vlan(&self, name: &str, folder: &str) -> Result<DeviceVlan, crate::Error>;

    /// Set the tag of an existing VLAN
    async fn update_vlan_tag(&self, name: &str, folder: &str, tag: u16)
    -> Result<(), crate::Error>;

    /// Create a VLAN with the given tag
    ///
    /// Only used under the `create` missing-VLAN policy.
    async fn create_vlan(&self, name: &str, folder: &str, tag: u16) -> Result<(), crate::Error>;

    /// Driver name (for logging/debugging)
    fn driver_name(&self) -> &'static str;
}

/// Helper trait for constructing device gateways from configuration
pub trait DeviceGatewayFactory: Send + Sync {
    /// Create a DeviceGateway instance from configuration
    ///
    /// The whole agent configuration is passed so the gateway can honour
    /// the call timeout as well as its own section.
    fn create(
        &self,
        config: &crate::config::AgentConfig,
    ) -> Result<Box<dyn DeviceGateway>, crate::Error>;
}

//! Plugin-based collaborator registry
//!
//! The registry maps the `type` names found in configuration to factories,
//! so the daemon never hardcodes which appliance driver, port store or
//! control plane it talks to.
//!
//! ## Registration
//!
//! Adapter crates expose a `register` function:
//!
//! ```rust,ignore
//! // In f5-device-icontrol
//! pub fn register(registry: &AgentRegistry) {
//!     registry.register_device_gateway("icontrol", Box::new(IcontrolFactory));
//! }
//! ```

use crate::adapters::{
    FilePortStoreFactory, LogControlPlaneFactory, MemoryDeviceGatewayFactory,
    MemoryPortStoreFactory,
};
use crate::config::AgentConfig;
use crate::error::{Error, Result};
use crate::traits::{ControlPlane, DeviceGateway, NotificationSource, PortStore};
use crate::traits::{ControlPlaneFactory, DeviceGatewayFactory, PortStoreFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of collaborator factories
///
/// ## Thread Safety
///
/// Interior mutability with RwLock: concurrent reads, exclusive writes.
#[derive(Default)]
pub struct AgentRegistry {
    device_gateways: RwLock<HashMap<String, Box<dyn DeviceGatewayFactory>>>,
    port_stores: RwLock<HashMap<String, Box<dyn PortStoreFactory>>>,
    control_planes: RwLock<HashMap<String, Box<dyn ControlPlaneFactory>>>,
}

impl AgentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the adapters shipped in this crate
    ///
    /// - device gateway `memory`
    /// - port stores `memory` and `file`
    /// - control plane `log`
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register_device_gateway("memory", Box::new(MemoryDeviceGatewayFactory));
        registry.register_port_store("memory", Box::new(MemoryPortStoreFactory));
        registry.register_port_store("file", Box::new(FilePortStoreFactory));
        registry.register_control_plane("log", Box::new(LogControlPlaneFactory));
        registry
    }

    /// Register a device gateway factory under `name`
    pub fn register_device_gateway(
        &self,
        name: impl Into<String>,
        factory: Box<dyn DeviceGatewayFactory>,
    ) {
        let mut gateways = self
            .device_gateways
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        gateways.insert(name.into(), factory);
    }

    /// Register a port store factory under `name`
    pub fn register_port_store(&self, name: impl Into<String>, factory: Box<dyn PortStoreFactory>) {
        let mut stores = self
            .port_stores
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Register a control plane factory under `name`
    pub fn register_control_plane(
        &self,
        name: impl Into<String>,
        factory: Box<dyn ControlPlaneFactory>,
    ) {
        let mut planes = self
            .control_planes
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        planes.insert(name.into(), factory);
    }

    /// Create the device gateway selected by `config.device`
    ///
    /// # Errors
    ///
    /// `Error::Config` if the type is not registered; otherwise whatever the
    /// factory returns.
    pub fn create_device_gateway(&self, config: &AgentConfig) -> Result<Box<dyn DeviceGateway>> {
        let device_type = config.device.type_name();
        let gateways = self
            .device_gateways
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = gateways
            .get(device_type)
            .ok_or_else(|| Error::config(format!("Unknown device driver: {}", device_type)))?;

        factory.create(config)
    }

    /// Create the port store selected by `config.port_store`
    pub fn create_port_store(&self, config: &AgentConfig) -> Result<Box<dyn PortStore>> {
        let store_type = config.port_store.type_name();
        let stores = self
            .port_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown port store type: {}", store_type)))?;

        factory.create(config)
    }

    /// Create the control plane selected by `config.control_plane`
    pub fn create_control_plane(&self, config: &AgentConfig) -> Result<Box<dyn ControlPlane>> {
        let plane_type = config.control_plane.type_name();
        let planes = self
            .control_planes
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = planes
            .get(plane_type)
            .ok_or_else(|| Error::config(format!("Unknown control plane type: {}", plane_type)))?;

        factory.create(config)
    }

    /// Create the notification transport paired with the configured control plane
    ///
    /// `Ok(None)` when the control plane has no message transport.
    pub fn create_notification_source(
        &self,
        config: &AgentConfig,
    ) -> Result<Option<Box<dyn NotificationSource>>> {
        let plane_type = config.control_plane.type_name();
        let planes = self
            .control_planes
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = planes
            .get(plane_type)
            .ok_or_else(|| Error::config(format!("Unknown control plane type: {}", plane_type)))?;

        factory.create_notification_source(config)
    }

    pub fn list_device_gateways(&self) -> Vec<String> {
        let gateways = self
            .device_gateways
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        gateways.keys().cloned().collect()
    }

    pub fn list_port_stores(&self) -> Vec<String> {
        let stores = self
            .port_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    pub fn list_control_planes(&self) -> Vec<String> {
        let planes = self
            .control_planes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        planes.keys().cloned().collect()
    }

    pub fn has_device_gateway(&self, name: &str) -> bool {
        let gateways = self
            .device_gateways
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        gateways.contains_key(name)
    }

    pub fn has_port_store(&self, name: &str) -> bool {
        let stores = self
            .port_stores
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }

    pub fn has_control_plane(&self, name: &str) -> bool {
        let planes = self
            .control_planes
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        planes.contains_key(name)
    }
}

//! Deterministic VLAN identity on the appliance
//!
//! The (folder, name) pair is the contract between the reconciler and the
//! device: it must not change between releases for an existing network.

use crate::config::NamingConfig;
use crate::error::{Error, Result};
use crate::model::Network;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every VLAN object created for a network
pub const VLAN_NAME_PREFIX: &str = "vlan-";

/// Number of network id characters kept in the VLAN name
pub const NETWORK_ID_CHARS: usize = 10;

/// Folder shared by all tenants in global routed mode
pub const COMMON_FOLDER: &str = "Common";

/// Where a network's VLAN lives on the appliance
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VlanIdentity {
    pub folder: String,
    pub name: String,
}

impl fmt::Display for VlanIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.folder, self.name)
    }
}

/// Derives folder and name from network identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlanNaming {
    environment_prefix: String,
    global_routed_mode: bool,
}

impl VlanNaming {
    pub fn new(environment_prefix: impl Into<String>, global_routed_mode: bool) -> Self {
        Self {
            environment_prefix: environment_prefix.into(),
            global_routed_mode,
        }
    }

    /// Folder for a tenant
    pub fn folder(&self, tenant_id: &str) -> Result<String> {
        if self.global_routed_mode {
            return Ok(COMMON_FOLDER.to_string());
        }
        if tenant_id.is_empty() {
            return Err(Error::invalid_input("network has no tenant"));
        }
        Ok(format!("{}_{}", self.environment_prefix, tenant_id))
    }

    /// VLAN name for a network id
    pub fn vlan_name(&self, network_id: &str) -> Result<String> {
        if network_id.is_empty() {
            return Err(Error::invalid_input("empty network id"));
        }
        let short: String = network_id.chars().take(NETWORK_ID_CHARS).collect();
        Ok(format!("{VLAN_NAME_PREFIX}{short}"))
    }

    /// Full identity of the VLAN backing `network`
    pub fn identity(&self, network: &Network) -> Result<VlanIdentity> {
        Ok(VlanIdentity {
            folder: self.folder(&network.tenant_id)?,
            name: self.vlan_name(&network.id)?,
        })
    }
}

impl From<&NamingConfig> for VlanNaming {
    fn from(config: &NamingConfig) -> Self {
        Self::new(config.environment_prefix.clone(), config.global_routed_mode)
    }
}

//! Records exchanged with the port store, the appliance and the controller
//!
//! None of these are cached across reconciliation cycles; every cycle reads
//! them fresh from the collaborators that own them.

use serde::{Deserialize, Serialize};

/// Binary name reported in the agent state
pub const AGENT_BINARY: &str = "neutron-f5-agent";

/// Agent type the mechanism driver matches against
pub const AGENT_TYPE: &str = "F5 ML2 agent";

/// Topic field of the agent state
pub const AGENT_TOPIC: &str = "N/A";

/// Driver name stamped on binding levels created for this integration
pub const DRIVER_NAME: &str = "f5ml2";

/// The only network type with a VLAN representation on the appliance
pub const NETWORK_TYPE_VLAN: &str = "vlan";

/// Highest usable 802.1Q tag
pub const MAX_VLAN_TAG: u16 = 4094;

/// A port known to the network plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Port identifier
    pub id: String,
    /// Owning network
    pub network_id: String,
    /// Host the port is bound to
    #[serde(default)]
    pub host: Option<String>,
    /// Device owner, e.g. `network:f5lbaasv2`
    #[serde(default)]
    pub device_owner: String,
}

impl Port {
    pub fn new(
        id: impl Into<String>,
        network_id: impl Into<String>,
        host: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            network_id: network_id.into(),
            host: Some(host.into()),
            device_owner: String::new(),
        }
    }

    pub fn with_device_owner(mut self, owner: impl Into<String>) -> Self {
        self.device_owner = owner.into();
        self
    }
}

/// Filter accepted by [`crate::PortStore::list_ports`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PortFilter {
    /// Only ports bound to this host
    pub host: Option<String>,
}

impl PortFilter {
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            host: Some(host.into()),
        }
    }

    pub fn matches(&self, port: &Port) -> bool {
        match &self.host {
            Some(host) => port.host.as_deref() == Some(host.as_str()),
            None => true,
        }
    }
}

/// A network; its tenant decides the appliance folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    /// Owning tenant (project)
    pub tenant_id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl Network {
    pub fn new(id: impl Into<String>, tenant_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            name: None,
        }
    }
}

/// A logical slice of a network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: String,
    pub network_id: String,
    /// `vlan`, `vxlan`, `flat`, ...
    pub network_type: String,
    /// Desired VLAN tag for `vlan` segments
    #[serde(default)]
    pub segmentation_id: Option<u32>,
    #[serde(default)]
    pub physical_network: Option<String>,
}

impl Segment {
    pub fn vlan(
        id: impl Into<String>,
        network_id: impl Into<String>,
        segmentation_id: u32,
        physical_network: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            network_id: network_id.into(),
            network_type: NETWORK_TYPE_VLAN.to_string(),
            segmentation_id: Some(segmentation_id),
            physical_network: Some(physical_network.into()),
        }
    }

    pub fn is_vlan(&self) -> bool {
        self.network_type.eq_ignore_ascii_case(NETWORK_TYPE_VLAN)
    }

    /// The segmentation id as an 802.1Q tag, if it is one
    pub fn vlan_tag(&self) -> Option<u16> {
        self.segmentation_id
            .and_then(|id| u16::try_from(id).ok())
            .filter(|tag| (1..=MAX_VLAN_TAG).contains(tag))
    }
}

/// Which driver bound a port to which segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingLevel {
    pub port_id: String,
    pub host: String,
    /// Position in a hierarchical binding (0 = top)
    #[serde(default)]
    pub level: u8,
    /// Name of the mechanism driver that created this level
    pub driver: String,
    #[serde(default)]
    pub segment_id: Option<String>,
}

impl BindingLevel {
    pub fn new(
        port_id: impl Into<String>,
        host: impl Into<String>,
        driver: impl Into<String>,
        segment_id: impl Into<String>,
    ) -> Self {
        Self {
            port_id: port_id.into(),
            host: host.into(),
            level: 0,
            driver: driver.into(),
            segment_id: Some(segment_id.into()),
        }
    }

    pub fn with_level(mut self, level: u8) -> Self {
        self.level = level;
        self
    }
}

/// A VLAN object resident on the appliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceVlan {
    pub name: String,
    /// Folder (partition) the VLAN lives in
    pub folder: String,
    pub tag: u16,
}

/// Status record sent on every heartbeat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentState {
    pub binary: String,
    pub host: String,
    pub topic: String,
    pub agent_type: String,
    /// Snapshot of the effective configuration
    pub configurations: serde_json::Value,
    /// Present only until the first successful report
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_flag: Option<bool>,
}

impl AgentState {
    pub fn new(host: impl Into<String>, configurations: serde_json::Value) -> Self {
        Self {
            binary: AGENT_BINARY.to_string(),
            host: host.into(),
            topic: AGENT_TOPIC.to_string(),
            agent_type: AGENT_TYPE.to_string(),
            configurations,
            start_flag: Some(true),
        }
    }
}

/// Controller answer to a device list update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceListResult {
    #[serde(default)]
    pub devices_up: Vec<String>,
    #[serde(default)]
    pub devices_down: Vec<String>,
    #[serde(default)]
    pub failed_devices_up: Vec<String>,
    #[serde(default)]
    pub failed_devices_down: Vec<String>,
}

/// Agent id used for device list updates
pub fn agent_id(host: &str) -> String {
    format!("f5-agent-{host}")
}

//! Configuration types for the F5 agent
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Main agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Loop, heartbeat and retry settings
    pub agent: AgentSettings,

    /// Device gateway selection and credentials
    pub device: DeviceConfig,

    /// Port store selection
    #[serde(default)]
    pub port_store: PortStoreConfig,

    /// Control plane selection
    #[serde(default)]
    pub control_plane: ControlPlaneConfig,

    /// VLAN folder/name derivation
    #[serde(default)]
    pub naming: NamingConfig,

    /// Physical networks this appliance is wired to
    ///
    /// Empty accepts the first available segment.
    #[serde(default)]
    pub physical_networks: Vec<String>,
}

impl AgentConfig {
    /// Create a configuration for `host` with defaults everywhere else
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            agent: AgentSettings::new(host),
            device: DeviceConfig::Memory,
            port_store: PortStoreConfig::default(),
            control_plane: ControlPlaneConfig::default(),
            naming: NamingConfig::default(),
            physical_networks: Vec::new(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.agent.validate()?;
        self.device.validate()?;
        self.port_store.validate()?;
        self.control_plane.validate()?;
        self.naming.validate()?;

        if self.physical_networks.iter().any(|p| p.trim().is_empty()) {
            return Err(crate::Error::config("Physical network names cannot be empty"));
        }

        Ok(())
    }

    /// Snapshot reported as `configurations` in the agent state
    pub fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "device_driver": self.device.type_name(),
            "polling_interval": self.agent.polling_interval_secs,
            "api_retries": self.agent.api_retries,
            "global_routed_mode": self.naming.global_routed_mode,
            "environment_prefix": self.naming.environment_prefix,
            "physical_networks": self.physical_networks,
            "missing_vlan_policy": self.agent.missing_vlan_policy.to_string(),
        })
    }
}

/// Agent loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Host identity; only ports bound to this host are reconciled
    pub host: String,

    /// Seconds between the starts of two reconciliation cycles
    #[serde(default = "default_polling_interval_secs")]
    pub polling_interval_secs: u64,

    /// Seconds between two heartbeats
    #[serde(default = "default_report_interval_secs")]
    pub report_interval_secs: u64,

    /// Upper bound for any single device, store or RPC call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Extra attempts for a failed device mutation
    #[serde(default = "default_api_retries")]
    pub api_retries: usize,

    /// Delay between mutation attempts (in seconds)
    #[serde(default = "default_retry_delay_secs")]
    pub retry_delay_secs: u64,

    /// Number of notification consumer tasks
    #[serde(default = "default_consumer_workers")]
    pub consumer_workers: usize,

    /// Capacity of the agent event channel
    ///
    /// When full, new events are dropped with a warning log.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// What to do when a network's VLAN is absent from the appliance
    #[serde(default)]
    pub missing_vlan_policy: MissingVlanPolicy,
}

impl AgentSettings {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            polling_interval_secs: default_polling_interval_secs(),
            report_interval_secs: default_report_interval_secs(),
            call_timeout_secs: default_call_timeout_secs(),
            api_retries: default_api_retries(),
            retry_delay_secs: default_retry_delay_secs(),
            consumer_workers: default_consumer_workers(),
            event_channel_capacity: default_event_channel_capacity(),
            missing_vlan_policy: MissingVlanPolicy::default(),
        }
    }

    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.host.trim().is_empty() {
            return Err(crate::Error::config("Agent host cannot be empty"));
        }
        if self.polling_interval_secs == 0 {
            return Err(crate::Error::config("Polling interval must be > 0"));
        }
        if self.report_interval_secs == 0 {
            return Err(crate::Error::config("Report interval must be > 0"));
        }
        if self.call_timeout_secs == 0 {
            return Err(crate::Error::config("Call timeout must be > 0"));
        }
        if self.consumer_workers == 0 {
            return Err(crate::Error::config("At least one consumer worker is required"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }

    pub fn polling_interval(&self) -> Duration {
        Duration::from_secs(self.polling_interval_secs)
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }
}

/// Policy for a VLAN that should exist but does not
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingVlanPolicy {
    /// Log the gap and report the port down
    #[default]
    Report,
    /// Create the VLAN with the desired tag
    Create,
}

impl fmt::Display for MissingVlanPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingVlanPolicy::Report => f.write_str("report"),
            MissingVlanPolicy::Create => f.write_str("create"),
        }
    }
}

impl FromStr for MissingVlanPolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "report" => Ok(MissingVlanPolicy::Report),
            "create" => Ok(MissingVlanPolicy::Create),
            other => Err(crate::Error::config(format!(
                "Unknown missing VLAN policy '{other}' (expected report or create)"
            ))),
        }
    }
}

/// Device gateway configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceConfig {
    /// iControl REST on a BIG-IP appliance
    Icontrol {
        /// Management address, e.g. `https://10.0.0.5`
        host: String,
        username: String,
        password: String,
        #[serde(default = "default_verify_tls")]
        verify_tls: bool,
        /// Perform reads but only log mutations
        #[serde(default)]
        dry_run: bool,
    },

    /// In-memory appliance (embedding and tests)
    Memory,

    /// Custom device gateway
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl DeviceConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            DeviceConfig::Icontrol {
                host,
                username,
                password,
                ..
            } => {
                if host.is_empty() {
                    return Err(crate::Error::config("iControl host cannot be empty"));
                }
                if !host.starts_with("https://") && !host.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "iControl host must be an http(s) URL, got: {host}"
                    )));
                }
                if username.is_empty() || password.is_empty() {
                    return Err(crate::Error::config("iControl credentials cannot be empty"));
                }
                Ok(())
            }
            DeviceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom device factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom device config cannot be null"));
                }
                Ok(())
            }
            DeviceConfig::Memory => Ok(()),
        }
    }

    /// Get the device driver name (registry key)
    pub fn type_name(&self) -> &str {
        match self {
            DeviceConfig::Icontrol { .. } => "icontrol",
            DeviceConfig::Memory => "memory",
            DeviceConfig::Custom { factory, .. } => factory,
        }
    }
}

// The password must never reach a log line
impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceConfig::Icontrol {
                host,
                username,
                verify_tls,
                dry_run,
                ..
            } => f
                .debug_struct("Icontrol")
                .field("host", host)
                .field("username", username)
                .field("password", &"<REDACTED>")
                .field("verify_tls", verify_tls)
                .field("dry_run", dry_run)
                .finish(),
            DeviceConfig::Memory => f.write_str("Memory"),
            DeviceConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// Port store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortStoreConfig {
    /// JSON snapshot exported from the network database
    File {
        /// Path to the snapshot
        path: String,
    },

    /// In-memory store (embedding and tests)
    #[default]
    Memory,

    /// Custom port store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl PortStoreConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            PortStoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("Port store path cannot be empty"))
            }
            PortStoreConfig::Custom { factory, .. } if factory.is_empty() => {
                Err(crate::Error::config("Custom port store factory cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            PortStoreConfig::File { .. } => "file",
            PortStoreConfig::Memory => "memory",
            PortStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Control plane configuration
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlPlaneConfig {
    /// Controller reachable over HTTP
    Http {
        /// Base URL of the controller API
        url: String,
        /// Token sent as `X-Auth-Token`
        #[serde(default)]
        token: Option<String>,
        /// Seconds between notification polls
        #[serde(default = "default_notification_poll_secs")]
        poll_interval_secs: u64,
    },

    /// No controller: reports are only logged
    #[default]
    Log,

    /// Custom control plane
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ControlPlaneConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ControlPlaneConfig::Http {
                url,
                poll_interval_secs,
                ..
            } => {
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Controller URL must be an http(s) URL, got: {url}"
                    )));
                }
                if *poll_interval_secs == 0 {
                    return Err(crate::Error::config("Notification poll interval must be > 0"));
                }
                Ok(())
            }
            ControlPlaneConfig::Custom { factory, .. } if factory.is_empty() => Err(
                crate::Error::config("Custom control plane factory cannot be empty"),
            ),
            _ => Ok(()),
        }
    }

    pub fn type_name(&self) -> &str {
        match self {
            ControlPlaneConfig::Http { .. } => "http",
            ControlPlaneConfig::Log => "log",
            ControlPlaneConfig::Custom { factory, .. } => factory,
        }
    }
}

impl fmt::Debug for ControlPlaneConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlPlaneConfig::Http {
                url,
                token,
                poll_interval_secs,
            } => f
                .debug_struct("Http")
                .field("url", url)
                .field("token", &token.as_ref().map(|_| "<REDACTED>"))
                .field("poll_interval_secs", poll_interval_secs)
                .finish(),
            ControlPlaneConfig::Log => f.write_str("Log"),
            ControlPlaneConfig::Custom { factory, .. } => f
                .debug_struct("Custom")
                .field("factory", factory)
                .finish_non_exhaustive(),
        }
    }
}

/// VLAN naming configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Prefix of tenant folders (`<prefix>_<tenant>`)
    #[serde(default = "default_environment_prefix")]
    pub environment_prefix: String,

    /// Place every VLAN in the shared `Common` folder
    #[serde(default)]
    pub global_routed_mode: bool,
}

impl NamingConfig {
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.environment_prefix.is_empty() {
            return Err(crate::Error::config("Environment prefix cannot be empty"));
        }
        if self.environment_prefix.contains('/') {
            return Err(crate::Error::config("Environment prefix cannot contain '/'"));
        }
        Ok(())
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            environment_prefix: default_environment_prefix(),
            global_routed_mode: false,
        }
    }
}

fn default_polling_interval_secs() -> u64 {
    10
}

fn default_report_interval_secs() -> u64 {
    30
}

fn default_call_timeout_secs() -> u64 {
    30
}

fn default_api_retries() -> usize {
    3
}

fn default_retry_delay_secs() -> u64 {
    1
}

fn default_consumer_workers() -> usize {
    4
}

fn default_event_channel_capacity() -> usize {
    1000
}

fn default_verify_tls() -> bool {
    true
}

fn default_notification_poll_secs() -> u64 {
    5
}

fn default_environment_prefix() -> String {
    "Project".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AgentConfig::new("h1");
        assert_eq!(config.agent.polling_interval(), Duration::from_secs(10));
        assert_eq!(config.agent.report_interval(), Duration::from_secs(30));
        assert_eq!(config.agent.missing_vlan_policy, MissingVlanPolicy::Report);
        assert_eq!(config.naming.environment_prefix, "Project");
        assert!(config.physical_networks.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_settings() {
        let mut config = AgentConfig::new("");
        assert!(config.validate().is_err());

        config.agent.host = "h1".to_string();
        config.agent.polling_interval_secs = 0;
        assert!(config.validate().is_err());

        config.agent.polling_interval_secs = 10;
        config.physical_networks = vec![" ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_icontrol_validation() {
        let mut device = DeviceConfig::Icontrol {
            host: "10.0.0.5".to_string(),
            username: "admin".to_string(),
            password: "secret".to_string(),
            verify_tls: true,
            dry_run: false,
        };
        assert!(device.validate().is_err());

        if let DeviceConfig::Icontrol { host, .. } = &mut device {
            *host = "https://10.0.0.5".to_string();
        }
        assert!(device.validate().is_ok());
        assert_eq!(device.type_name(), "icontrol");
    }

    #[test]
    fn test_device_debug_redacts_password() {
        let device = DeviceConfig::Icontrol {
            host: "https://bigip".to_string(),
            username: "admin".to_string(),
            password: "hunter2".to_string(),
            verify_tls: true,
            dry_run: false,
        };
        let debug = format!("{device:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<REDACTED>"));
    }

    #[test]
    fn test_deserialize_tagged_config() {
        let json = serde_json::json!({
            "agent": { "host": "h1", "missing_vlan_policy": "create" },
            "device": { "type": "memory" },
            "port_store": { "type": "file", "path": "/var/lib/f5/ports.json" },
            "naming": { "global_routed_mode": true },
            "physical_networks": ["physnet1"]
        });

        let config: AgentConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.agent.missing_vlan_policy, MissingVlanPolicy::Create);
        assert_eq!(config.agent.polling_interval_secs, 10);
        assert_eq!(config.port_store.type_name(), "file");
        assert_eq!(config.control_plane.type_name(), "log");
        assert!(config.naming.global_routed_mode);
        assert_eq!(config.naming.environment_prefix, "Project");
    }

    #[test]
    fn test_missing_vlan_policy_parse() {
        assert_eq!("Create".parse::<MissingVlanPolicy>().unwrap(), MissingVlanPolicy::Create);
        assert_eq!("report".parse::<MissingVlanPolicy>().unwrap(), MissingVlanPolicy::Report);
        assert!("delete".parse::<MissingVlanPolicy>().is_err());
    }

    #[test]
    fn test_snapshot_contains_driver() {
        let mut config = AgentConfig::new("h1");
        config.physical_networks = vec!["physnet1".to_string()];
        let snapshot = config.snapshot();
        assert_eq!(snapshot["device_driver"], "memory");
        assert_eq!(snapshot["physical_networks"][0], "physnet1");
    }
}

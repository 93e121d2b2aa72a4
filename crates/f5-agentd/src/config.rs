// Environment configuration for f5-agentd
//
// Every setting comes from an `F5_*` variable. Parsing goes through a
// lookup function so tests never touch the process environment.

use anyhow::{Context, Result};
use f5_agent_core::config::{
    AgentConfig, ControlPlaneConfig, DeviceConfig, MissingVlanPolicy, PortStoreConfig,
};
use tracing_subscriber::filter::LevelFilter;

/// Daemon configuration: the agent tree plus what only the daemon uses
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub agent: AgentConfig,
    pub log_level: LevelFilter,
}

impl DaemonConfig {
    /// Load and validate configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load and validate configuration through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env { lookup };

        let host = env
            .string("F5_AGENT_HOST")
            .or_else(|| env.string("HOSTNAME"))
            .context("F5_AGENT_HOST is required. Set it via: export F5_AGENT_HOST=$(hostname)")?;

        let mut agent = AgentConfig::new(host);

        if let Some(secs) = env.number("F5_POLLING_INTERVAL", 1..=3600)? {
            agent.agent.polling_interval_secs = secs;
        }
        if let Some(secs) = env.number("F5_REPORT_INTERVAL", 1..=3600)? {
            agent.agent.report_interval_secs = secs;
        }
        if let Some(secs) = env.number("F5_CALL_TIMEOUT", 1..=600)? {
            agent.agent.call_timeout_secs = secs;
        }
        if let Some(retries) = env.number("F5_API_RETRIES", 0..=10)? {
            agent.agent.api_retries = retries as usize;
        }
        if let Some(secs) = env.number("F5_RETRY_DELAY_SECS", 0..=300)? {
            agent.agent.retry_delay_secs = secs;
        }
        if let Some(workers) = env.number("F5_CONSUMER_WORKERS", 1..=64)? {
            agent.agent.consumer_workers = workers as usize;
        }
        if let Some(policy) = env.string("F5_MISSING_VLAN_POLICY") {
            agent.agent.missing_vlan_policy = policy
                .parse::<MissingVlanPolicy>()
                .map_err(|e| anyhow::anyhow!("F5_MISSING_VLAN_POLICY: {}", e))?;
        }

        if let Some(prefix) = env.string("F5_ENVIRONMENT_PREFIX") {
            agent.naming.environment_prefix = prefix;
        }
        if let Some(global) = env.flag("F5_GLOBAL_ROUTED_MODE")? {
            agent.naming.global_routed_mode = global;
        }
        if let Some(networks) = env.string("F5_PHYSICAL_NETWORKS") {
            agent.physical_networks = networks
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        agent.device = device_config(&env)?;
        agent.port_store = port_store_config(&env)?;
        agent.control_plane = control_plane_config(&env)?;

        agent
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

        let log_level = match env.string("F5_LOG_LEVEL") {
            Some(level) => parse_log_level(&level)?,
            None => LevelFilter::INFO,
        };

        Ok(Self { agent, log_level })
    }
}

fn device_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<DeviceConfig> {
    let driver = env
        .string("F5_DEVICE_DRIVER")
        .unwrap_or_else(|| "icontrol".to_string());

    match driver.as_str() {
        "icontrol" => {
            let host = env.string("F5_DEVICE_HOST").context(
                "F5_DEVICE_HOST is required when F5_DEVICE_DRIVER=icontrol. \
                Set it via: export F5_DEVICE_HOST=https://10.0.0.5",
            )?;
            // Bare addresses are management IPs
            let host = if host.contains("://") {
                host
            } else {
                format!("https://{}", host)
            };
            let username = env
                .string("F5_DEVICE_USERNAME")
                .context("F5_DEVICE_USERNAME is required when F5_DEVICE_DRIVER=icontrol")?;
            let password = env
                .string("F5_DEVICE_PASSWORD")
                .context("F5_DEVICE_PASSWORD is required when F5_DEVICE_DRIVER=icontrol")?;

            Ok(DeviceConfig::Icontrol {
                host,
                username,
                password,
                verify_tls: env.flag("F5_DEVICE_VERIFY_TLS")?.unwrap_or(true),
                dry_run: env.flag("F5_DEVICE_DRY_RUN")?.unwrap_or(false),
            })
        }
        "memory" => Ok(DeviceConfig::Memory),
        other => anyhow::bail!(
            "F5_DEVICE_DRIVER '{}' is not supported. Supported drivers: icontrol, memory",
            other
        ),
    }
}

fn port_store_config<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<PortStoreConfig> {
    let store_type = env
        .string("F5_PORT_STORE_TYPE")
        .unwrap_or_else(|| "file".to_string());

    match store_type.as_str() {
        "file" => {
            let path = env.string("F5_PORT_STORE_PATH").context(
                "F5_PORT_STORE_PATH is required when F5_PORT_STORE_TYPE=file. \
                Set it via: export F5_PORT_STORE_PATH=/var/lib/f5-agent/ports.json",
            )?;
            Ok(PortStoreConfig::File { path })
        }
        "memory" => Ok(PortStoreConfig::Memory),
        other => anyhow::bail!(
            "F5_PORT_STORE_TYPE '{}' is not supported. Supported types: file, memory",
            other
        ),
    }
}

fn control_plane_config<F: Fn(&str) -> Option<String>>(
    env: &Env<F>,
) -> Result<ControlPlaneConfig> {
    let Some(url) = env.string("F5_CONTROLLER_URL") else {
        return Ok(ControlPlaneConfig::Log);
    };

    if url.starts_with("http://") {
        eprintln!(
            "WARNING: F5_CONTROLLER_URL uses HTTP (not HTTPS). \
            The controller token travels in clear text."
        );
    }

    let poll_interval_secs = env
        .number("F5_NOTIFICATION_POLL_INTERVAL", 1..=3600)?
        .unwrap_or(5);

    Ok(ControlPlaneConfig::Http {
        url,
        token: env.string("F5_CONTROLLER_TOKEN"),
        poll_interval_secs,
    })
}

/// Parse a `F5_LOG_LEVEL` value
pub fn parse_log_level(level: &str) -> Result<LevelFilter> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        _ => anyhow::bail!(
            "F5_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            level
        ),
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Trimmed value; empty counts as unset
    fn string(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn number(&self, key: &str, range: std::ops::RangeInclusive<u64>) -> Result<Option<u64>> {
        let Some(raw) = self.string(key) else {
            return Ok(None);
        };
        let value: u64 = raw
            .parse()
            .with_context(|| format!("{} must be a whole number. Got: {}", key, raw))?;
        if !range.contains(&value) {
            anyhow::bail!(
                "{} must be between {} and {}. Got: {}",
                key,
                range.start(),
                range.end(),
                value
            );
        }
        Ok(Some(value))
    }

    fn flag(&self, key: &str) -> Result<Option<bool>> {
        let Some(raw) = self.string(key) else {
            return Ok(None);
        };
        match raw.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(Some(true)),
            "0" | "false" | "no" | "off" => Ok(Some(false)),
            _ => anyhow::bail!("{} must be true or false. Got: {}", key, raw),
        }
    }
}

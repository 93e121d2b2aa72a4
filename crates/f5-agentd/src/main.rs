// # f5-agentd - F5 VLAN binding agent daemon
//
// Thin integration layer. All reconciliation logic lives in f5-agent-core.
//
// The daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Installing logging and OS signal handlers
// 3. Registering device, port store and control plane implementations
// 4. Running the agent until SIGTERM/SIGINT
//
// SIGHUP re-reads the environment and applies the reloadable settings.
//
// ## Configuration
//
// ### Agent
// - `F5_AGENT_HOST`: Host identity (falls back to `HOSTNAME`)
// - `F5_POLLING_INTERVAL`: Seconds between reconciliation cycles (default 10)
// - `F5_REPORT_INTERVAL`: Seconds between heartbeats (default 30)
// - `F5_CALL_TIMEOUT`: Upper bound for any external call (default 30)
// - `F5_API_RETRIES`: Extra attempts for a failed VLAN mutation (default 3)
// - `F5_MISSING_VLAN_POLICY`: `report` or `create` (default report)
// - `F5_PHYSICAL_NETWORKS`: Comma-separated physical networks of the appliance
//
// ### Naming
// - `F5_ENVIRONMENT_PREFIX`: Tenant folder prefix (default Project)
// - `F5_GLOBAL_ROUTED_MODE`: Put every VLAN in `Common`
//
// ### Device
// - `F5_DEVICE_DRIVER`: `icontrol` or `memory` (default icontrol)
// - `F5_DEVICE_HOST`, `F5_DEVICE_USERNAME`, `F5_DEVICE_PASSWORD`
// - `F5_DEVICE_VERIFY_TLS`, `F5_DEVICE_DRY_RUN`
//
// ### Port store
// - `F5_PORT_STORE_TYPE`: `file` or `memory` (default file)
// - `F5_PORT_STORE_PATH`: Snapshot path (for file)
//
// ### Controller
// - `F5_CONTROLLER_URL`: Controller API; unset logs reports instead
// - `F5_CONTROLLER_TOKEN`: Sent as `X-Auth-Token`
// - `F5_NOTIFICATION_POLL_INTERVAL`: Seconds between notification polls
//
// ### Logging
// - `F5_LOG_LEVEL`: trace, debug, info, warn, error (default info)
//
// ## Example
//
// ```bash
// export F5_AGENT_HOST=lb-host-1
// export F5_DEVICE_HOST=https://10.0.0.5
// export F5_DEVICE_USERNAME=admin
// export F5_DEVICE_PASSWORD=secret
// export F5_PORT_STORE_PATH=/var/lib/f5-agent/ports.json
// export F5_CONTROLLER_URL=https://controller:9696
//
// f5-agentd
// ```

mod config;
mod logging;

use anyhow::Result;
use f5_agent_core::{AgentConfig, AgentEvent, AgentPhase, AgentRegistry, F5Agent, Reconfigure};
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::DaemonConfig;
use crate::logging::LogHandle;

/// How long to wait for the event logger after the agent stopped
const EVENT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<AgentExitCode> for ExitCode {
    fn from(code: AgentExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Re-reads the environment on SIGHUP
struct EnvReconfigure {
    log: LogHandle,
}

impl Reconfigure for EnvReconfigure {
    fn reload(&self) -> f5_agent_core::Result<AgentConfig> {
        let config = DaemonConfig::from_env()
            .map_err(|e| f5_agent_core::Error::config(format!("{:#}", e)))?;

        if let Err(e) = self.log.set_level(config.log_level) {
            warn!("{}", e);
        }
        Ok(config.agent)
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match DaemonConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return AgentExitCode::ConfigError.into();
        }
    };

    let log = match logging::init(config.log_level) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("{}", e);
            return AgentExitCode::ConfigError.into();
        }
    };

    info!("Starting f5-agentd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return AgentExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run_daemon(config, log)).into()
}

fn build_registry() -> AgentRegistry {
    let registry = AgentRegistry::with_builtins();

    #[cfg(feature = "icontrol")]
    {
        debug!("Registering iControl device gateway");
        f5_device_icontrol::register(&registry);
    }

    #[cfg(feature = "http")]
    {
        debug!("Registering HTTP control plane");
        f5_controller_http::register(&registry);
    }

    registry
}

/// Run the agent; the exit code tells startup failures from runtime ones
async fn run_daemon(config: DaemonConfig, log: LogHandle) -> AgentExitCode {
    let registry = build_registry();

    let (agent, events) = match F5Agent::from_registry(config.agent, &registry) {
        Ok(created) => created,
        Err(e) => {
            error!("Failed to create agent: {}", e);
            return AgentExitCode::ConfigError;
        }
    };

    let signal_task = match agent.signals().listen_os() {
        Ok(task) => task,
        Err(e) => {
            error!("Failed to install signal handlers: {}", e);
            return AgentExitCode::ConfigError;
        }
    };

    let agent = agent.with_reconfigure(Box::new(EnvReconfigure { log }));

    let reached_running = Arc::new(AtomicBool::new(false));
    let event_task = tokio::spawn(log_events(events, reached_running.clone()));

    let result = agent.run().await;

    // Dropping the agent closes the event channel
    drop(agent);
    signal_task.abort();
    if tokio::time::timeout(EVENT_DRAIN_TIMEOUT, event_task).await.is_err() {
        warn!("Event logger did not finish within {:?}", EVENT_DRAIN_TIMEOUT);
    }

    exit_code(result, reached_running.load(Ordering::SeqCst))
}

fn exit_code(result: Result<(), f5_agent_core::Error>, reached_running: bool) -> AgentExitCode {
    match result {
        Ok(()) => {
            info!("Agent stopped");
            AgentExitCode::CleanShutdown
        }
        Err(e) if !reached_running => {
            error!("Agent failed to start: {}", e);
            AgentExitCode::ConfigError
        }
        Err(e) => {
            error!("Agent error: {}", e);
            AgentExitCode::RuntimeError
        }
    }
}

async fn log_events(
    mut events: tokio::sync::mpsc::Receiver<AgentEvent>,
    reached_running: Arc<AtomicBool>,
) {
    while let Some(event) = events.recv().await {
        match event {
            AgentEvent::PhaseChanged { phase } => {
                if phase == AgentPhase::Running {
                    reached_running.store(true, Ordering::SeqCst);
                }
                debug!("Agent phase: {}", phase);
            }
            other => debug!("Agent event: {:?}", other),
        }
    }
}

//! The agent loop
//!
//! [`F5Agent`] owns the collaborators and drives the phases:
//!
//! ```text
//! Starting ──▶ Running ──▶ Draining ──▶ Stopped
//!    │                                    ▲
//!    └──────── startup probe failed ──────┘
//! ```
//!
//! - **Starting**: probe the port store and the device, start the message
//!   consumers and the heartbeat task
//! - **Running**: at the top of each iteration consume signal flags, then run
//!   one reconciliation cycle and sleep for the rest of the polling interval
//! - **Draining**: stop the consumers and the heartbeat, wait for them
//! - **Stopped**: `run` returns

mod consumers;
mod events;
mod heartbeat;
mod signals;

pub use consumers::spawn_consumers;
pub use events::{AgentEvent, EventSink};
pub use heartbeat::Heartbeat;
pub use signals::SignalLatch;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::AgentConfig;
use crate::error::Result;
use crate::inbox::{NotificationDispatcher, NotificationInbox};
use crate::model::{AgentState, PortFilter, agent_id};
use crate::naming::COMMON_FOLDER;
use crate::reconciler::{Reconciler, ReconcilerSettings, with_timeout};
use crate::registry::AgentRegistry;
use crate::traits::{ControlPlane, DeviceGateway, NotificationSource, PortStore};

/// Lifecycle phase of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentPhase {
    Starting,
    Running,
    Draining,
    Stopped,
}

impl fmt::Display for AgentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AgentPhase::Starting => "starting",
            AgentPhase::Running => "running",
            AgentPhase::Draining => "draining",
            AgentPhase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Source of a fresh configuration on a reconfiguration request
///
/// Called inline between cycles. An error keeps the current configuration.
pub trait Reconfigure: Send + Sync {
    fn reload(&self) -> Result<AgentConfig>;
}

/// The F5 VLAN binding agent
///
/// ## Lifecycle
///
/// 1. Create with [`F5Agent::new()`] or [`F5Agent::from_registry()`]
/// 2. Optionally attach a notification source, signal latch, reload hook
/// 3. Call [`F5Agent::run()`]; it returns after a termination request
pub struct F5Agent {
    config: AgentConfig,
    device: Arc<dyn DeviceGateway>,
    store: Arc<dyn PortStore>,
    notifications: Option<Box<dyn NotificationSource>>,
    inbox: Arc<NotificationInbox>,
    dispatcher: Arc<NotificationDispatcher>,
    reconciler: Reconciler,
    heartbeat: Arc<Heartbeat>,
    signals: SignalLatch,
    reconfigure: Option<Box<dyn Reconfigure>>,
    phase: watch::Sender<AgentPhase>,
    events: EventSink,
}

impl F5Agent {
    /// Create an agent from explicit collaborators
    ///
    /// # Returns
    ///
    /// The agent and the receiving half of its event channel.
    pub fn new(
        config: AgentConfig,
        device: Box<dyn DeviceGateway>,
        store: Box<dyn PortStore>,
        control: Box<dyn ControlPlane>,
    ) -> Result<(Self, mpsc::Receiver<AgentEvent>)> {
        config.validate()?;

        let (events, rx) = EventSink::channel(config.agent.event_channel_capacity);
        let device: Arc<dyn DeviceGateway> = Arc::from(device);
        let store: Arc<dyn PortStore> = Arc::from(store);
        let control: Arc<dyn ControlPlane> = Arc::from(control);

        let inbox = Arc::new(NotificationInbox::new());
        let dispatcher = Arc::new(NotificationDispatcher::for_inbox(Arc::clone(&inbox)));
        let reconciler = Reconciler::new(
            Arc::clone(&device),
            Arc::clone(&store),
            Arc::clone(&control),
            Arc::clone(&inbox),
            ReconcilerSettings::from(&config),
        )
        .with_events(events.clone());
        let heartbeat = Heartbeat::new(
            control,
            AgentState::new(config.agent.host.clone(), config.snapshot()),
            config.agent.call_timeout(),
        )
        .with_events(events.clone());
        let (phase, _) = watch::channel(AgentPhase::Starting);

        let agent = Self {
            config,
            device,
            store,
            notifications: None,
            inbox,
            dispatcher,
            reconciler,
            heartbeat: Arc::new(heartbeat),
            signals: SignalLatch::new(),
            reconfigure: None,
            phase,
            events,
        };

        Ok((agent, rx))
    }

    /// Create an agent whose collaborators are built by `registry`
    pub fn from_registry(
        config: AgentConfig,
        registry: &AgentRegistry,
    ) -> Result<(Self, mpsc::Receiver<AgentEvent>)> {
        config.validate()?;

        let device = registry.create_device_gateway(&config)?;
        let store = registry.create_port_store(&config)?;
        let control = registry.create_control_plane(&config)?;
        let notifications = registry.create_notification_source(&config)?;

        info!(
            "Using device driver {}, port store {}, control plane {}",
            device.driver_name(),
            store.store_name(),
            control.control_plane_name()
        );

        let (mut agent, rx) = Self::new(config, device, store, control)?;
        agent.notifications = notifications;
        Ok((agent, rx))
    }

    pub fn with_notification_source(mut self, source: Box<dyn NotificationSource>) -> Self {
        self.notifications = Some(source);
        self
    }

    pub fn with_signals(mut self, signals: SignalLatch) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_reconfigure(mut self, reconfigure: Box<dyn Reconfigure>) -> Self {
        self.reconfigure = Some(reconfigure);
        self
    }

    /// Inbox shared with the message consumers
    pub fn inbox(&self) -> Arc<NotificationInbox> {
        Arc::clone(&self.inbox)
    }

    /// Dispatch table the consumers feed
    pub fn dispatcher(&self) -> Arc<NotificationDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    pub fn signals(&self) -> SignalLatch {
        self.signals.clone()
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn heartbeat(&self) -> Arc<Heartbeat> {
        Arc::clone(&self.heartbeat)
    }

    pub fn phase(&self) -> AgentPhase {
        *self.phase.borrow()
    }

    /// Follow phase changes
    pub fn subscribe_phase(&self) -> watch::Receiver<AgentPhase> {
        self.phase.subscribe()
    }

    fn set_phase(&self, phase: AgentPhase) {
        self.phase.send_replace(phase);
        info!("Agent {}", phase);
        self.events.emit(AgentEvent::PhaseChanged { phase });
    }

    /// Run the agent until a termination request
    ///
    /// # Errors
    ///
    /// Only a failed startup probe. Failures inside a cycle are logged and
    /// the loop goes on.
    pub async fn run(&self) -> Result<()> {
        self.set_phase(AgentPhase::Starting);
        info!(
            "Agent {} starting on host {}",
            agent_id(&self.config.agent.host),
            self.config.agent.host
        );

        if let Err(e) = self.probe().await {
            error!("Startup probe failed: {}", e);
            self.set_phase(AgentPhase::Stopped);
            return Err(e);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut tasks: Vec<JoinHandle<()>> = Vec::new();

        if let Some(source) = &self.notifications {
            tasks.extend(spawn_consumers(
                source.watch(),
                Arc::clone(&self.dispatcher),
                self.config.agent.consumer_workers,
                shutdown_rx.clone(),
            ));
        } else {
            debug!("No notification source, relying on polling alone");
        }
        tasks.push(
            Arc::clone(&self.heartbeat).spawn(self.config.agent.report_interval(), shutdown_rx),
        );

        self.set_phase(AgentPhase::Running);
        info!("Agent initialized successfully, now running...");
        self.daemon_loop().await;

        self.set_phase(AgentPhase::Draining);
        // Receivers may already be gone
        let _ = shutdown_tx.send(true);
        self.drain(tasks).await;

        self.set_phase(AgentPhase::Stopped);
        Ok(())
    }

    /// Reach the port store and the device once before running
    async fn probe(&self) -> Result<()> {
        let timeout = self.config.agent.call_timeout();
        let host = &self.config.agent.host;

        let ports = with_timeout(
            "list_ports",
            timeout,
            self.store.list_ports(&PortFilter::for_host(host)),
        )
        .await?;
        let vlans = with_timeout("list_vlans", timeout, self.device.list_vlans(COMMON_FOLDER)).await?;

        info!(
            "Startup probe: {} port(s) on host {}, {} VLAN(s) in /{}",
            ports.len(),
            host,
            vlans.len(),
            COMMON_FOLDER
        );
        Ok(())
    }

    async fn daemon_loop(&self) {
        let mut polling_interval = self.config.agent.polling_interval();
        let mut iteration: u64 = 0;

        loop {
            if self.signals.is_terminating() {
                info!("Termination requested, leaving daemon loop");
                break;
            }
            if self.signals.take_reconfigure()
                && let Some(interval) = self.reload()
            {
                polling_interval = interval;
            }

            let started = Instant::now();
            match self.reconciler.run_cycle().await {
                Ok(report) => {
                    info!("Agent loop - iteration:{} completed. {}", iteration, report);
                    self.events.emit(AgentEvent::CycleCompleted { iteration, report });
                }
                Err(e) => {
                    error!("Error while processing ports: {}", e);
                    self.events.emit(AgentEvent::CycleFailed {
                        iteration,
                        error: e.to_string(),
                    });
                }
            }

            let elapsed = started.elapsed();
            if elapsed < polling_interval {
                self.signals.sleep(polling_interval - elapsed).await;
            } else {
                warn!(
                    "Loop iteration exceeded interval ({:?} vs. {:?})!",
                    polling_interval, elapsed
                );
            }
            iteration += 1;
        }
    }

    /// Apply a fresh configuration; returns the new polling interval
    fn reload(&self) -> Option<Duration> {
        let Some(source) = &self.reconfigure else {
            debug!("Reconfiguration requested but no reload hook installed");
            return None;
        };

        let fresh = match source.reload().and_then(|config| {
            config.validate()?;
            Ok(config)
        }) {
            Ok(config) => config,
            Err(e) => {
                error!("Reload failed, keeping current configuration: {}", e);
                return None;
            }
        };

        warn_restart_required(&self.config, &fresh);

        let mut settings = ReconcilerSettings::from(&fresh);
        settings.host = self.config.agent.host.clone();
        self.reconciler.apply_settings(settings);
        self.heartbeat.set_configurations(fresh.snapshot());

        info!("Configuration reloaded");
        self.events.emit(AgentEvent::Reconfigured);
        Some(fresh.agent.polling_interval())
    }

    async fn drain(&self, tasks: Vec<JoinHandle<()>>) {
        let limit = self.config.agent.call_timeout();
        for task in tasks {
            let abort = task.abort_handle();
            match tokio::time::timeout(limit, task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Agent task ended abnormally: {}", e),
                Err(_) => {
                    warn!("Agent task did not stop within {:?}, aborting", limit);
                    abort.abort();
                }
            }
        }
    }
}

fn warn_restart_required(current: &AgentConfig, fresh: &AgentConfig) {
    let changed = [
        ("host", current.agent.host != fresh.agent.host),
        (
            "device driver",
            current.device.type_name() != fresh.device.type_name(),
        ),
        (
            "port store",
            current.port_store.type_name() != fresh.port_store.type_name(),
        ),
        (
            "control plane",
            current.control_plane.type_name() != fresh.control_plane.type_name(),
        ),
        (
            "report interval",
            current.agent.report_interval_secs != fresh.agent.report_interval_secs,
        ),
    ];
    for (what, differs) in changed {
        if differs {
            warn!("Changed {} only takes effect after a restart", what);
        }
    }
}

impl fmt::Debug for F5Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("F5Agent")
            .field("host", &self.config.agent.host)
            .field("device", &self.device.driver_name())
            .field("store", &self.store.store_name())
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

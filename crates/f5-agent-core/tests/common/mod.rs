//! Test doubles and common utilities for contract tests
//!
//! The doubles record every call so tests can assert on exactly what the
//! agent asked its collaborators to do.

#![allow(dead_code)]

use f5_agent_core::error::{Error, Result};
use f5_agent_core::model::{AgentState, DRIVER_NAME, DeviceListResult, DeviceVlan};
use f5_agent_core::traits::{ControlPlane, DeviceGateway, Notification, NotificationSource};
use f5_agent_core::{
    AgentConfig, BindingLevel, MemoryPortStore, Network, NotificationInbox, Port, Reconciler,
    ReconcilerSettings, Segment,
};
use std::collections::{HashMap, HashSet};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_stream::Stream;

/// A mutation issued against the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    UpdateTag { name: String, folder: String, tag: u16 },
    Create { name: String, folder: String, tag: u16 },
}

/// A device gateway that records calls and can be told to fail
pub struct RecordingDeviceGateway {
    vlans: Arc<Mutex<HashMap<(String, String), u16>>>,
    mutations: Arc<Mutex<Vec<Mutation>>>,
    call_count: Arc<AtomicUsize>,
    /// VLAN names whose every call fails with a permanent error
    broken: Arc<Mutex<HashSet<String>>>,
    /// Remaining transient failures for mutations
    transient_failures: Arc<AtomicUsize>,
    /// Added to every existence check
    delay: Arc<Mutex<Duration>>,
    /// When each existence check started
    check_times: Arc<Mutex<Vec<Instant>>>,
}

impl RecordingDeviceGateway {
    pub fn new() -> Self {
        Self {
            vlans: Arc::new(Mutex::new(HashMap::new())),
            mutations: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(AtomicUsize::new(0)),
            broken: Arc::new(Mutex::new(HashSet::new())),
            transient_failures: Arc::new(AtomicUsize::new(0)),
            delay: Arc::new(Mutex::new(Duration::ZERO)),
            check_times: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a gateway that shares state and counters with an existing one
    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            vlans: Arc::clone(&other.vlans),
            mutations: Arc::clone(&other.mutations),
            call_count: Arc::clone(&other.call_count),
            broken: Arc::clone(&other.broken),
            transient_failures: Arc::clone(&other.transient_failures),
            delay: Arc::clone(&other.delay),
            check_times: Arc::clone(&other.check_times),
        }
    }

    pub fn with_vlan(self, folder: &str, name: &str, tag: u16) -> Self {
        self.vlans
            .lock()
            .unwrap()
            .insert((folder.to_string(), name.to_string()), tag);
        self
    }

    /// Every call touching `name` fails
    pub fn break_vlan(&self, name: &str) {
        self.broken.lock().unwrap().insert(name.to_string());
    }

    /// Every existence check takes at least `delay`
    pub fn slow_down(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Start times of every existence check, one per bound port and cycle
    pub fn check_times(&self) -> Vec<Instant> {
        self.check_times.lock().unwrap().clone()
    }

    /// The next `count` mutations fail with a transient error
    pub fn fail_mutations_transiently(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    pub fn tag(&self, folder: &str, name: &str) -> Option<u16> {
        self.vlans
            .lock()
            .unwrap()
            .get(&(folder.to_string(), name.to_string()))
            .copied()
    }

    pub fn mutations(&self) -> Vec<Mutation> {
        self.mutations.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutations.lock().unwrap().len()
    }

    /// Every call, reads included
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn enter(&self, name: &str) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if self.broken.lock().unwrap().contains(name) {
            return Err(Error::auth(format!("access to {name} denied")));
        }
        Ok(())
    }

    fn transient_failure(&self) -> Result<()> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::device("recording", "503 Service Unavailable"));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DeviceGateway for RecordingDeviceGateway {
    async fn list_vlans(&self, folder: &str) -> Result<Vec<DeviceVlan>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let vlans = self.vlans.lock().unwrap();
        Ok(vlans
            .iter()
            .filter(|((f, _), _)| f == folder)
            .map(|((f, n), tag)| DeviceVlan {
                name: n.clone(),
                folder: f.clone(),
                tag: *tag,
            })
            .collect())
    }

    async fn vlan_exists(&self, name: &str, folder: &str) -> Result<bool> {
        self.check_times.lock().unwrap().push(Instant::now());
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.enter(name)?;
        let vlans = self.vlans.lock().unwrap();
        Ok(vlans.contains_key(&(folder.to_string(), name.to_string())))
    }

    async fn load_vlan(&self, name: &str, folder: &str) -> Result<DeviceVlan> {
        self.enter(name)?;
        let vlans = self.vlans.lock().unwrap();
        let tag = vlans
            .get(&(folder.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| Error::not_found(format!("/{folder}/{name}")))?;
        Ok(DeviceVlan {
            name: name.to_string(),
            folder: folder.to_string(),
            tag,
        })
    }

    async fn update_vlan_tag(&self, name: &str, folder: &str, tag: u16) -> Result<()> {
        self.enter(name)?;
        self.transient_failure()?;
        self.vlans
            .lock()
            .unwrap()
            .insert((folder.to_string(), name.to_string()), tag);
        self.mutations.lock().unwrap().push(Mutation::UpdateTag {
            name: name.to_string(),
            folder: folder.to_string(),
            tag,
        });
        Ok(())
    }

    async fn create_vlan(&self, name: &str, folder: &str, tag: u16) -> Result<()> {
        self.enter(name)?;
        self.transient_failure()?;
        self.vlans
            .lock()
            .unwrap()
            .insert((folder.to_string(), name.to_string()), tag);
        self.mutations.lock().unwrap().push(Mutation::Create {
            name: name.to_string(),
            folder: folder.to_string(),
            tag,
        });
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        "recording"
    }
}

/// A device status report received by the control plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceListCall {
    pub up: Vec<String>,
    pub down: Vec<String>,
    pub agent_id: String,
    pub host: String,
}

/// A control plane that records reports and can fail them
pub struct RecordingControlPlane {
    states: Arc<Mutex<Vec<AgentState>>>,
    device_lists: Arc<Mutex<Vec<DeviceListCall>>>,
    report_attempts: Arc<AtomicUsize>,
    /// Remaining report_state calls that fail
    failing_reports: Arc<AtomicUsize>,
}

impl RecordingControlPlane {
    pub fn new() -> Self {
        Self {
            states: Arc::new(Mutex::new(Vec::new())),
            device_lists: Arc::new(Mutex::new(Vec::new())),
            report_attempts: Arc::new(AtomicUsize::new(0)),
            failing_reports: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn sharing_counters_with(other: &Self) -> Self {
        Self {
            states: Arc::clone(&other.states),
            device_lists: Arc::clone(&other.device_lists),
            report_attempts: Arc::clone(&other.report_attempts),
            failing_reports: Arc::clone(&other.failing_reports),
        }
    }

    /// The next `count` state reports fail
    pub fn fail_next_reports(&self, count: usize) {
        self.failing_reports.store(count, Ordering::SeqCst);
    }

    /// Payloads of every report_state call, failed ones included
    pub fn reported_states(&self) -> Vec<AgentState> {
        self.states.lock().unwrap().clone()
    }

    pub fn report_attempts(&self) -> usize {
        self.report_attempts.load(Ordering::SeqCst)
    }

    pub fn device_lists(&self) -> Vec<DeviceListCall> {
        self.device_lists.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ControlPlane for RecordingControlPlane {
    async fn report_state(&self, state: &AgentState) -> Result<()> {
        self.report_attempts.fetch_add(1, Ordering::SeqCst);
        self.states.lock().unwrap().push(state.clone());

        let remaining = self.failing_reports.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_reports.store(remaining - 1, Ordering::SeqCst);
            return Err(Error::control_plane("controller unreachable"));
        }
        Ok(())
    }

    async fn update_device_list(
        &self,
        up: &[String],
        down: &[String],
        agent_id: &str,
        host: &str,
    ) -> Result<DeviceListResult> {
        self.device_lists.lock().unwrap().push(DeviceListCall {
            up: up.to_vec(),
            down: down.to_vec(),
            agent_id: agent_id.to_string(),
            host: host.to_string(),
        });
        Ok(DeviceListResult {
            devices_up: up.to_vec(),
            devices_down: down.to_vec(),
            ..Default::default()
        })
    }

    fn control_plane_name(&self) -> &'static str {
        "recording"
    }
}

/// A notification source that emits on demand
pub struct ControlledNotificationSource {
    rx: Mutex<Option<mpsc::UnboundedReceiver<Notification>>>,
}

impl ControlledNotificationSource {
    pub fn new() -> (Self, mpsc::UnboundedSender<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Mutex::new(Some(rx)),
            },
            tx,
        )
    }
}

impl NotificationSource for ControlledNotificationSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Notification> + Send + 'static>> {
        let rx = self
            .rx
            .lock()
            .unwrap()
            .take()
            .expect("watch() can only be called once");
        Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx))
    }
}

/// Bind `port` on `host` through this integration to a new VLAN segment
pub async fn bind_vlan_port(
    store: &MemoryPortStore,
    port: &str,
    network: &str,
    tenant: &str,
    host: &str,
    segment: &str,
    tag: u32,
) {
    store.add_network(Network::new(network, tenant)).await;
    store.add_port(Port::new(port, network, host)).await;
    store
        .add_segment(Segment::vlan(segment, network, tag, "physnet1"))
        .await;
    store
        .add_binding_level(BindingLevel::new(port, host, DRIVER_NAME, segment))
        .await;
}

/// Configuration with the shortest intervals the agent accepts
pub fn fast_config(host: &str) -> AgentConfig {
    let mut config = AgentConfig::new(host);
    config.agent.polling_interval_secs = 1;
    config.agent.report_interval_secs = 1;
    config.agent.call_timeout_secs = 2;
    config.agent.retry_delay_secs = 0;
    config
}

/// Reconciler for `host` wired to the given doubles
pub fn reconciler_for(
    host: &str,
    device: &RecordingDeviceGateway,
    store: &MemoryPortStore,
    control: &RecordingControlPlane,
    inbox: Arc<NotificationInbox>,
) -> Reconciler {
    Reconciler::new(
        Arc::new(RecordingDeviceGateway::sharing_counters_with(device)),
        Arc::new(store.clone()),
        Arc::new(RecordingControlPlane::sharing_counters_with(control)),
        inbox,
        ReconcilerSettings::from(&fast_config(host)),
    )
}

//! Contract Test: Agent Loop & Shutdown Determinism
//!
//! Constraints verified:
//! - A termination request drains the agent and `run` returns
//! - The loop reconciles on its own schedule while running
//! - A reconfiguration request reloads settings between cycles
//! - Cycles start one polling interval apart, measured from cycle start
//! - A cycle that overruns the interval is followed at once, never by a
//!   stacked sleep
//! - A failed startup probe is fatal
//!
//! If this test fails, someone has added detached tasks, a blocking
//! shutdown path, or a degraded-start mode.

mod common;

use common::*;
use f5_agent_core::error::{Error, Result};
use f5_agent_core::model::DeviceVlan;
use f5_agent_core::traits::DeviceGateway;
use f5_agent_core::traits::PortNotice;
use f5_agent_core::{
    AgentConfig, AgentEvent, AgentPhase, F5Agent, MemoryPortStore, MissingVlanPolicy,
    Notification, Reconfigure, SignalLatch,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn termination_request_stops_agent() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 7);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 42).await;
    let control = RecordingControlPlane::new();
    let (source, notify_tx) = ControlledNotificationSource::new();
    let latch = SignalLatch::new();

    let (agent, mut events) = F5Agent::new(
        fast_config("h1"),
        Box::new(RecordingDeviceGateway::sharing_counters_with(&device)),
        Box::new(store.clone()),
        Box::new(RecordingControlPlane::sharing_counters_with(&control)),
    )
    .expect("agent construction succeeds");
    let agent = Arc::new(
        agent
            .with_notification_source(Box::new(source))
            .with_signals(latch.clone()),
    );
    let mut phases = agent.subscribe_phase();

    let runner = Arc::clone(&agent);
    let handle = tokio::spawn(async move { runner.run().await });

    phases
        .wait_for(|phase| *phase == AgentPhase::Running)
        .await
        .unwrap();
    notify_tx
        .send(Notification::PortUpdate {
            port: PortNotice {
                id: "p1".to_string(),
                network_id: Some("n1".to_string()),
            },
        })
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    latch.request_terminate();
    let result = tokio::time::timeout(Duration::from_secs(5), handle).await;
    assert!(result.is_ok(), "agent should stop within 5 seconds");
    result.unwrap().unwrap().unwrap();

    assert_eq!(agent.phase(), AgentPhase::Stopped);
    assert_eq!(device.tag("Project_t1", "vlan-n1"), Some(42));
    assert!(control.report_attempts() >= 1);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let AgentEvent::PhaseChanged { phase } = event {
            seen.push(phase);
        }
    }
    assert_eq!(
        seen,
        vec![
            AgentPhase::Starting,
            AgentPhase::Running,
            AgentPhase::Draining,
            AgentPhase::Stopped
        ]
    );
}

#[tokio::test]
async fn loop_runs_cycles_until_terminated() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 42);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 42).await;
    let latch = SignalLatch::new();

    let (agent, mut events) = F5Agent::new(
        fast_config("h1"),
        Box::new(RecordingDeviceGateway::sharing_counters_with(&device)),
        Box::new(store.clone()),
        Box::new(RecordingControlPlane::new()),
    )
    .unwrap();
    let agent = Arc::new(agent.with_signals(latch.clone()));
    let runner = Arc::clone(&agent);
    let handle = tokio::spawn(async move { runner.run().await });

    // Change desired state while the agent sleeps between cycles
    tokio::time::sleep(Duration::from_millis(300)).await;
    store.set_segmentation_id("s1", 43).await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    latch.request_terminate();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(device.tag("Project_t1", "vlan-n1"), Some(43));
    let mut cycles = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, AgentEvent::CycleCompleted { .. }) {
            cycles += 1;
        }
    }
    assert!(cycles >= 2, "expected at least two cycles, got {cycles}");
}

/// Run an agent over one bound port until `runtime` has passed
async fn run_for(device: &RecordingDeviceGateway, runtime: Duration) {
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 42).await;
    let latch = SignalLatch::new();

    let (agent, _events) = F5Agent::new(
        fast_config("h1"),
        Box::new(RecordingDeviceGateway::sharing_counters_with(device)),
        Box::new(store),
        Box::new(RecordingControlPlane::new()),
    )
    .unwrap();
    let agent = Arc::new(agent.with_signals(latch.clone()));
    let runner = Arc::clone(&agent);
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(runtime).await;
    latch.request_terminate();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
}

fn gaps(times: &[std::time::Instant]) -> Vec<Duration> {
    times.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

#[tokio::test]
async fn interval_is_measured_from_cycle_start() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 42);
    device.slow_down(Duration::from_millis(300));

    run_for(&device, Duration::from_millis(3500)).await;

    let gaps = gaps(&device.check_times());
    assert!(gaps.len() >= 2, "expected at least three cycles, got {:?}", gaps);
    for gap in gaps {
        // 1s interval; a sleep added after the 300ms cycle would give ~1.3s
        assert!(gap >= Duration::from_millis(900), "cycles too close: {:?}", gap);
        assert!(gap < Duration::from_millis(1250), "cycles too far apart: {:?}", gap);
    }
}

#[tokio::test]
async fn overrunning_cycle_is_followed_immediately() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 42);
    device.slow_down(Duration::from_millis(1300));

    run_for(&device, Duration::from_millis(3500)).await;

    let gaps = gaps(&device.check_times());
    assert!(!gaps.is_empty(), "expected back-to-back cycles");
    for gap in gaps {
        // No sleep after an overrun: the gap is the cycle itself
        assert!(gap >= Duration::from_millis(1300));
        assert!(gap < Duration::from_millis(1800), "sleep after overrun: {:?}", gap);
    }
}

struct CreatePolicy;

impl Reconfigure for CreatePolicy {
    fn reload(&self) -> Result<AgentConfig> {
        let mut config = fast_config("h1");
        config.agent.missing_vlan_policy = MissingVlanPolicy::Create;
        Ok(config)
    }
}

#[tokio::test]
async fn reconfiguration_applies_between_cycles() {
    let device = RecordingDeviceGateway::new();
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 42).await;
    let latch = SignalLatch::new();

    let (agent, _events) = F5Agent::new(
        fast_config("h1"),
        Box::new(RecordingDeviceGateway::sharing_counters_with(&device)),
        Box::new(store.clone()),
        Box::new(RecordingControlPlane::new()),
    )
    .unwrap();
    let agent = Arc::new(
        agent
            .with_signals(latch.clone())
            .with_reconfigure(Box::new(CreatePolicy)),
    );
    let runner = Arc::clone(&agent);
    let handle = tokio::spawn(async move { runner.run().await });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(device.mutation_count(), 0, "report policy leaves the gap");

    latch.request_reconfigure();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(device.tag("Project_t1", "vlan-n1"), Some(42));

    latch.request_terminate();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(
        agent.reconciler().settings().missing_vlan_policy,
        MissingVlanPolicy::Create
    );
}

struct UnreachableDevice;

#[async_trait::async_trait]
impl DeviceGateway for UnreachableDevice {
    async fn list_vlans(&self, _folder: &str) -> Result<Vec<DeviceVlan>> {
        Err(Error::http("connection refused"))
    }
    async fn vlan_exists(&self, _name: &str, _folder: &str) -> Result<bool> {
        Err(Error::http("connection refused"))
    }
    async fn load_vlan(&self, _name: &str, _folder: &str) -> Result<DeviceVlan> {
        Err(Error::http("connection refused"))
    }
    async fn update_vlan_tag(&self, _name: &str, _folder: &str, _tag: u16) -> Result<()> {
        Err(Error::http("connection refused"))
    }
    async fn create_vlan(&self, _name: &str, _folder: &str, _tag: u16) -> Result<()> {
        Err(Error::http("connection refused"))
    }
    fn driver_name(&self) -> &'static str {
        "unreachable"
    }
}

#[tokio::test]
async fn unreachable_device_at_startup_is_fatal() {
    let control = RecordingControlPlane::new();
    let (agent, _events) = F5Agent::new(
        fast_config("h1"),
        Box::new(UnreachableDevice),
        Box::new(MemoryPortStore::new()),
        Box::new(RecordingControlPlane::sharing_counters_with(&control)),
    )
    .unwrap();

    let err = agent.run().await.unwrap_err();
    assert!(matches!(err, Error::Http(_)));
    assert_eq!(agent.phase(), AgentPhase::Stopped);
    assert_eq!(control.report_attempts(), 0, "no heartbeat without a start");
}

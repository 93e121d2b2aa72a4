//! Contract Test: Scope Isolation & Type Filter
//!
//! Constraints verified:
//! - Binding levels created by another driver are never acted on
//! - Non-VLAN segments never cause a device call
//! - Ports of other hosts are never examined
//! - Segments off the configured physical networks are reported, not repaired
//!
//! If this test fails, the agent is touching VLANs it does not own.

mod common;

use common::*;
use f5_agent_core::model::BindingLevel;
use f5_agent_core::{MemoryPortStore, Network, NotificationInbox, Port, Segment};
use std::sync::Arc;

#[tokio::test]
async fn foreign_driver_binding_is_never_mutated() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 7);
    let store = MemoryPortStore::new();
    store.add_network(Network::new("n1", "t1")).await;
    store.add_port(Port::new("p1", "n1", "h1")).await;
    store.add_segment(Segment::vlan("s1", "n1", 42, "physnet1")).await;
    store
        .add_binding_level(BindingLevel::new("p1", "h1", "openvswitch", "s1"))
        .await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );

    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(device.mutation_count(), 0);
    assert_eq!(device.tag("Project_t1", "vlan-n1"), Some(7));
}

#[tokio::test]
async fn non_vlan_segment_never_reaches_the_device() {
    let device = RecordingDeviceGateway::new();
    let store = MemoryPortStore::new();
    store.add_network(Network::new("n1", "t1")).await;
    store.add_port(Port::new("p1", "n1", "h1")).await;
    store
        .add_segment(Segment {
            id: "s1".to_string(),
            network_id: "n1".to_string(),
            network_type: "vxlan".to_string(),
            segmentation_id: Some(5001),
            physical_network: None,
        })
        .await;
    store
        .add_binding_level(BindingLevel::new(
            "p1",
            "h1",
            f5_agent_core::model::DRIVER_NAME,
            "s1",
        ))
        .await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );

    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(device.call_count(), 0, "no device call for a vxlan segment");
}

#[tokio::test]
async fn other_hosts_are_out_of_scope() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t2", "vlan-n2", 1);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p2", "n2", "t2", "h2", "s2", 2).await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );

    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.examined, 0);
    assert_eq!(device.call_count(), 0);
}

#[tokio::test]
async fn ineligible_physical_network_is_reported_down() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 7);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 42).await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );
    let mut settings = (*reconciler.settings()).clone();
    settings.physical_networks = vec!["physnet2".to_string()];
    reconciler.apply_settings(settings);

    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.mismatched, 1);
    assert_eq!(device.mutation_count(), 0);
    assert_eq!(control.device_lists()[0].down, vec!["p1".to_string()]);
}

//! Contract Test: Convergence & Idempotence
//!
//! Constraints verified:
//! - A VLAN whose tag differs from its segment is corrected in one cycle
//! - A cycle over converged state issues no device mutation
//! - The end-to-end binding scenario corrects exactly the owned port
//!
//! If this test fails, the reconciler no longer converges the appliance.

mod common;

use common::*;
use f5_agent_core::{MemoryPortStore, NotificationInbox};
use std::sync::Arc;

const NETWORK: &str = "4f1c9e2a-7b3d-4c55-9a0e-1d2f3a4b5c6d";

#[tokio::test]
async fn mismatched_tag_is_corrected_once() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-4f1c9e2a-7", 7);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", NETWORK, "t1", "h1", "s1", 42).await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );

    let first = reconciler.run_cycle().await.unwrap();
    assert_eq!(first.corrected, 1);
    assert_eq!(
        device.mutations(),
        vec![Mutation::UpdateTag {
            name: "vlan-4f1c9e2a-7".to_string(),
            folder: "Project_t1".to_string(),
            tag: 42,
        }]
    );

    let second = reconciler.run_cycle().await.unwrap();
    assert_eq!(second.mutations(), 0);
    assert_eq!(device.mutation_count(), 1, "second cycle must not mutate");
}

#[tokio::test]
async fn converged_state_produces_no_mutations() {
    let device = RecordingDeviceGateway::new()
        .with_vlan("Project_t1", "vlan-n1", 100)
        .with_vlan("Project_t2", "vlan-n2", 200);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 100).await;
    bind_vlan_port(&store, "p2", "n2", "t2", "h1", "s2", 200).await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );

    for _ in 0..2 {
        let report = reconciler.run_cycle().await.unwrap();
        assert_eq!(report.in_sync, 2);
        assert_eq!(report.mutations(), 0);
    }
    assert_eq!(device.mutation_count(), 0);
    assert!(
        control.device_lists().is_empty(),
        "an idle cycle must not report device status"
    );
}

#[tokio::test]
async fn segment_change_is_picked_up_next_cycle() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 100);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 100).await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );

    assert_eq!(reconciler.run_cycle().await.unwrap().mutations(), 0);

    store.set_segmentation_id("s1", 101).await;
    assert_eq!(reconciler.run_cycle().await.unwrap().corrected, 1);
    assert_eq!(device.tag("Project_t1", "vlan-n1"), Some(101));
}

#[tokio::test]
async fn end_to_end_binding_scenario() {
    // h1 owns p1 on n1 (tenant t1) through segment s1, desired tag 100,
    // the appliance carries 99. h2 owns p9 with a mismatch of its own.
    let device = RecordingDeviceGateway::new()
        .with_vlan("Project_t1", "vlan-n1", 99)
        .with_vlan("Project_t9", "vlan-n9", 1);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 100).await;
    bind_vlan_port(&store, "p9", "n9", "t9", "h2", "s9", 900).await;
    let control = RecordingControlPlane::new();
    let reconciler = reconciler_for(
        "h1",
        &device,
        &store,
        &control,
        Arc::new(NotificationInbox::new()),
    );

    let report = reconciler.run_cycle().await.unwrap();

    assert_eq!(report.examined, 1);
    assert_eq!(
        device.mutations(),
        vec![Mutation::UpdateTag {
            name: "vlan-n1".to_string(),
            folder: "Project_t1".to_string(),
            tag: 100,
        }]
    );
    assert_eq!(device.tag("Project_t9", "vlan-n9"), Some(1));

    let lists = control.device_lists();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].up, vec!["p1".to_string()]);
    assert!(lists[0].down.is_empty());
    assert_eq!(lists[0].agent_id, "f5-agent-h1");
    assert_eq!(lists[0].host, "h1");
}

//! Contract Test: Notification Precedence
//!
//! Constraints verified:
//! - A delete supersedes an earlier update for the same port
//! - A network update never resurrects a deleted port
//! - Notifications delivered through the consumer pool obey the same rules
//! - Ports pending deletion are never reported up
//!
//! If this test fails, stale notifications can override deletions.

mod common;

use common::*;
use f5_agent_core::agent::spawn_consumers;
use f5_agent_core::traits::{NetworkNotice, PortNotice};
use f5_agent_core::{
    MemoryPortStore, Notification, NotificationDispatcher, NotificationInbox, NotificationSource,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn port_update(id: &str, network: &str) -> Notification {
    Notification::PortUpdate {
        port: PortNotice {
            id: id.to_string(),
            network_id: Some(network.to_string()),
        },
    }
}

#[test]
fn delete_after_update_leaves_only_delete() {
    let inbox = NotificationInbox::new();
    inbox.record_port_updated("p");
    inbox.record_port_deleted("p");

    assert!(inbox.is_delete_pending("p"));
    assert!(!inbox.is_update_pending("p"));
}

#[test]
fn network_update_after_delete_skips_port() {
    let inbox = NotificationInbox::new();
    inbox.record_port_deleted("p");
    inbox.record_network_updated("n", ["p"]);

    assert!(!inbox.is_update_pending("p"));
    assert!(inbox.is_delete_pending("p"));
}

#[tokio::test]
async fn consumer_pool_preserves_precedence() {
    let inbox = Arc::new(NotificationInbox::new());
    let dispatcher = Arc::new(NotificationDispatcher::for_inbox(Arc::clone(&inbox)));
    let (source, tx) = ControlledNotificationSource::new();
    let (stop_tx, stop_rx) = watch::channel(false);

    let handles = spawn_consumers(source.watch(), dispatcher, 4, stop_rx);

    tx.send(port_update("p1", "n1")).unwrap();
    tx.send(port_update("p2", "n1")).unwrap();
    tx.send(Notification::PortDelete {
        port_id: "p2".to_string(),
    })
    .unwrap();

    for _ in 0..100 {
        if inbox.is_delete_pending("p2") && inbox.is_update_pending("p1") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    tx.send(Notification::NetworkUpdate {
        network: NetworkNotice {
            id: "n1".to_string(),
        },
    })
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(inbox.is_update_pending("p1"));
    assert!(!inbox.is_update_pending("p2"));
    assert!(inbox.is_delete_pending("p2"));

    stop_tx.send(true).unwrap();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("consumer stops on shutdown")
            .unwrap();
    }
}

#[tokio::test]
async fn deleted_port_is_not_reported_up() {
    let device = RecordingDeviceGateway::new().with_vlan("Project_t1", "vlan-n1", 7);
    let store = MemoryPortStore::new();
    bind_vlan_port(&store, "p1", "n1", "t1", "h1", "s1", 42).await;
    bind_vlan_port(&store, "p2", "n1", "t1", "h1", "s2", 42).await;
    let control = RecordingControlPlane::new();
    let inbox = Arc::new(NotificationInbox::new());
    let reconciler = reconciler_for("h1", &device, &store, &control, Arc::clone(&inbox));

    inbox.record_port_updated("p2");
    inbox.record_port_deleted("p2");

    reconciler.run_cycle().await.unwrap();

    let lists = control.device_lists();
    assert_eq!(lists.len(), 1);
    assert_eq!(lists[0].up, vec!["p1".to_string()]);
    assert_eq!(inbox.pending_counts(), (0, 0), "addressed entries are drained");
}

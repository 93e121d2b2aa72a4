//! Pending port notifications
//!
//! Message consumers record what the controller told us; the reconciliation
//! loop drains it once per cycle. The inbox only decides *which ports to
//! mention* in the device status report: desired state is always re-read
//! from the port store, so a lost or reordered notification costs at most
//! one cycle of latency.
//!
//! ## Invariants
//!
//! - A port id is never pending in both sets at once
//! - A deletion wins over an update recorded later for the same port
//! - Every mutation is applied under one lock acquisition, so no reader
//!   observes half of a notification

mod dispatcher;

pub use dispatcher::{Handler, NotificationDispatcher};

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

#[derive(Debug, Default)]
struct InboxState {
    updated: HashSet<String>,
    deleted: HashSet<String>,
    /// network id -> ports seen on it
    network_ports: HashMap<String, HashSet<String>>,
}

/// What was pending when a cycle started
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboxSnapshot {
    pub updated: HashSet<String>,
    pub deleted: HashSet<String>,
}

/// Pending port-update and port-delete notifications
///
/// Shared as `Arc<NotificationInbox>` between the consumer tasks and the
/// agent loop.
#[derive(Debug, Default)]
pub struct NotificationInbox {
    inner: Mutex<InboxState>,
}

impl NotificationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    // Every critical section is a handful of set operations and cannot
    // leave the state half-written, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, InboxState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a port update
    ///
    /// Ignored if a delete for the same port is still pending. Returns
    /// whether the port is now pending as updated.
    pub fn record_port_updated(&self, port_id: &str) -> bool {
        let mut state = self.state();
        if state.deleted.contains(port_id) {
            debug!("Ignoring update for deleted port {}", port_id);
            return false;
        }
        state.updated.insert(port_id.to_string());
        true
    }

    /// Record a port deletion, superseding any pending update
    pub fn record_port_deleted(&self, port_id: &str) {
        let mut state = self.state();
        state.updated.remove(port_id);
        state.deleted.insert(port_id.to_string());
        for ports in state.network_ports.values_mut() {
            ports.remove(port_id);
        }
    }

    /// Record a network update by marking its known ports updated
    ///
    /// Ports with a pending delete are skipped. Returns how many ports
    /// were marked.
    pub fn record_network_updated<I, S>(&self, network_id: &str, known_ports: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut state = self.state();
        let mut marked = 0;
        for port_id in known_ports {
            let port_id = port_id.as_ref();
            if state.deleted.contains(port_id) {
                continue;
            }
            state.updated.insert(port_id.to_string());
            marked += 1;
        }
        debug!("Network {} update marked {} port(s)", network_id, marked);
        marked
    }

    /// Remember that a port lives on a network
    pub fn remember_port_network(&self, port_id: &str, network_id: &str) {
        let mut state = self.state();
        if state.deleted.contains(port_id) {
            return;
        }
        state
            .network_ports
            .entry(network_id.to_string())
            .or_default()
            .insert(port_id.to_string());
    }

    /// Drop everything known about a network's ports
    pub fn forget_network(&self, network_id: &str) {
        self.state().network_ports.remove(network_id);
    }

    /// Ports last seen on a network
    pub fn ports_for_network(&self, network_id: &str) -> Vec<String> {
        let state = self.state();
        let mut ports: Vec<String> = state
            .network_ports
            .get(network_id)
            .map(|ports| ports.iter().cloned().collect())
            .unwrap_or_default();
        ports.sort();
        ports
    }

    /// Copy both pending sets without draining them
    pub fn peek(&self) -> InboxSnapshot {
        let state = self.state();
        InboxSnapshot {
            updated: state.updated.clone(),
            deleted: state.deleted.clone(),
        }
    }

    /// Drain the entries a cycle has addressed
    ///
    /// Only ids present in `addressed` are removed; notifications recorded
    /// after the matching `peek` stay pending for the next cycle.
    pub fn settle(&self, addressed: &InboxSnapshot) {
        let mut state = self.state();
        state.updated.retain(|id| !addressed.updated.contains(id));
        state.deleted.retain(|id| !addressed.deleted.contains(id));
    }

    pub fn is_update_pending(&self, port_id: &str) -> bool {
        self.state().updated.contains(port_id)
    }

    pub fn is_delete_pending(&self, port_id: &str) -> bool {
        self.state().deleted.contains(port_id)
    }

    /// (pending updates, pending deletes)
    pub fn pending_counts(&self) -> (usize, usize) {
        let state = self.state();
        (state.updated.len(), state.deleted.len())
    }
}

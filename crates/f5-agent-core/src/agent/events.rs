//! Events emitted by the agent for monitoring

use tokio::sync::mpsc;
use tracing::warn;

use super::AgentPhase;
use crate::naming::VlanIdentity;
use crate::reconciler::CycleReport;

/// Events emitted by the agent loop, the reconciler and the heartbeat
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// The agent moved to a new phase
    PhaseChanged { phase: AgentPhase },

    /// A reconciliation cycle finished
    CycleCompleted { iteration: u64, report: CycleReport },

    /// A reconciliation cycle failed before its scan completed
    CycleFailed { iteration: u64, error: String },

    /// A VLAN tag was rewritten to the desired value
    VlanTagCorrected {
        port_id: String,
        vlan: VlanIdentity,
        previous_tag: u16,
        tag: u16,
    },

    /// A missing VLAN was created
    VlanCreated {
        port_id: String,
        vlan: VlanIdentity,
        tag: u16,
    },

    /// A VLAN that should exist does not
    VlanMissing { port_id: String, vlan: VlanIdentity },

    /// A port's segments did not match the configured physical networks
    SegmentMismatch { port_id: String },

    /// Reconciling a single port failed
    PortFailed { port_id: String, error: String },

    /// Agent state reported
    HeartbeatSucceeded { start_flag: bool },

    /// Agent state could not be reported
    HeartbeatFailed { error: String },

    /// Configuration reloaded after a reconfiguration signal
    Reconfigured,
}

/// Sending half of the event channel
///
/// Emitting never blocks: when the channel is full the event is dropped
/// with a warning.
#[derive(Debug, Clone, Default)]
pub struct EventSink {
    tx: Option<mpsc::Sender<AgentEvent>>,
}

impl EventSink {
    /// Bounded event channel
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }

    /// A sink that discards everything
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn emit(&self, event: AgentEvent) {
        let Some(tx) = &self.tx else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    "Event channel full, dropping event. Consider increasing event_channel_capacity."
                );
            }
            // Nobody is listening any more
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

// # f5-agent-core
//
// Core library of the F5 VLAN binding agent.
//
// The agent keeps the VLAN configuration of a physical load-balancer
// appliance consistent with the segment assignments of the network plane,
// and reports per-port binding state back to the controller.
//
// ## Architecture Overview
//
// - **DeviceGateway**: VLAN CRUD on the appliance (folder/partition scoped)
// - **PortStore**: read-only access to ports, networks, segments, binding levels
// - **ControlPlane**: heartbeat and device status RPCs exposed by the controller
// - **NotificationSource**: inbound port/network notifications
// - **NotificationInbox**: pending port updates/deletes, shared between
//   message consumers and the reconciliation loop
// - **Reconciler**: diffs desired segment tags against observed VLAN tags and
//   repairs divergence
// - **F5Agent**: the agent loop (signals, periodic cycles, heartbeat, drain)
// - **AgentRegistry**: named constructors for every external collaborator
//
// ## Design Principles
//
// 1. Every cycle re-derives truth from the PortStore and DeviceGateway;
//    the inbox is a hint, never the source of truth
// 2. One failing port never stops the rest of the cycle
// 3. Collaborators are selected by configuration through the registry
// 4. Everything the daemon does is available as a library

pub mod adapters;
pub mod agent;
pub mod config;
pub mod error;
pub mod inbox;
pub mod model;
pub mod naming;
pub mod reconciler;
pub mod registry;
pub mod traits;

pub use adapters::{FilePortStore, LogControlPlane, MemoryDeviceGateway, MemoryPortStore, PortSnapshot};
pub use agent::{AgentEvent, AgentPhase, EventSink, F5Agent, Heartbeat, Reconfigure, SignalLatch};
pub use config::{AgentConfig, AgentSettings, MissingVlanPolicy};
pub use error::{Error, Result};
pub use inbox::{InboxSnapshot, NotificationDispatcher, NotificationInbox};
pub use model::{AgentState, BindingLevel, DeviceVlan, Network, Port, PortFilter, Segment};
pub use naming::{VlanIdentity, VlanNaming};
pub use reconciler::{CycleReport, Reconciler, ReconcilerSettings};
pub use registry::AgentRegistry;
pub use traits::{ControlPlane, DeviceGateway, Notification, NotificationSource, PortStore};

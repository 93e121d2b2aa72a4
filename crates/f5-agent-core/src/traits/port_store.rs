// # Port Store Trait
//
// Read-only access to the network plane's records: ports, networks,
// segments and binding levels.
//
// The agent never writes to the store and never keeps a copy of its
// records beyond the current reconciliation cycle.

use async_trait::async_trait;

use crate::model::{BindingLevel, Network, Port, PortFilter, Segment};

/// Trait for port store implementations
///
/// All methods must be safe to call concurrently from multiple tasks.
/// Missing records are `Ok(None)` / empty, not errors; errors mean the
/// store could not be queried.
#[async_trait]
pub trait PortStore: Send + Sync {
    /// List ports matching `filter`
    async fn list_ports(&self, filter: &PortFilter) -> Result<Vec<Port>, crate::Error>;

    /// Fetch a network by id
    async fn get_network(&self, network_id: &str) -> Result<Option<Network>, crate::Error>;

    /// Binding levels of a port on a host, ordered by level
    async fn get_binding_levels(
        &self,
        port_id: &str,
        host: &str,
    ) -> Result<Vec<BindingLevel>, crate::Error>;

    /// Fetch a segment by id
    async fn get_segment_by_id(&self, segment_id: &str) -> Result<Option<Segment>, crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing port stores from configuration
pub trait PortStoreFactory: Send + Sync {
    fn create(&self, config: &crate::config::AgentConfig)
    -> Result<Box<dyn PortStore>, crate::Error>;
}

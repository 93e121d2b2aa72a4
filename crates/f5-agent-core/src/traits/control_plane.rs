// # Control Plane Trait
//
// RPCs the agent consumes from the controller: liveness reports and
// per-port device status.

use async_trait::async_trait;

use crate::model::{AgentState, DeviceListResult};
use crate::traits::NotificationSource;

/// Trait for control plane implementations
///
/// Both calls are single-shot. The heartbeat and the reconciler decide what
/// a failure means; implementations just return it.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Report liveness and configuration
    async fn report_state(&self, state: &AgentState) -> Result<(), crate::Error>;

    /// Report which ports are wired up (`up`) and which are not (`down`)
    async fn update_device_list(
        &self,
        up: &[String],
        down: &[String],
        agent_id: &str,
        host: &str,
    ) -> Result<DeviceListResult, crate::Error>;

    /// Control plane name (for logging/debugging)
    fn control_plane_name(&self) -> &'static str;
}

/// Helper trait for constructing control planes from configuration
pub trait ControlPlaneFactory: Send + Sync {
    fn create(
        &self,
        config: &crate::config::AgentConfig,
    ) -> Result<Box<dyn ControlPlane>, crate::Error>;

    /// Inbound notification transport paired with this control plane
    ///
    /// Control planes without a message transport return `None`; the agent
    /// then relies on polling alone.
    fn create_notification_source(
        &self,
        _config: &crate::config::AgentConfig,
    ) -> Result<Option<Box<dyn NotificationSource>>, crate::Error> {
        Ok(None)
    }
}

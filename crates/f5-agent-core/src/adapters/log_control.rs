// # Log Control Plane
//
// ControlPlane that accepts every report and writes it to the log.
// Used when the agent runs without a controller, e.g. during appliance
// bring-up.

use async_trait::async_trait;

use crate::Error;
use crate::config::AgentConfig;
use crate::model::{AgentState, DeviceListResult};
use crate::traits::{ControlPlane, ControlPlaneFactory};

#[derive(Debug, Clone, Default)]
pub struct LogControlPlane;

impl LogControlPlane {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ControlPlane for LogControlPlane {
    async fn report_state(&self, state: &AgentState) -> Result<(), Error> {
        tracing::info!(
            "Agent state: host={} type={} start_flag={:?}",
            state.host,
            state.agent_type,
            state.start_flag
        );
        Ok(())
    }

    async fn update_device_list(
        &self,
        up: &[String],
        down: &[String],
        agent_id: &str,
        host: &str,
    ) -> Result<DeviceListResult, Error> {
        tracing::info!(
            "Device list from {} on {}: up={:?} down={:?}",
            agent_id,
            host,
            up,
            down
        );
        Ok(DeviceListResult {
            devices_up: up.to_vec(),
            devices_down: down.to_vec(),
            ..Default::default()
        })
    }

    fn control_plane_name(&self) -> &'static str {
        "log"
    }
}

pub struct LogControlPlaneFactory;

impl ControlPlaneFactory for LogControlPlaneFactory {
    fn create(&self, _config: &AgentConfig) -> Result<Box<dyn ControlPlane>, Error> {
        Ok(Box::new(LogControlPlane::new()))
    }
}

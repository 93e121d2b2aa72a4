//! State reconciler
//!
//! One call to [`Reconciler::run_cycle`] compares, for every port bound to
//! this host through this integration, the desired VLAN tag (the segment's
//! segmentation id) with the tag observed on the appliance, and rewrites the
//! tag where they differ.
//!
//! ## Cycle
//!
//! 1. Peek the notification inbox
//! 2. List the host's ports
//! 3. Per port: binding levels of ours → VLAN segments → eligible segment →
//!    network → (folder, name) → VLAN lookup → tag correction
//! 4. Report ports up/down to the controller
//! 5. Settle the inbox entries the cycle addressed
//!
//! A failure on one port is logged and the scan moves on. Only a failure to
//! list the ports aborts the cycle.

mod report;

pub use report::CycleReport;

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::agent::{AgentEvent, EventSink};
use crate::config::{AgentConfig, MissingVlanPolicy};
use crate::error::{Error, Result};
use crate::inbox::NotificationInbox;
use crate::model::{DRIVER_NAME, Network, Port, PortFilter, Segment, agent_id};
use crate::naming::{VlanIdentity, VlanNaming};
use crate::traits::{ControlPlane, DeviceGateway, PortStore};

/// Reconciler settings that may change on reload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerSettings {
    pub host: String,
    pub naming: VlanNaming,
    /// Eligible physical networks; empty accepts the first VLAN segment
    pub physical_networks: Vec<String>,
    pub missing_vlan_policy: MissingVlanPolicy,
    /// Extra attempts for a device mutation failing with a transient error
    pub api_retries: usize,
    pub retry_delay: Duration,
    pub call_timeout: Duration,
}

impl From<&AgentConfig> for ReconcilerSettings {
    fn from(config: &AgentConfig) -> Self {
        Self {
            host: config.agent.host.clone(),
            naming: VlanNaming::from(&config.naming),
            physical_networks: config.physical_networks.clone(),
            missing_vlan_policy: config.agent.missing_vlan_policy,
            api_retries: config.agent.api_retries,
            retry_delay: config.agent.retry_delay(),
            call_timeout: config.agent.call_timeout(),
        }
    }
}

/// Outcome of a port that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PortOutcome {
    Skipped,
    InSync,
    Corrected,
    Created,
    Missing,
    Mismatched,
}

/// Diffs desired segment tags against the appliance and repairs divergence
pub struct Reconciler {
    device: Arc<dyn DeviceGateway>,
    store: Arc<dyn PortStore>,
    control: Arc<dyn ControlPlane>,
    inbox: Arc<NotificationInbox>,
    settings: RwLock<Arc<ReconcilerSettings>>,
    events: EventSink,
}

impl Reconciler {
    pub fn new(
        device: Arc<dyn DeviceGateway>,
        store: Arc<dyn PortStore>,
        control: Arc<dyn ControlPlane>,
        inbox: Arc<NotificationInbox>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            device,
            store,
            control,
            inbox,
            settings: RwLock::new(Arc::new(settings)),
            events: EventSink::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Settings the next cycle will use
    pub fn settings(&self) -> Arc<ReconcilerSettings> {
        let guard = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Replace the settings; takes effect at the next cycle
    pub fn apply_settings(&self, settings: ReconcilerSettings) {
        let mut guard = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        if **guard != settings {
            info!("Reconciler settings updated: {:?}", settings);
        }
        *guard = Arc::new(settings);
    }

    /// Run one reconciliation cycle
    ///
    /// # Errors
    ///
    /// Only when the host's ports cannot be listed. Per-port failures are
    /// counted in the report instead.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();
        let settings = self.settings();
        let pending = self.inbox.peek();

        let mut report = CycleReport {
            pending_updates: pending.updated.len(),
            pending_deletes: pending.deleted.len(),
            ..Default::default()
        };

        let ports = with_timeout(
            "list_ports",
            settings.call_timeout,
            self.store.list_ports(&PortFilter::for_host(&settings.host)),
        )
        .await?;

        let mut networks: HashMap<String, Network> = HashMap::new();
        let mut up = Vec::new();
        let mut down = Vec::new();

        for port in &ports {
            report.examined += 1;
            match self.reconcile_port(&settings, port, &mut networks).await {
                Ok(PortOutcome::Skipped) => report.skipped += 1,
                Ok(PortOutcome::InSync) => {
                    report.in_sync += 1;
                    if pending.updated.contains(&port.id) {
                        up.push(port.id.clone());
                    }
                }
                Ok(PortOutcome::Corrected) => {
                    report.corrected += 1;
                    up.push(port.id.clone());
                }
                Ok(PortOutcome::Created) => {
                    report.created += 1;
                    up.push(port.id.clone());
                }
                Ok(PortOutcome::Missing) => {
                    report.missing += 1;
                    down.push(port.id.clone());
                }
                Ok(PortOutcome::Mismatched) => {
                    report.mismatched += 1;
                    down.push(port.id.clone());
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Failed to reconcile port {}: {}", port.id, e);
                    self.events.emit(AgentEvent::PortFailed {
                        port_id: port.id.clone(),
                        error: e.to_string(),
                    });
                    down.push(port.id.clone());
                }
            }
        }

        // Deleted ports are the delete path's business
        up.retain(|id| !pending.deleted.contains(id));
        down.retain(|id| !pending.deleted.contains(id));

        let settled = if up.is_empty() && down.is_empty() {
            true
        } else {
            report.device_list_reported = self.report_devices(&settings, &up, &down).await;
            report.device_list_reported
        };

        // Unreported updates stay pending and are mentioned again next cycle
        if settled {
            self.inbox.settle(&pending);
        }

        report.devices_up = up;
        report.devices_down = down;
        report.elapsed = started.elapsed();
        Ok(report)
    }

    async fn reconcile_port(
        &self,
        settings: &ReconcilerSettings,
        port: &Port,
        networks: &mut HashMap<String, Network>,
    ) -> Result<PortOutcome> {
        let timeout = settings.call_timeout;
        let mut levels = with_timeout(
            "get_binding_levels",
            timeout,
            self.store.get_binding_levels(&port.id, &settings.host),
        )
        .await?;
        // Segment choice follows binding order whatever order the store returns
        levels.sort_by_key(|level| level.level);

        let mut segments = Vec::new();
        for level in levels.iter().filter(|level| level.driver == DRIVER_NAME) {
            let Some(segment_id) = level.segment_id.as_deref() else {
                continue;
            };
            match with_timeout(
                "get_segment_by_id",
                timeout,
                self.store.get_segment_by_id(segment_id),
            )
            .await?
            {
                Some(segment) if segment.is_vlan() => segments.push(segment),
                Some(segment) => debug!(
                    "Port {} is bound to {} segment {}, nothing to reconcile",
                    port.id, segment.network_type, segment.id
                ),
                None => debug!("Segment {} of port {} not found", segment_id, port.id),
            }
        }

        if segments.is_empty() {
            debug!("Port {} has no VLAN segment bound by {}", port.id, DRIVER_NAME);
            return Ok(PortOutcome::Skipped);
        }

        let Some(segment) = select_segment(&segments, &settings.physical_networks) else {
            error!(
                "Port {}: no VLAN segment on the configured physical networks {:?}",
                port.id, settings.physical_networks
            );
            self.events.emit(AgentEvent::SegmentMismatch {
                port_id: port.id.clone(),
            });
            return Ok(PortOutcome::Mismatched);
        };

        let tag = segment.vlan_tag().ok_or_else(|| {
            Error::invalid_input(format!(
                "segment {} has no usable VLAN tag ({:?})",
                segment.id, segment.segmentation_id
            ))
        })?;

        let network = match networks.get(&segment.network_id) {
            Some(network) => network.clone(),
            None => {
                let network = with_timeout(
                    "get_network",
                    timeout,
                    self.store.get_network(&segment.network_id),
                )
                .await?
                .ok_or_else(|| Error::not_found(format!("network {}", segment.network_id)))?;
                networks.insert(network.id.clone(), network.clone());
                network
            }
        };
        let vlan = settings.naming.identity(&network)?;

        let exists = with_timeout(
            "vlan_exists",
            timeout,
            self.device.vlan_exists(&vlan.name, &vlan.folder),
        )
        .await?;
        if !exists {
            return self.handle_missing(settings, port, vlan, tag).await;
        }

        let observed = with_timeout(
            "load_vlan",
            timeout,
            self.device.load_vlan(&vlan.name, &vlan.folder),
        )
        .await?;
        if observed.tag == tag {
            debug!("Port {}: VLAN {} in sync (tag {})", port.id, vlan, tag);
            return Ok(PortOutcome::InSync);
        }

        info!(
            "Port {}: VLAN {} has tag {}, setting {}",
            port.id, vlan, observed.tag, tag
        );
        self.mutate(settings, "update_vlan_tag", || {
            self.device.update_vlan_tag(&vlan.name, &vlan.folder, tag)
        })
        .await?;

        self.events.emit(AgentEvent::VlanTagCorrected {
            port_id: port.id.clone(),
            vlan,
            previous_tag: observed.tag,
            tag,
        });
        Ok(PortOutcome::Corrected)
    }

    async fn handle_missing(
        &self,
        settings: &ReconcilerSettings,
        port: &Port,
        vlan: VlanIdentity,
        tag: u16,
    ) -> Result<PortOutcome> {
        match settings.missing_vlan_policy {
            MissingVlanPolicy::Report => {
                warn!("Port {}: VLAN {} does not exist on the device", port.id, vlan);
                self.events.emit(AgentEvent::VlanMissing {
                    port_id: port.id.clone(),
                    vlan,
                });
                Ok(PortOutcome::Missing)
            }
            MissingVlanPolicy::Create => {
                info!("Port {}: creating VLAN {} with tag {}", port.id, vlan, tag);
                self.mutate(settings, "create_vlan", || {
                    self.device.create_vlan(&vlan.name, &vlan.folder, tag)
                })
                .await?;
                self.events.emit(AgentEvent::VlanCreated {
                    port_id: port.id.clone(),
                    vlan,
                    tag,
                });
                Ok(PortOutcome::Created)
            }
        }
    }

    /// Issue a device mutation, retrying transient failures
    async fn mutate<F, Fut>(
        &self,
        settings: &ReconcilerSettings,
        operation: &str,
        mut call: F,
    ) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut attempt = 0;
        loop {
            match with_timeout(operation, settings.call_timeout, call()).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < settings.api_retries => {
                    attempt += 1;
                    warn!(
                        "{} attempt {} of {} failed: {}",
                        operation,
                        attempt,
                        settings.api_retries + 1,
                        e
                    );
                    tokio::time::sleep(settings.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn report_devices(
        &self,
        settings: &ReconcilerSettings,
        up: &[String],
        down: &[String],
    ) -> bool {
        let agent_id = agent_id(&settings.host);
        info!(
            "Updating ports up {:?} down {:?} agent {} host {}",
            up, down, agent_id, settings.host
        );
        match with_timeout(
            "update_device_list",
            settings.call_timeout,
            self.control
                .update_device_list(up, down, &agent_id, &settings.host),
        )
        .await
        {
            Ok(result) => {
                if !result.failed_devices_up.is_empty() || !result.failed_devices_down.is_empty() {
                    warn!(
                        "Controller rejected device status: failed up {:?}, failed down {:?}",
                        result.failed_devices_up, result.failed_devices_down
                    );
                }
                true
            }
            Err(e) => {
                warn!("Failed to report device status: {}", e);
                false
            }
        }
    }
}

/// Pick the segment to reconcile among a port's VLAN segments
///
/// With no configured physical networks the first segment wins; otherwise
/// the first whose physical network is configured.
pub fn select_segment<'a>(
    segments: &'a [Segment],
    physical_networks: &[String],
) -> Option<&'a Segment> {
    if physical_networks.is_empty() {
        return segments.first();
    }
    segments.iter().find(|segment| {
        segment
            .physical_network
            .as_ref()
            .is_some_and(|physnet| physical_networks.contains(physnet))
    })
}

/// Bound a collaborator call
pub(crate) async fn with_timeout<T, F>(operation: &str, after: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, call).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, after)),
    }
}

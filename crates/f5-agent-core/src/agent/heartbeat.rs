//! Liveness reporting
//!
//! Runs on its own task and interval, so a slow reconciliation cycle never
//! delays a report and a failed report never touches the cycle.

use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use super::{AgentEvent, EventSink};
use crate::error::Result;
use crate::model::AgentState;
use crate::reconciler::with_timeout;
use crate::traits::ControlPlane;

/// Reports [`AgentState`] to the controller
///
/// The state carries `start_flag` until the first report that succeeds.
pub struct Heartbeat {
    control: Arc<dyn ControlPlane>,
    state: Mutex<AgentState>,
    last_success: Mutex<Option<DateTime<Utc>>>,
    timeout: Duration,
    events: EventSink,
}

impl Heartbeat {
    pub fn new(control: Arc<dyn ControlPlane>, state: AgentState, timeout: Duration) -> Self {
        Self {
            control,
            state: Mutex::new(state),
            last_success: Mutex::new(None),
            timeout,
            events: EventSink::disabled(),
        }
    }

    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    fn state(&self) -> MutexGuard<'_, AgentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether the next report still carries the start flag
    pub fn start_flag_pending(&self) -> bool {
        self.state().start_flag.is_some()
    }

    /// When the controller last accepted a report
    pub fn last_success(&self) -> Option<DateTime<Utc>> {
        *self.last_success.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the configuration snapshot sent with each report
    pub fn set_configurations(&self, configurations: serde_json::Value) {
        self.state().configurations = configurations;
    }

    /// Send one report
    ///
    /// Failures are logged and returned; the start flag survives them.
    pub async fn report_once(&self) -> Result<()> {
        let payload = self.state().clone();

        match with_timeout("report_state", self.timeout, self.control.report_state(&payload)).await {
            Ok(()) => {
                let start_flag = payload.start_flag.is_some();
                if start_flag {
                    self.state().start_flag = None;
                }
                *self.last_success.lock().unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
                debug!("Agent state reported (start_flag={})", start_flag);
                self.events.emit(AgentEvent::HeartbeatSucceeded { start_flag });
                Ok(())
            }
            Err(e) => {
                match self.last_success() {
                    Some(at) => warn!("Failed reporting state: {} (last success {})", e, at.to_rfc3339()),
                    None => warn!("Failed reporting state: {}", e),
                }
                self.events.emit(AgentEvent::HeartbeatFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Report every `interval` until `shutdown` turns true
    ///
    /// The first report is sent immediately.
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let _ = self.report_once().await;
                    }
                    _ = async { let _ = shutdown.wait_for(|&stop| stop).await; } => break,
                }
            }
            debug!("Heartbeat stopped");
        })
    }
}

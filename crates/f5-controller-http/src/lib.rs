// # HTTP Control Plane
//
// ControlPlane and NotificationSource backed by the controller's HTTP API.
//
// ## Endpoints
//
// - Heartbeat: POST `<url>/agents/report_state`
// - Device status: POST `<url>/agents/update_device_list`
// - Notifications: GET `<url>/agents/<agent_id>/notifications`, polled
//
// Requests carry the token as `X-Auth-Token` when one is configured.
// RPCs are single-shot; the heartbeat and reconciler own failure handling.

use async_trait::async_trait;
use f5_agent_core::config::{AgentConfig, ControlPlaneConfig};
use f5_agent_core::model::{AgentState, DeviceListResult, agent_id};
use f5_agent_core::traits::{ControlPlane, ControlPlaneFactory, Notification, NotificationSource};
use f5_agent_core::{AgentRegistry, Error, Result};
use serde::Serialize;
use std::pin::Pin;
use std::time::Duration;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;

const AUTH_HEADER: &str = "X-Auth-Token";

/// Default HTTP timeout for controller requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection details shared by the RPC client and the notification poller
#[derive(Clone)]
struct ControllerClient {
    base_url: String,
    /// ⚠️ NEVER log this value
    token: Option<String>,
    client: reqwest::Client,
}

impl std::fmt::Debug for ControllerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerClient")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl ControllerClient {
    fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .client
            .request(method, self.url(path))
            .header("Content-Type", "application/json");
        match &self.token {
            Some(token) => builder.header(AUTH_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| Error::http(format!("{} failed: {}", what, e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read error response".to_string());

        Err(match status.as_u16() {
            401 | 403 => Error::auth(format!(
                "{} rejected: invalid token or insufficient permissions. Status: {}",
                what, status
            )),
            404 => Error::not_found(format!("{}: endpoint not found", what)),
            _ => Error::control_plane(format!("{} failed: {} - {}", what, status, error_text)),
        })
    }

    async fn fetch_notifications(&self, agent_id: &str) -> Result<Vec<Notification>> {
        let path = format!("/agents/{}/notifications", agent_id);
        let response = self
            .send(self.request(reqwest::Method::GET, &path), "Notification poll")
            .await?;

        let entries: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| Error::control_plane(format!("Failed to parse notifications: {}", e)))?;

        Ok(parse_notifications(entries))
    }
}

/// Keep the notifications we understand; log and drop the rest
fn parse_notifications(entries: Vec<serde_json::Value>) -> Vec<Notification> {
    entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_value::<Notification>(entry.clone()) {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::warn!("Skipping unrecognised notification {}: {}", entry, e);
                None
            }
        })
        .collect()
}

#[derive(Serialize)]
struct ReportStateRequest<'a> {
    agent_state: &'a AgentState,
    time: String,
}

#[derive(Serialize)]
struct DeviceListRequest<'a> {
    devices_up: &'a [String],
    devices_down: &'a [String],
    agent_id: &'a str,
    host: &'a str,
}

/// Controller RPCs over HTTP
#[derive(Debug)]
pub struct HttpControlPlane {
    client: ControllerClient,
}

impl HttpControlPlane {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: ControllerClient::new(url, token, timeout)?,
        })
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn report_state(&self, state: &AgentState) -> Result<()> {
        let body = ReportStateRequest {
            agent_state: state,
            time: chrono::Utc::now().to_rfc3339(),
        };
        self.client
            .send(
                self.client
                    .request(reqwest::Method::POST, "/agents/report_state")
                    .json(&body),
                "State report",
            )
            .await?;
        Ok(())
    }

    async fn update_device_list(
        &self,
        up: &[String],
        down: &[String],
        agent_id: &str,
        host: &str,
    ) -> Result<DeviceListResult> {
        let body = DeviceListRequest {
            devices_up: up,
            devices_down: down,
            agent_id,
            host,
        };
        let response = self
            .client
            .send(
                self.client
                    .request(reqwest::Method::POST, "/agents/update_device_list")
                    .json(&body),
                "Device list update",
            )
            .await?;

        response
            .json::<DeviceListResult>()
            .await
            .map_err(|e| Error::control_plane(format!("Failed to parse response: {}", e)))
    }

    fn control_plane_name(&self) -> &'static str {
        "http"
    }
}

/// Polls the controller for notifications addressed to this agent
#[derive(Debug)]
pub struct HttpNotificationSource {
    client: ControllerClient,
    agent_id: String,
    poll_interval: Duration,
}

impl HttpNotificationSource {
    pub fn new(
        url: impl Into<String>,
        token: Option<String>,
        agent_id: impl Into<String>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: ControllerClient::new(url, token, timeout)?,
            agent_id: agent_id.into(),
            poll_interval,
        })
    }
}

impl NotificationSource for HttpNotificationSource {
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Notification> + Send + 'static>> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();

        let client = self.client.clone();
        let agent_id = self.agent_id.clone();
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            tracing::info!(
                "Starting notification polling (agent_id={}, interval={:?})",
                agent_id,
                poll_interval
            );

            loop {
                match client.fetch_notifications(&agent_id).await {
                    Ok(notifications) => {
                        for notification in notifications {
                            if tx.send(notification).is_err() {
                                tracing::debug!("Receiver dropped, stopping notification poller");
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Notification poll failed: {}", e);
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {}
                    _ = tx.closed() => {
                        tracing::debug!("Receiver dropped, stopping notification poller");
                        return;
                    }
                }
            }
        });

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}

/// Factory for the HTTP control plane and its notification poller
pub struct HttpControlPlaneFactory;

impl ControlPlaneFactory for HttpControlPlaneFactory {
    fn create(&self, config: &AgentConfig) -> Result<Box<dyn ControlPlane>> {
        match &config.control_plane {
            ControlPlaneConfig::Http { url, token, .. } => {
                let timeout = config.agent.call_timeout().min(DEFAULT_HTTP_TIMEOUT);
                Ok(Box::new(HttpControlPlane::new(
                    url.clone(),
                    token.clone(),
                    timeout,
                )?))
            }
            _ => Err(Error::config("Invalid config for HTTP control plane")),
        }
    }

    fn create_notification_source(
        &self,
        config: &AgentConfig,
    ) -> Result<Option<Box<dyn NotificationSource>>> {
        match &config.control_plane {
            ControlPlaneConfig::Http {
                url,
                token,
                poll_interval_secs,
            } => {
                let timeout = config.agent.call_timeout().min(DEFAULT_HTTP_TIMEOUT);
                Ok(Some(Box::new(HttpNotificationSource::new(
                    url.clone(),
                    token.clone(),
                    agent_id(&config.agent.host),
                    Duration::from_secs(*poll_interval_secs),
                    timeout,
                )?)))
            }
            _ => Err(Error::config("Invalid config for HTTP control plane")),
        }
    }
}

/// Register the HTTP control plane with a registry
pub fn register(registry: &AgentRegistry) {
    registry.register_control_plane("http", Box::new(HttpControlPlaneFactory));
}

// # iControl REST Device Gateway
//
// DeviceGateway for BIG-IP appliances, speaking the iControl REST API.
//
// Every trait method is a single HTTP request. Retries, timeouts across
// attempts and the decision to mutate are owned by the Reconciler.
//
// ## Endpoints
//
// - List VLANs: GET `/mgmt/tm/net/vlan?$filter=partition eq <folder>`
// - Read VLAN: GET `/mgmt/tm/net/vlan/~<folder>~<name>`
// - Update tag: PATCH `/mgmt/tm/net/vlan/~<folder>~<name>` `{"tag": n}`
// - Create VLAN: POST `/mgmt/tm/net/vlan` `{"name", "partition", "tag"}`
//
// ## Security
//
// The password never appears in logs or Debug output.

use async_trait::async_trait;
use f5_agent_core::config::{AgentConfig, DeviceConfig};
use f5_agent_core::traits::{DeviceGateway, DeviceGatewayFactory};
use f5_agent_core::{AgentRegistry, DeviceVlan, Error, Result};
use serde::Deserialize;
use std::time::Duration;

const DRIVER: &str = "icontrol";

const VLAN_COLLECTION: &str = "/mgmt/tm/net/vlan";

/// Default HTTP timeout for API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct VlanResource {
    name: String,
    #[serde(default)]
    partition: Option<String>,
    #[serde(default)]
    tag: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct VlanCollection {
    #[serde(default)]
    items: Vec<VlanResource>,
}

impl VlanResource {
    fn into_device_vlan(self, folder: &str) -> DeviceVlan {
        DeviceVlan {
            name: self.name,
            folder: self.partition.unwrap_or_else(|| folder.to_string()),
            tag: self.tag.unwrap_or(0),
        }
    }
}

/// iControl REST gateway
///
/// # Dry-Run Mode
///
/// When `dry_run` is true the gateway still performs every GET, but
/// PATCH and POST requests are only logged.
pub struct IcontrolGateway {
    /// Management base URL, without trailing slash
    base_url: String,

    username: String,

    /// ⚠️ NEVER log this value
    password: String,

    client: reqwest::Client,

    dry_run: bool,
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for IcontrolGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IcontrolGateway")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl IcontrolGateway {
    /// Create a gateway for the appliance at `base_url`
    ///
    /// `verify_tls = false` accepts self-signed management certificates,
    /// which is how most appliances ship.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        verify_tls: bool,
        dry_run: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let username = username.into();
        let password = password.into();
        if username.is_empty() || password.is_empty() {
            return Err(Error::config("iControl credentials cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!verify_tls)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username,
            password,
            client,
            dry_run,
        })
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn collection_url(&self) -> String {
        format!("{}{}", self.base_url, VLAN_COLLECTION)
    }

    /// iControl addresses objects as `~<partition>~<name>`
    fn vlan_url(&self, name: &str, folder: &str) -> String {
        format!("{}{}/~{}~{}", self.base_url, VLAN_COLLECTION, folder, name)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(&self.username, Some(&self.password))
            .header("Content-Type", "application/json")
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        builder.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::device(DRIVER, format!("Request timed out: {}", e))
            } else {
                Error::http(format!("iControl request failed: {}", e))
            }
        })
    }

    async fn get_vlan(&self, name: &str, folder: &str) -> Result<Option<VlanResource>> {
        let url = self.vlan_url(name, folder);
        let response = self.send(self.request(reqwest::Method::GET, &url)).await?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let error_text = read_error_text(response).await;
            return Err(map_status(
                status.as_u16(),
                &error_text,
                &format!("VLAN lookup {}/{}", folder, name),
            ));
        }

        let resource: VlanResource = response
            .json()
            .await
            .map_err(|e| Error::device(DRIVER, format!("Failed to parse response: {}", e)))?;
        Ok(Some(resource))
    }
}

async fn read_error_text(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "Unable to read error response".to_string())
}

/// Map a non-success iControl status to an agent error
///
/// 429 and 5xx come back as `Error::Device`, which the reconciler retries.
fn map_status(status: u16, error_text: &str, context: &str) -> Error {
    match status {
        401 | 403 => Error::auth(format!(
            "{}: authentication failed or insufficient role. Status: {}",
            context, status
        )),
        404 => Error::not_found(format!("{}: not found", context)),
        409 => Error::invalid_input(format!("{}: conflict - {}", context, error_text)),
        429 => Error::device(
            DRIVER,
            format!("{}: rate limited. Status: {}", context, status),
        ),
        500..=599 => Error::device(
            DRIVER,
            format!("{}: appliance error (transient): {} - {}", context, status, error_text),
        ),
        _ => Error::device_gateway(format!("{}: {} - {}", context, status, error_text)),
    }
}

#[async_trait]
impl DeviceGateway for IcontrolGateway {
    async fn list_vlans(&self, folder: &str) -> Result<Vec<DeviceVlan>> {
        let url = self.collection_url();
        let filter = format!("partition eq {}", folder);
        let response = self
            .send(
                self.request(reqwest::Method::GET, &url)
                    .query(&[("$filter", filter.as_str())]),
            )
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = read_error_text(response).await;
            return Err(map_status(
                status.as_u16(),
                &error_text,
                &format!("VLAN list in {}", folder),
            ));
        }

        let collection: VlanCollection = response
            .json()
            .await
            .map_err(|e| Error::device(DRIVER, format!("Failed to parse response: {}", e)))?;

        Ok(collection
            .items
            .into_iter()
            .map(|item| item.into_device_vlan(folder))
            .filter(|vlan| vlan.folder == folder)
            .collect())
    }

    async fn vlan_exists(&self, name: &str, folder: &str) -> Result<bool> {
        Ok(self.get_vlan(name, folder).await?.is_some())
    }

    async fn load_vlan(&self, name: &str, folder: &str) -> Result<DeviceVlan> {
        self.get_vlan(name, folder)
            .await?
            .map(|resource| resource.into_device_vlan(folder))
            .ok_or_else(|| Error::not_found(format!("VLAN {}/{} not found", folder, name)))
    }

    async fn update_vlan_tag(&self, name: &str, folder: &str, tag: u16) -> Result<()> {
        let url = self.vlan_url(name, folder);
        let payload = serde_json::json!({ "tag": tag });

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send PATCH request to {} with payload: {}",
                url,
                payload
            );
            return Ok(());
        }

        let response = self
            .send(self.request(reqwest::Method::PATCH, &url).json(&payload))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = read_error_text(response).await;
            return Err(map_status(
                status.as_u16(),
                &error_text,
                &format!("VLAN tag update {}/{}", folder, name),
            ));
        }

        tracing::info!("VLAN {}/{} tag set to {}", folder, name, tag);
        Ok(())
    }

    async fn create_vlan(&self, name: &str, folder: &str, tag: u16) -> Result<()> {
        let url = self.collection_url();
        let payload = serde_json::json!({
            "name": name,
            "partition": folder,
            "tag": tag,
        });

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would send POST request to {} with payload: {}",
                url,
                payload
            );
            return Ok(());
        }

        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(&payload))
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = read_error_text(response).await;
            return Err(map_status(
                status.as_u16(),
                &error_text,
                &format!("VLAN create {}/{}", folder, name),
            ));
        }

        tracing::info!("VLAN {}/{} created with tag {}", folder, name, tag);
        Ok(())
    }

    fn driver_name(&self) -> &'static str {
        DRIVER
    }
}

/// Factory for creating iControl gateways
pub struct IcontrolFactory;

impl DeviceGatewayFactory for IcontrolFactory {
    fn create(&self, config: &AgentConfig) -> Result<Box<dyn DeviceGateway>> {
        match &config.device {
            DeviceConfig::Icontrol {
                host,
                username,
                password,
                verify_tls,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!(
                        "iControl gateway running in DRY-RUN mode - no VLAN will be changed"
                    );
                }
                if !*verify_tls {
                    tracing::warn!("TLS certificate verification disabled for {}", host);
                }

                let timeout = config.agent.call_timeout().min(DEFAULT_HTTP_TIMEOUT);
                Ok(Box::new(IcontrolGateway::new(
                    host.clone(),
                    username.clone(),
                    password.clone(),
                    *verify_tls,
                    *dry_run,
                    timeout,
                )?))
            }
            _ => Err(Error::config("Invalid config for iControl gateway")),
        }
    }
}

/// Register the iControl gateway with a registry
///
/// ```rust
/// use f5_agent_core::AgentRegistry;
///
/// let registry = AgentRegistry::with_builtins();
/// f5_device_icontrol::register(&registry);
/// assert!(registry.has_device_gateway("icontrol"));
/// ```
pub fn register(registry: &AgentRegistry) {
    registry.register_device_gateway(DRIVER, Box::new(IcontrolFactory));
}

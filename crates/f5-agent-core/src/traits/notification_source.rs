// # Notification Source Trait
//
// Inbound port and network notifications published by the controller.
//
// ## Usage
//
// ```rust,ignore
// use f5_agent_core::NotificationSource;
// use tokio_stream::StreamExt;
//
// let source = /* NotificationSource implementation */;
// let mut stream = source.watch();
// while let Some(notification) = stream.next().await {
//     dispatcher.dispatch(notification);
// }
// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use tokio_stream::Stream;

/// Port as carried in a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortNotice {
    pub id: String,
    #[serde(default)]
    pub network_id: Option<String>,
}

/// Network as carried in a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkNotice {
    pub id: String,
}

/// An inbound notification
///
/// Wire form: `{"event": "port_update", "payload": {"port": {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum Notification {
    PortCreate { port: PortNotice },
    PortUpdate { port: PortNotice },
    PortDelete { port_id: String },
    NetworkCreate { network: NetworkNotice },
    NetworkUpdate { network: NetworkNotice },
    NetworkDelete { network_id: String },
}

impl Notification {
    /// Topic this notification was published on
    pub fn topic(&self) -> Topic {
        match self {
            Notification::PortCreate { .. } => Topic::new(Resource::Port, Action::Create),
            Notification::PortUpdate { .. } => Topic::new(Resource::Port, Action::Update),
            Notification::PortDelete { .. } => Topic::new(Resource::Port, Action::Delete),
            Notification::NetworkCreate { .. } => Topic::new(Resource::Network, Action::Create),
            Notification::NetworkUpdate { .. } => Topic::new(Resource::Network, Action::Update),
            Notification::NetworkDelete { .. } => Topic::new(Resource::Network, Action::Delete),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    Port,
    Network,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// Key of the notification dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Topic {
    pub resource: Resource,
    pub action: Action,
}

impl Topic {
    pub const fn new(resource: Resource, action: Action) -> Self {
        Self { resource, action }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resource = match self.resource {
            Resource::Port => "port",
            Resource::Network => "network",
        };
        let action = match self.action {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
        };
        write!(f, "{resource}-{action}")
    }
}

/// Trait for inbound notification transports
///
/// The stream should run until the source is dropped. Notifications may be
/// duplicated or arrive out of order; the inbox tolerates both.
pub trait NotificationSource: Send + Sync {
    /// Stream of inbound notifications
    ///
    /// Called once, when the agent starts consuming.
    fn watch(&self) -> Pin<Box<dyn Stream<Item = Notification> + Send + 'static>>;
}

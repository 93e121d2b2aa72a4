//! Topic → handler dispatch table
//!
//! Handlers are registered explicitly at startup; the default table wires
//! port and network topics to the inbox.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use super::NotificationInbox;
use crate::traits::{Action, Notification, Resource, Topic};

/// A notification handler
pub type Handler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Maps each topic to the function that handles it
#[derive(Default, Clone)]
pub struct NotificationDispatcher {
    handlers: HashMap<Topic, Handler>,
}

impl NotificationDispatcher {
    /// Create an empty dispatch table
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch table feeding `inbox`
    pub fn for_inbox(inbox: Arc<NotificationInbox>) -> Self {
        let mut dispatcher = Self::new();

        let port_changed: Handler = {
            let inbox = Arc::clone(&inbox);
            Arc::new(move |notification: &Notification| {
                if let Notification::PortCreate { port } | Notification::PortUpdate { port } =
                    notification
                {
                    if let Some(network_id) = &port.network_id {
                        inbox.remember_port_network(&port.id, network_id);
                    }
                    if inbox.record_port_updated(&port.id) {
                        info!("Agent port update for port {}", port.id);
                    }
                }
            })
        };
        dispatcher.register(Topic::new(Resource::Port, Action::Create), Arc::clone(&port_changed));
        dispatcher.register(Topic::new(Resource::Port, Action::Update), port_changed);

        let port_inbox = Arc::clone(&inbox);
        dispatcher.register(
            Topic::new(Resource::Port, Action::Delete),
            Arc::new(move |notification: &Notification| {
                if let Notification::PortDelete { port_id } = notification {
                    port_inbox.record_port_deleted(port_id);
                    info!("Agent port delete for port {}", port_id);
                }
            }),
        );

        dispatcher.register(
            Topic::new(Resource::Network, Action::Create),
            Arc::new(|notification: &Notification| {
                if let Notification::NetworkCreate { network } = notification {
                    info!("Agent network create for network {}", network.id);
                }
            }),
        );

        let network_inbox = Arc::clone(&inbox);
        dispatcher.register(
            Topic::new(Resource::Network, Action::Update),
            Arc::new(move |notification: &Notification| {
                if let Notification::NetworkUpdate { network } = notification {
                    let ports = network_inbox.ports_for_network(&network.id);
                    network_inbox.record_network_updated(&network.id, &ports);
                }
            }),
        );

        dispatcher.register(
            Topic::new(Resource::Network, Action::Delete),
            Arc::new(move |notification: &Notification| {
                if let Notification::NetworkDelete { network_id } = notification {
                    inbox.forget_network(network_id);
                    info!("Agent network delete for network {}", network_id);
                }
            }),
        );

        dispatcher
    }

    /// Register (or replace) the handler for a topic
    pub fn register(&mut self, topic: Topic, handler: Handler) {
        self.handlers.insert(topic, handler);
    }

    pub fn has_handler(&self, topic: Topic) -> bool {
        self.handlers.contains_key(&topic)
    }

    /// Run the handler for a notification's topic
    ///
    /// Returns `false` if no handler is registered.
    pub fn dispatch(&self, notification: &Notification) -> bool {
        let topic = notification.topic();
        match self.handlers.get(&topic) {
            Some(handler) => {
                handler(notification);
                true
            }
            None => {
                debug!("No handler for topic {}, dropping notification", topic);
                false
            }
        }
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut topics: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        topics.sort();
        f.debug_struct("NotificationDispatcher")
            .field("topics", &topics)
            .finish()
    }
}

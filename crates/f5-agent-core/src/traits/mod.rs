//! Core traits for the F5 agent
//!
//! This module defines the abstract interfaces of every external collaborator.
//!
//! - [`DeviceGateway`]: VLAN operations on the appliance
//! - [`PortStore`]: read-only network/port/segment/binding records
//! - [`ControlPlane`]: RPCs exposed by the controller
//! - [`NotificationSource`]: inbound port/network notifications

pub mod control_plane;
pub mod device_gateway;
pub mod notification_source;
pub mod port_store;

pub use control_plane::{ControlPlane, ControlPlaneFactory};
pub use device_gateway::{DeviceGateway, DeviceGatewayFactory};
pub use notification_source::{
    NetworkNotice, Notification, NotificationSource, PortNotice, Resource, Action, Topic,
};
pub use port_store::{PortStore, PortStoreFactory};

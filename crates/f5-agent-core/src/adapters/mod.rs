// # Built-in Adapters
//
// Implementations of the collaborator traits that ship with the core:
//
// - `MemoryDeviceGateway`: an appliance held in memory
// - `MemoryPortStore`: port records held in memory
// - `FilePortStore`: port records read from a JSON snapshot on every query
// - `LogControlPlane`: a controller that only logs what it is told

pub mod file_store;
pub mod log_control;
pub mod memory_device;
pub mod memory_store;

pub use file_store::{FilePortStore, FilePortStoreFactory};
pub use log_control::{LogControlPlane, LogControlPlaneFactory};
pub use memory_device::{MemoryDeviceGateway, MemoryDeviceGatewayFactory};
pub use memory_store::{MemoryPortStore, MemoryPortStoreFactory, PortSnapshot};

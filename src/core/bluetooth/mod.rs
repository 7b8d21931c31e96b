//! Bluetooth functionality for the GlucoWatch bridge
//! This module handles all radio operations: scanning, connecting,
//! GATT discovery, characteristic reads and notifications.

pub mod central;
mod connection;
pub mod constants;
pub mod device;
mod manager;
mod notification;
mod registry;
mod scanner;
pub mod types;

// Re-export types that should be publicly accessible
pub use central::{CentralController, CentralEvent, EventSender, Generation, SessionEvent};
pub use constants::*; // Re-export all constants
pub use device::DeviceFilter;
pub use manager::BluetoothManager;
pub use types::{Advertisement, CharacteristicHandle, CharacteristicRole, PeripheralHandle, ServiceHandle};

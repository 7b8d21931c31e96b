//! Constants used throughout the application
//! This module contains the GATT identifiers of the GlucoWatch sensor
//! and the default timing values of an acquisition session.

use uuid::Uuid;

/// The advertised name of the GlucoWatch sensor
pub const SENSOR_NAME: &str = "GlucoWatch";

/// Standard Bluetooth Service UUIDs
pub const UUID_DEVICE_INFORMATION_SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);
pub const UUID_GLUCOSE_SERVICE: Uuid = Uuid::from_u128(0x00001808_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth Characteristic UUIDs
pub const UUID_MANUFACTURER_NAME: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);
pub const UUID_GLUCOSE_MEASUREMENT: Uuid = Uuid::from_u128(0x00002a18_0000_1000_8000_00805f9b34fb);

/// Scan duration before giving up, in seconds
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;

/// Timeout for a connection attempt in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Glucose measurement payload size in bytes
pub const GLUCOSE_PAYLOAD_SIZE: usize = 2;

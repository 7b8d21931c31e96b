//! Defines shared data structures for the Bluetooth module.

use serde::Serialize;
use uuid::Uuid;

use crate::core::bluetooth::constants::{UUID_GLUCOSE_MEASUREMENT, UUID_MANUFACTURER_NAME};

/// Opaque reference to a discovered radio device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PeripheralHandle {
    /// Platform-specific unique identifier for the device
    pub id: String,
    /// The advertised name of the device, if any
    pub name: Option<String>,
}

impl PeripheralHandle {
    pub fn new(id: impl Into<String>, name: Option<String>) -> Self {
        Self {
            id: id.into(),
            name,
        }
    }
}

/// A GATT service discovered on the connected peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceHandle {
    /// Controller-assigned key used to look the platform service back up
    pub key: u32,
    pub uuid: Uuid,
}

/// Semantic role of a characteristic the session cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CharacteristicRole {
    ManufacturerName,
    GlucoseMeasurement,
}

impl CharacteristicRole {
    /// Resolves a characteristic UUID to its role, once, at discovery time.
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        if uuid == UUID_MANUFACTURER_NAME {
            Some(Self::ManufacturerName)
        } else if uuid == UUID_GLUCOSE_MEASUREMENT {
            Some(Self::GlucoseMeasurement)
        } else {
            None
        }
    }

    pub fn uuid(&self) -> Uuid {
        match self {
            Self::ManufacturerName => UUID_MANUFACTURER_NAME,
            Self::GlucoseMeasurement => UUID_GLUCOSE_MEASUREMENT,
        }
    }

    /// Processing priority inside a delivery batch, lower first.
    pub(crate) fn batch_priority(&self) -> u8 {
        match self {
            Self::ManufacturerName => 0,
            Self::GlucoseMeasurement => 1,
        }
    }
}

/// Opaque reference to a negotiated GATT characteristic, tagged with its role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicHandle {
    /// Controller-assigned key used to look the platform characteristic back up
    pub key: u32,
    pub role: CharacteristicRole,
    /// UUID of the service the characteristic belongs to
    pub service: Uuid,
}

/// A single advertisement observed while scanning.
#[derive(Debug, Clone)]
pub struct Advertisement {
    pub peripheral: PeripheralHandle,
    /// Advertised local name
    pub local_name: Option<String>,
    /// Advertised service identifiers
    pub services: Vec<Uuid>,
    /// The signal strength (RSSI) of the advertisement
    pub rssi: Option<i16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roles_resolve_from_their_uuids() {
        assert_eq!(
            CharacteristicRole::from_uuid(UUID_MANUFACTURER_NAME),
            Some(CharacteristicRole::ManufacturerName)
        );
        assert_eq!(
            CharacteristicRole::from_uuid(UUID_GLUCOSE_MEASUREMENT),
            Some(CharacteristicRole::GlucoseMeasurement)
        );
        assert_eq!(CharacteristicRole::from_uuid(Uuid::nil()), None);
    }

    #[test]
    fn role_uuid_is_inverse_of_from_uuid() {
        for role in [CharacteristicRole::ManufacturerName, CharacteristicRole::GlucoseMeasurement] {
            assert_eq!(CharacteristicRole::from_uuid(role.uuid()), Some(role));
        }
    }
}

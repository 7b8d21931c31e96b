//! Decides whether a discovered radio device is a GlucoWatch sensor

use regex::Regex;
use std::sync::OnceLock;
use uuid::Uuid;

use crate::config::session_config::SessionConfig;
use crate::core::bluetooth::types::Advertisement;

/// Predicate over advertisement data selecting the target sensor class
#[derive(Debug, Clone)]
pub struct DeviceFilter {
    /// The glucose service identifier the sensor advertises
    pub service_uuid: Uuid,
    /// Fallback exact match on the advertised name
    pub sensor_name: String,
    /// Advertisements weaker than this are ignored
    pub min_rssi: Option<i16>,
}

impl DeviceFilter {
    pub fn new(service_uuid: Uuid, sensor_name: impl Into<String>, min_rssi: Option<i16>) -> Self {
        Self {
            service_uuid,
            sensor_name: sensor_name.into(),
            min_rssi,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.glucose_service_uuid, config.sensor_name.clone(), config.min_rssi)
    }

    /// Returns true if the advertisement belongs to a GlucoWatch sensor
    pub fn matches(&self, advertisement: &Advertisement) -> bool {
        if let (Some(threshold), Some(rssi)) = (self.min_rssi, advertisement.rssi) {
            if rssi < threshold {
                return false;
            }
        }

        if advertisement.services.contains(&self.service_uuid) {
            return true;
        }

        advertisement
            .local_name
            .as_deref()
            .or(advertisement.peripheral.name.as_deref())
            .map(|name| name == self.sensor_name)
            .unwrap_or(false)
    }
}

/// Extracts a MAC address from a platform device identifier, for log output.
pub fn extract_mac_address(device_id: &str) -> Option<String> {
    static MAC: OnceLock<Option<Regex>> = OnceLock::new();
    let re = MAC
        .get_or_init(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok())
        .as_ref()?;
    re.find_iter(device_id).last().map(|m| m.as_str().to_uppercase())
}
